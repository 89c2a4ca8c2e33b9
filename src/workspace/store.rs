//! Per-workspace schema (C3): memories, working-memory items, skip list,
//! identity snapshots, consolidations, access log, and settings. One store
//! instance per workspace database — callers hold it behind the same handle
//! cache that resolves the workspace key (see `crate::auth`).
//!
//! Candidate sets are fetched whole and filtered/sorted in process rather
//! than pushed down into SQL; there is no full-text index to maintain and
//! workspace sizes are small enough that this keeps the query surface
//! trivial.

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::MementoResult;
use crate::types::{ImageMetadata, Linkage, MemoryStatusFilter, MemoryType, SortOrder};
use crate::workspace::models::{
    AccessLogRow, ConsolidationRecord, ConsolidationType, IdentitySnapshot, Memory, SkipEntry,
    SynthesisMethod, WorkingMemoryItem,
};

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

pub struct WorkspaceStore {
    conn: Connection,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryListFilter {
    pub memory_type: Option<MemoryType>,
    pub tags: Vec<String>,
    pub status: Option<MemoryStatusFilter>,
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub linkages: Option<Vec<Linkage>>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemListFilter {
    pub category: Option<crate::types::ItemCategory>,
    pub status: Option<crate::types::ItemStatus>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub status: Option<crate::types::ItemStatus>,
    pub priority: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub next_action: Option<Option<String>>,
}

impl WorkspaceStore {
    pub async fn open(db_url: &str, db_token: Option<&str>) -> MementoResult<Self> {
        let conn = crate::db::open(db_url, db_token).await?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> MementoResult<Self> {
        let conn = crate::db::open_in_memory().await?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> MementoResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS memories (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    memory_type TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    expires_at TEXT,
                    relevance REAL NOT NULL,
                    access_count INTEGER NOT NULL,
                    last_accessed_at TEXT,
                    consolidated INTEGER NOT NULL,
                    consolidated_into TEXT,
                    linkages TEXT NOT NULL,
                    images TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS items (
                    id TEXT PRIMARY KEY,
                    category TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT,
                    status TEXT NOT NULL,
                    priority INTEGER NOT NULL,
                    tags TEXT NOT NULL,
                    next_action TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    last_touched_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS skip_list (
                    id TEXT PRIMARY KEY,
                    item TEXT NOT NULL,
                    reason TEXT NOT NULL,
                    expires_at TEXT NOT NULL,
                    added_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS identity_snapshots (
                    id TEXT PRIMARY KEY,
                    crystal TEXT NOT NULL,
                    source_count INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS consolidations (
                    id TEXT PRIMARY KEY,
                    summary TEXT NOT NULL,
                    source_ids TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    consolidation_type TEXT NOT NULL,
                    method TEXT NOT NULL,
                    template_summary TEXT,
                    new_memory_id TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS access_log (
                    id TEXT PRIMARY KEY,
                    memory_id TEXT NOT NULL,
                    query TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                "#,
            )
            .await?;
        Ok(())
    }

    fn row_to_memory(row: &libsql::Row) -> MementoResult<Memory> {
        let tags: Vec<String> = serde_json::from_str(&row.get::<String>(3)?).unwrap_or_default();
        let linkages: Vec<Linkage> = serde_json::from_str(&row.get::<String>(11)?).unwrap_or_default();
        let images: Vec<ImageMetadata> = serde_json::from_str(&row.get::<String>(12)?).unwrap_or_default();
        Ok(Memory {
            id: row.get::<String>(0)?,
            content: row.get::<String>(1)?,
            memory_type: MemoryType::parse(&row.get::<String>(2)?).unwrap_or(MemoryType::Fact),
            tags,
            created_at: parse_ts(&row.get::<String>(4)?),
            expires_at: opt_ts(row.get::<Option<String>>(5)?),
            relevance: row.get::<f64>(6)?,
            access_count: row.get::<i64>(7)? as u64,
            last_accessed_at: opt_ts(row.get::<Option<String>>(8)?),
            consolidated: row.get::<i64>(9)? != 0,
            consolidated_into: row.get::<Option<String>>(10)?,
            linkages,
            images,
        })
    }

    const MEMORY_COLUMNS: &'static str = "id, content, memory_type, tags, created_at, expires_at, relevance, access_count, last_accessed_at, consolidated, consolidated_into, linkages, images";

    // -- memories -------------------------------------------------

    pub async fn insert_memory(&self, m: &Memory) -> MementoResult<()> {
        self.conn
            .execute(
                &format!("INSERT INTO memories ({}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)", Self::MEMORY_COLUMNS),
                params![
                    m.id.clone(),
                    m.content.clone(),
                    m.memory_type.as_str().to_string(),
                    serde_json::to_string(&m.tags)?,
                    m.created_at.to_rfc3339(),
                    m.expires_at.map(|t| t.to_rfc3339()),
                    m.relevance,
                    m.access_count as i64,
                    m.last_accessed_at.map(|t| t.to_rfc3339()),
                    m.consolidated as i64,
                    m.consolidated_into.clone(),
                    serde_json::to_string(&m.linkages)?,
                    serde_json::to_string(&m.images)?,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_memory(&self, id: &str) -> MementoResult<Option<Memory>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT {} FROM memories WHERE id = ?1", Self::MEMORY_COLUMNS), params![id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_memory(&row)?)),
            None => Ok(None),
        }
    }

    /// Every memory in the workspace. Filtering, sorting, and pagination
    /// happen in `list_memories`/`active_candidates`, not here.
    pub async fn all_memories(&self) -> MementoResult<Vec<Memory>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT {} FROM memories", Self::MEMORY_COLUMNS), ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::row_to_memory(&row)?);
        }
        Ok(out)
    }

    /// Non-consolidated, non-expired memories — the candidate pool for
    /// recall, decay, and consolidation.
    pub async fn active_candidates(&self) -> MementoResult<Vec<Memory>> {
        let now = Utc::now();
        Ok(self
            .all_memories()
            .await?
            .into_iter()
            .filter(|m| m.is_active(now))
            .collect())
    }

    pub async fn count_active_memories(&self) -> MementoResult<u64> {
        Ok(self.active_candidates().await?.len() as u64)
    }

    pub async fn list_memories(&self, filter: &MemoryListFilter) -> MementoResult<Vec<Memory>> {
        let now = Utc::now();
        let mut items: Vec<Memory> = self
            .all_memories()
            .await?
            .into_iter()
            .filter(|m| match filter.status {
                Some(MemoryStatusFilter::Active) => m.is_active(now),
                Some(MemoryStatusFilter::Consolidated) => m.consolidated,
                Some(MemoryStatusFilter::Expired) => m.is_expired(now),
                Some(MemoryStatusFilter::All) | None => true,
            })
            .filter(|m| filter.memory_type.map(|t| t == m.memory_type).unwrap_or(true))
            .filter(|m| {
                if filter.tags.is_empty() {
                    return true;
                }
                let lower: Vec<String> = m.tags.iter().map(|t| t.to_lowercase()).collect();
                filter.tags.iter().any(|t| lower.contains(&t.to_lowercase()))
            })
            .collect();

        match filter.sort {
            Some(SortOrder::Relevance) => items.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap()),
            Some(SortOrder::AccessCount) => items.sort_by(|a, b| b.access_count.cmp(&a.access_count)),
            Some(SortOrder::LastAccessedAt) => {
                items.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at))
            }
            Some(SortOrder::CreatedAt) | None => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        let offset = filter.offset.min(items.len());
        let items = items.split_off(offset);
        let items = match filter.limit {
            Some(limit) => items.into_iter().take(limit).collect(),
            None => items,
        };
        Ok(items)
    }

    pub async fn update_memory(&self, id: &str, update: MemoryUpdate) -> MementoResult<Option<Memory>> {
        let Some(mut m) = self.get_memory(id).await? else {
            return Ok(None);
        };
        if let Some(content) = update.content {
            m.content = content;
        }
        if let Some(t) = update.memory_type {
            m.memory_type = t;
        }
        if let Some(tags) = update.tags {
            m.tags = tags;
        }
        if let Some(expires_at) = update.expires_at {
            m.expires_at = expires_at;
        }
        if let Some(linkages) = update.linkages {
            m.linkages = linkages;
        }
        self.conn
            .execute(
                "UPDATE memories SET content=?2, memory_type=?3, tags=?4, expires_at=?5, linkages=?6 WHERE id=?1",
                params![
                    m.id.clone(),
                    m.content.clone(),
                    m.memory_type.as_str().to_string(),
                    serde_json::to_string(&m.tags)?,
                    m.expires_at.map(|t| t.to_rfc3339()),
                    serde_json::to_string(&m.linkages)?,
                ],
            )
            .await?;
        Ok(Some(m))
    }

    pub async fn set_relevance(&self, id: &str, relevance: f64) -> MementoResult<()> {
        self.conn
            .execute("UPDATE memories SET relevance=?2 WHERE id=?1", params![id.to_string(), relevance])
            .await?;
        Ok(())
    }

    pub async fn record_access(&self, id: &str) -> MementoResult<()> {
        self.conn
            .execute(
                "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_consolidated(&self, id: &str, new_memory_id: &str) -> MementoResult<()> {
        self.conn
            .execute(
                "UPDATE memories SET consolidated = 1, consolidated_into = ?2 WHERE id = ?1",
                params![id.to_string(), new_memory_id.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_memory(&self, id: &str) -> MementoResult<Option<Memory>> {
        let existing = self.get_memory(id).await?;
        if existing.is_some() {
            self.conn
                .execute("DELETE FROM access_log WHERE memory_id = ?1", params![id.to_string()])
                .await?;
            self.conn.execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()]).await?;
        }
        Ok(existing)
    }

    // -- working memory items -------------------------------------------------

    fn row_to_item(row: &libsql::Row) -> MementoResult<WorkingMemoryItem> {
        let tags: Vec<String> = serde_json::from_str(&row.get::<String>(6)?).unwrap_or_default();
        Ok(WorkingMemoryItem {
            id: row.get::<String>(0)?,
            category: crate::types::ItemCategory::parse(&row.get::<String>(1)?)
                .unwrap_or(crate::types::ItemCategory::SessionNote),
            title: row.get::<String>(2)?,
            content: row.get::<Option<String>>(3)?,
            status: crate::types::ItemStatus::parse(&row.get::<String>(4)?).unwrap_or(crate::types::ItemStatus::Active),
            priority: row.get::<i64>(5)?,
            tags,
            next_action: row.get::<Option<String>>(7)?,
            created_at: parse_ts(&row.get::<String>(8)?),
            updated_at: parse_ts(&row.get::<String>(9)?),
            last_touched_at: parse_ts(&row.get::<String>(10)?),
        })
    }

    const ITEM_COLUMNS: &'static str = "id, category, title, content, status, priority, tags, next_action, created_at, updated_at, last_touched_at";

    pub async fn insert_item(&self, it: &WorkingMemoryItem) -> MementoResult<()> {
        self.conn
            .execute(
                &format!("INSERT INTO items ({}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)", Self::ITEM_COLUMNS),
                params![
                    it.id.clone(),
                    it.category.as_str().to_string(),
                    it.title.clone(),
                    it.content.clone(),
                    it.status.as_str().to_string(),
                    it.priority,
                    serde_json::to_string(&it.tags)?,
                    it.next_action.clone(),
                    it.created_at.to_rfc3339(),
                    it.updated_at.to_rfc3339(),
                    it.last_touched_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_item(&self, id: &str) -> MementoResult<Option<WorkingMemoryItem>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT {} FROM items WHERE id = ?1", Self::ITEM_COLUMNS), params![id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn all_items(&self) -> MementoResult<Vec<WorkingMemoryItem>> {
        let mut rows = self.conn.query(&format!("SELECT {} FROM items", Self::ITEM_COLUMNS), ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::row_to_item(&row)?);
        }
        Ok(out)
    }

    pub async fn count_non_archived_items(&self) -> MementoResult<u64> {
        Ok(self
            .all_items()
            .await?
            .into_iter()
            .filter(|i| i.status != crate::types::ItemStatus::Archived)
            .count() as u64)
    }

    pub async fn list_items(&self, filter: &ItemListFilter) -> MementoResult<Vec<WorkingMemoryItem>> {
        let mut items: Vec<WorkingMemoryItem> = self
            .all_items()
            .await?
            .into_iter()
            .filter(|i| filter.category.map(|c| c == i.category).unwrap_or(true))
            .filter(|i| filter.status.map(|s| s == i.status).unwrap_or(true))
            .filter(|i| match &filter.query {
                Some(q) => {
                    let q = q.to_lowercase();
                    i.title.to_lowercase().contains(&q)
                        || i.content.as_deref().unwrap_or("").to_lowercase().contains(&q)
                }
                None => true,
            })
            .collect();
        items.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.created_at.cmp(&a.created_at)));
        let offset = filter.offset.min(items.len());
        let items = items.split_off(offset);
        Ok(match filter.limit {
            Some(limit) => items.into_iter().take(limit).collect(),
            None => items,
        })
    }

    pub async fn update_item(&self, id: &str, update: ItemUpdate) -> MementoResult<Option<WorkingMemoryItem>> {
        let Some(mut it) = self.get_item(id).await? else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            it.title = title;
        }
        if let Some(content) = update.content {
            it.content = content;
        }
        if let Some(status) = update.status {
            it.status = status;
        }
        if let Some(priority) = update.priority {
            it.priority = priority;
        }
        if let Some(tags) = update.tags {
            it.tags = tags;
        }
        if let Some(next_action) = update.next_action {
            it.next_action = next_action;
        }
        let now = Utc::now();
        it.updated_at = now;
        it.last_touched_at = now;
        self.conn
            .execute(
                "UPDATE items SET title=?2, content=?3, status=?4, priority=?5, tags=?6, next_action=?7, updated_at=?8, last_touched_at=?9 WHERE id=?1",
                params![
                    it.id.clone(),
                    it.title.clone(),
                    it.content.clone(),
                    it.status.as_str().to_string(),
                    it.priority,
                    serde_json::to_string(&it.tags)?,
                    it.next_action.clone(),
                    it.updated_at.to_rfc3339(),
                    it.last_touched_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(Some(it))
    }

    pub async fn delete_item(&self, id: &str) -> MementoResult<Option<WorkingMemoryItem>> {
        let existing = self.get_item(id).await?;
        if existing.is_some() {
            self.conn.execute("DELETE FROM items WHERE id = ?1", params![id.to_string()]).await?;
        }
        Ok(existing)
    }

    // -- skip list -------------------------------------------------

    fn row_to_skip(row: &libsql::Row) -> MementoResult<SkipEntry> {
        Ok(SkipEntry {
            id: row.get::<String>(0)?,
            item: row.get::<String>(1)?,
            reason: row.get::<String>(2)?,
            expires_at: parse_ts(&row.get::<String>(3)?),
            added_at: parse_ts(&row.get::<String>(4)?),
        })
    }

    pub async fn purge_expired_skip_entries(&self) -> MementoResult<()> {
        self.conn
            .execute("DELETE FROM skip_list WHERE expires_at <= ?1", params![Utc::now().to_rfc3339()])
            .await?;
        Ok(())
    }

    pub async fn insert_skip(&self, entry: &SkipEntry) -> MementoResult<()> {
        self.conn
            .execute(
                "INSERT INTO skip_list (id, item, reason, expires_at, added_at) VALUES (?1,?2,?3,?4,?5)",
                params![
                    entry.id.clone(),
                    entry.item.clone(),
                    entry.reason.clone(),
                    entry.expires_at.to_rfc3339(),
                    entry.added_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Purges expired rows, then returns what remains.
    pub async fn list_skip(&self) -> MementoResult<Vec<SkipEntry>> {
        self.purge_expired_skip_entries().await?;
        let mut rows = self
            .conn
            .query("SELECT id, item, reason, expires_at, added_at FROM skip_list ORDER BY added_at DESC", ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::row_to_skip(&row)?);
        }
        Ok(out)
    }

    pub async fn delete_skip(&self, id: &str) -> MementoResult<bool> {
        self.purge_expired_skip_entries().await?;
        let rows = self.conn.execute("DELETE FROM skip_list WHERE id = ?1", params![id.to_string()]).await?;
        Ok(rows > 0)
    }

    // -- identity -------------------------------------------------

    pub async fn insert_identity_snapshot(&self, snap: &IdentitySnapshot) -> MementoResult<()> {
        self.conn
            .execute(
                "INSERT INTO identity_snapshots (id, crystal, source_count, created_at) VALUES (?1,?2,?3,?4)",
                params![snap.id.clone(), snap.crystal.clone(), snap.source_count as i64, snap.created_at.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn latest_identity_snapshot(&self) -> MementoResult<Option<IdentitySnapshot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, crystal, source_count, created_at FROM identity_snapshots ORDER BY created_at DESC LIMIT 1",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(IdentitySnapshot {
                id: row.get::<String>(0)?,
                crystal: row.get::<String>(1)?,
                source_count: row.get::<i64>(2)? as u64,
                created_at: parse_ts(&row.get::<String>(3)?),
            })),
            None => Ok(None),
        }
    }

    pub async fn list_identity_snapshots(&self, limit: usize) -> MementoResult<Vec<IdentitySnapshot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, crystal, source_count, created_at FROM identity_snapshots ORDER BY created_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(IdentitySnapshot {
                id: row.get::<String>(0)?,
                crystal: row.get::<String>(1)?,
                source_count: row.get::<i64>(2)? as u64,
                created_at: parse_ts(&row.get::<String>(3)?),
            });
        }
        Ok(out)
    }

    // -- consolidations -------------------------------------------------

    pub async fn insert_consolidation(&self, rec: &ConsolidationRecord) -> MementoResult<()> {
        self.conn
            .execute(
                "INSERT INTO consolidations (id, summary, source_ids, tags, consolidation_type, method, template_summary, new_memory_id, created_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                params![
                    rec.id.clone(),
                    rec.summary.clone(),
                    serde_json::to_string(&rec.source_ids)?,
                    serde_json::to_string(&rec.tags)?,
                    rec.consolidation_type.as_str().to_string(),
                    rec.method.as_str().to_string(),
                    rec.template_summary.clone(),
                    rec.new_memory_id.clone(),
                    rec.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_recent_consolidations(&self, limit: usize) -> MementoResult<Vec<ConsolidationRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, summary, source_ids, tags, consolidation_type, method, template_summary, new_memory_id, created_at FROM consolidations ORDER BY created_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(ConsolidationRecord {
                id: row.get::<String>(0)?,
                summary: row.get::<String>(1)?,
                source_ids: serde_json::from_str(&row.get::<String>(2)?).unwrap_or_default(),
                tags: serde_json::from_str(&row.get::<String>(3)?).unwrap_or_default(),
                consolidation_type: if row.get::<String>(4)? == "auto" { ConsolidationType::Auto } else { ConsolidationType::Manual },
                method: if row.get::<String>(5)? == "ai" { SynthesisMethod::Ai } else { SynthesisMethod::Template },
                template_summary: row.get::<Option<String>>(6)?,
                new_memory_id: row.get::<String>(7)?,
                created_at: parse_ts(&row.get::<String>(8)?),
            });
        }
        Ok(out)
    }

    // -- access log -------------------------------------------------

    pub async fn insert_access_log(&self, memory_id: &str, query: Option<&str>) -> MementoResult<()> {
        self.conn
            .execute(
                "INSERT INTO access_log (id, memory_id, query, created_at) VALUES (?1,?2,?3,?4)",
                params![
                    crate::types::new_id("acc"),
                    memory_id.to_string(),
                    query.map(|s| s.to_string()),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn count_access_log(&self) -> MementoResult<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM access_log", ()).await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        })
    }

    #[allow(dead_code)]
    pub async fn access_log_for(&self, memory_id: &str) -> MementoResult<Vec<AccessLogRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, memory_id, query, created_at FROM access_log WHERE memory_id = ?1 ORDER BY created_at DESC",
                params![memory_id.to_string()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(AccessLogRow {
                id: row.get::<String>(0)?,
                memory_id: row.get::<String>(1)?,
                query: row.get::<Option<String>>(2)?,
                created_at: parse_ts(&row.get::<String>(3)?),
            });
        }
        Ok(out)
    }

    // -- settings -------------------------------------------------

    pub async fn get_setting(&self, key: &str) -> MementoResult<Option<String>> {
        let mut rows = self.conn.query("SELECT value FROM settings WHERE key = ?1", params![key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> MementoResult<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key.to_string(), value.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> MementoResult<()> {
        self.conn.execute("DELETE FROM settings WHERE key = ?1", params![key.to_string()]).await?;
        Ok(())
    }

    pub async fn all_settings(&self) -> MementoResult<Vec<(String, String)>> {
        let mut rows = self.conn.query("SELECT key, value FROM settings", ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get::<String>(0)?, row.get::<String>(1)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::new_id;

    fn sample_memory(content: &str, tags: &[&str]) -> Memory {
        Memory {
            id: new_id("mem"),
            content: content.to_string(),
            memory_type: MemoryType::Fact,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
            expires_at: None,
            relevance: 1.0,
            access_count: 0,
            last_accessed_at: None,
            consolidated: false,
            consolidated_into: None,
            linkages: vec![],
            images: vec![],
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_memory() {
        let store = WorkspaceStore::open_in_memory().await.unwrap();
        let m = sample_memory("hello world", &["tech"]);
        store.insert_memory(&m).await.unwrap();
        let fetched = store.get_memory(&m.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.tags, vec!["tech".to_string()]);
    }

    #[tokio::test]
    async fn delete_memory_removes_access_log() {
        let store = WorkspaceStore::open_in_memory().await.unwrap();
        let m = sample_memory("to delete", &[]);
        store.insert_memory(&m).await.unwrap();
        store.insert_access_log(&m.id, None).await.unwrap();
        store.delete_memory(&m.id).await.unwrap();
        assert!(store.get_memory(&m.id).await.unwrap().is_none());
        assert_eq!(store.count_access_log().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skip_list_purges_on_read() {
        let store = WorkspaceStore::open_in_memory().await.unwrap();
        let expired = SkipEntry {
            id: new_id("skip"),
            item: "old".into(),
            reason: "stale".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(10),
            added_at: Utc::now(),
        };
        store.insert_skip(&expired).await.unwrap();
        let remaining = store.list_skip().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn settings_roundtrip() {
        let store = WorkspaceStore::open_in_memory().await.unwrap();
        store.set_setting("recall_alpha", "0.7").await.unwrap();
        assert_eq!(store.get_setting("recall_alpha").await.unwrap(), Some("0.7".to_string()));
        store.delete_setting("recall_alpha").await.unwrap();
        assert_eq!(store.get_setting("recall_alpha").await.unwrap(), None);
    }
}
