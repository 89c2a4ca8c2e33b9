//! Identity service (C10): crystallizes current workspace state into a
//! Markdown snapshot and keeps the history.

use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::MementoResult;
use crate::types::{new_id, ItemStatus};
use crate::workspace::{IdentitySnapshot, WorkspaceStore};

const TOP_MEMORIES: usize = 30;
const RECENT_CONSOLIDATIONS: usize = 10;

pub async fn crystallize(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<IdentitySnapshot> {
    let mut doc = String::new();
    let mut source_count = 0u64;

    let working: Vec<_> = store
        .all_items()
        .await?
        .into_iter()
        .filter(|i| matches!(i.status, ItemStatus::Active | ItemStatus::Paused))
        .collect();
    if !working.is_empty() {
        doc.push_str("## Working Memory\n\n");
        for item in &working {
            let content = match (&item.content, key) {
                (Some(c), Some(k)) => crypto.decrypt(c, k)?,
                (Some(c), None) => c.clone(),
                (None, _) => String::new(),
            };
            doc.push_str(&format!("- **{}** ({}): {}\n", item.title, item.status.as_str(), content));
            source_count += 1;
        }
        doc.push('\n');
    }

    let mut memories = store.active_candidates().await?;
    memories.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap());
    memories.truncate(TOP_MEMORIES);
    if !memories.is_empty() {
        doc.push_str("## Memories\n\n");
        for m in &memories {
            let content = match key {
                Some(k) => crypto.decrypt(&m.content, k)?,
                None => m.content.clone(),
            };
            doc.push_str(&format!("- [{}] {}\n", m.memory_type.as_str(), content));
            source_count += 1;
        }
        doc.push('\n');
    }

    let consolidations = store.list_recent_consolidations(RECENT_CONSOLIDATIONS).await?;
    if !consolidations.is_empty() {
        doc.push_str("## Consolidations\n\n");
        for c in &consolidations {
            let summary = match key {
                Some(k) => crypto.decrypt(&c.summary, k)?,
                None => c.summary.clone(),
            };
            doc.push_str(&format!("- {}\n", summary));
            source_count += 1;
        }
        doc.push('\n');
    }

    doc.push_str(&format!("---\n_{source_count} sources_\n"));

    let crystal = match key {
        Some(k) => crypto.encrypt(&doc, k),
        None => doc.clone(),
    };
    let snapshot = IdentitySnapshot { id: new_id("ident"), crystal, source_count, created_at: crate::types::now() };
    store.insert_identity_snapshot(&snapshot).await?;

    let mut decrypted = snapshot.clone();
    decrypted.crystal = doc;
    Ok(decrypted)
}

pub async fn latest(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<Option<IdentitySnapshot>> {
    let Some(mut snap) = store.latest_identity_snapshot().await? else {
        return Ok(None);
    };
    if let Some(k) = key {
        snap.crystal = crypto.decrypt(&snap.crystal, k)?;
    }
    Ok(Some(snap))
}

pub async fn history(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>, limit: usize) -> MementoResult<Vec<IdentitySnapshot>> {
    store
        .list_identity_snapshots(limit)
        .await?
        .into_iter()
        .map(|mut snap| {
            if let Some(k) = key {
                snap.crystal = crypto.decrypt(&snap.crystal, k)?;
            }
            Ok(snap)
        })
        .collect()
}
