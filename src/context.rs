//! Context composer (C11): the single `/context` call that fans out over
//! working memory, recall, the skip list, and identity, with an optional
//! cross-workspace read-only peek.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::PeekHandle;
use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::MementoResult;
use crate::scoring::{apply_threshold, blend_hybrid, rank_keyword, tokenize, RankingLabel, ScoredMemory};
use crate::skip_list;
use crate::vector_backend::VectorBackend;
use crate::workspace::{ItemListFilter, WorkspaceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    WorkingMemory,
    Memories,
    SkipList,
    Identity,
}

pub fn default_sections() -> Vec<Section> {
    vec![Section::WorkingMemory, Section::Memories, Section::SkipList, Section::Identity]
}

pub fn parse_section(s: &str) -> Option<Section> {
    match s {
        "working_memory" => Some(Section::WorkingMemory),
        "memories" => Some(Section::Memories),
        "skip_list" => Some(Section::SkipList),
        "identity" => Some(Section::Identity),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub id: String,
    pub content: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ContextResponse {
    pub working_memory: Option<WorkingMemorySection>,
    pub memories: Option<MemoriesSection>,
    pub skip_list: Option<SkipListSection>,
    pub identity: Option<String>,
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct WorkingMemorySection {
    pub items: Vec<crate::workspace::WorkingMemoryItem>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MemoriesSection {
    pub results: Vec<ScoredResult>,
    pub ranking: Option<&'static str>,
    pub query_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SkipListSection {
    #[serde(rename = "match")]
    pub matched: Option<crate::workspace::SkipEntry>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Meta {
    pub workspace: String,
    pub last_updated: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub peeked_workspaces: Vec<String>,
}

/// Local recall used by both `GET /memories/recall` and the composer's
/// memories section.
pub async fn recall(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    vector: &dyn VectorBackend,
    workspace_id: &str,
    query: &str,
    alpha: f64,
    threshold: f64,
    limit: usize,
) -> MementoResult<(Vec<ScoredMemory>, RankingLabel)> {
    let now = Utc::now();
    let candidates = store.active_candidates().await?;
    let mut decrypted = Vec::with_capacity(candidates.len());
    for mut m in candidates {
        if let Some(k) = key {
            m.content = crypto.decrypt(&m.content, k)?;
        }
        decrypted.push(m);
    }

    let tokens = tokenize(query);
    let kw_ranked = rank_keyword(&decrypted, &tokens, now);

    let vector_scores = vector.search(workspace_id, query, limit).await.unwrap_or_default();
    let (merged, label) = blend_hybrid(kw_ranked, &vector_scores, &decrypted, alpha);
    let merged = apply_threshold(merged, threshold);
    let merged = merged.into_iter().take(limit).collect();
    Ok((merged, label))
}

/// Runs the full composer pipeline for `include` sections, optionally
/// fanning out over `peeks` for the memories section. Peeked results are
/// never written to — no access log, no access-count bump.
pub async fn compose(
    store: &Arc<WorkspaceStore>,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    vector: &dyn VectorBackend,
    workspace_id: &str,
    workspace_name: &str,
    include: &[Section],
    message: Option<&str>,
    peeks: &[PeekHandle],
    alpha: f64,
    threshold: f64,
    limit: usize,
) -> MementoResult<ContextResponse> {
    let mut response = ContextResponse { meta: Meta { workspace: workspace_name.to_string(), ..Default::default() }, ..Default::default() };

    if include.contains(&Section::WorkingMemory) {
        let items = crate::items::list(store, crypto, key, &ItemListFilter::default()).await?;
        let active: Vec<_> = items
            .into_iter()
            .filter(|i| matches!(i.status, crate::types::ItemStatus::Active | crate::types::ItemStatus::Paused))
            .collect();
        response.working_memory = Some(WorkingMemorySection { total: active.len(), items: active });
    }

    if include.contains(&Section::Memories) {
        let query = message.unwrap_or_default();
        let query_terms = tokenize(query);
        let (local, label) = recall(store, crypto, key, vector, workspace_id, query, alpha, threshold, limit).await?;

        // Access logging is fire-and-forget: it must never gate the response
        // or fail the request on a log-write error (§5, §9).
        if !local.is_empty() {
            let store = store.clone();
            let ids: Vec<String> = local.iter().map(|s| s.memory.id.clone()).collect();
            let query = query.to_string();
            tokio::spawn(async move {
                for id in ids {
                    if let Err(e) = store.record_access(&id).await {
                        tracing::warn!(error = %e, memory_id = %id, "failed to record access");
                    }
                    if let Err(e) = store.insert_access_log(&id, Some(&query)).await {
                        tracing::warn!(error = %e, memory_id = %id, "failed to insert access log");
                    }
                }
            });
        }

        let mut results: Vec<ScoredResult> = local
            .into_iter()
            .map(|s| ScoredResult {
                id: s.memory.id,
                content: s.memory.content,
                score: s.score,
                keyword_score: s.keyword_score,
                vector_score: s.vector_score,
                workspace: None,
                created_at: s.memory.created_at,
            })
            .collect();
        let mut ranking = match label {
            RankingLabel::Keyword => "keyword",
            RankingLabel::Hybrid => "hybrid",
        };
        let mut peeked_names = Vec::new();

        for peek in peeks {
            let (peeked, peek_label) = recall(&peek.store, crypto, peek.key.as_deref(), vector, &peek.name, query, alpha, threshold, limit).await?;
            if !peeked.is_empty() {
                peeked_names.push(peek.name.clone());
                if matches!(peek_label, RankingLabel::Hybrid) {
                    ranking = "hybrid";
                }
            }
            for s in peeked {
                results.push(ScoredResult {
                    id: s.memory.id,
                    content: s.memory.content,
                    score: s.score,
                    keyword_score: s.keyword_score,
                    vector_score: s.vector_score,
                    workspace: Some(peek.name.clone()),
                    created_at: s.memory.created_at,
                });
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(b.created_at.cmp(&a.created_at)));
        results.truncate(limit);

        response.meta.memory_count = Some(results.len());
        response.meta.peeked_workspaces = peeked_names;
        response.memories = Some(MemoriesSection { results, ranking: Some(ranking), query_terms });
    }

    if include.contains(&Section::SkipList) {
        let matched = match message {
            Some(msg) if !msg.is_empty() => skip_list::check(store, crypto, key, msg).await?,
            _ => None,
        };
        response.skip_list = Some(SkipListSection { matched });
    }

    if include.contains(&Section::Identity) {
        response.identity = crate::identity::latest(store, crypto, key).await?.map(|s| s.crystal);
    }

    response.meta.last_updated = Some(Utc::now());
    Ok(response)
}
