use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, AuthContext};
use crate::error::MementoResult;
use crate::http::respond::{agent_text, structured};
use crate::memories::{self, CreateMemoryInput, UpdateMemoryInput};
use crate::state::AppState;
use crate::types::{ImageMetadata, MemoryStatusFilter, MemoryType, SortOrder};
use crate::workspace::MemoryListFilter;

#[derive(Debug, Deserialize)]
pub struct CreateMemoryBody {
    pub content: String,
    #[serde(rename = "type", default)]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub linkages: Vec<Value>,
    #[serde(default)]
    pub images: Vec<ImageMetadata>,
}

fn parse_memory_type(raw: &Option<String>) -> MementoResult<MemoryType> {
    match raw {
        None => Ok(MemoryType::Fact),
        Some(s) => MemoryType::parse(s).ok_or_else(|| crate::error::MementoError::validation(format!("unknown memory type '{s}'"))),
    }
}

pub async fn create(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<CreateMemoryBody>) -> MementoResult<Json<Value>> {
    let memory_type = parse_memory_type(&body.memory_type)?;
    memories::validate_images(&body.images, state.config.max_image_size_bytes)?;
    let created = memories::create(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        &auth.plan,
        CreateMemoryInput { content: body.content, memory_type, tags: body.tags, expires_at: body.expires_at, linkages: body.linkages, images: body.images },
    )
    .await?;
    let _ = state.vector.index(&auth.workspace.id, &created.id, &created.content).await;
    Ok(structured(&created))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthContext, Query(q): Query<ListQuery>) -> MementoResult<Json<Value>> {
    let filter = MemoryListFilter {
        memory_type: q.memory_type.as_deref().and_then(MemoryType::parse),
        tags: q.tags.map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()).unwrap_or_default(),
        status: q.status.as_deref().and_then(MemoryStatusFilter::parse),
        sort: q.sort.as_deref().and_then(SortOrder::parse),
        limit: q.limit,
        offset: q.offset.unwrap_or(0),
    };
    let results = memories::list(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &filter).await?;
    Ok(structured(&results))
}

#[derive(Debug, Deserialize, Default)]
pub struct RecallQuery {
    pub query: Option<String>,
    pub tags: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub limit: Option<usize>,
    pub format: Option<String>,
    pub track_access: Option<bool>,
    pub peek_workspaces: Option<String>,
}

struct RecallHit {
    id: String,
    content: String,
    score: f64,
    keyword_score: Option<f64>,
    vector_score: Option<f64>,
    workspace: Option<String>,
    created_at: DateTime<Utc>,
}

pub async fn recall(State(state): State<Arc<AppState>>, auth: AuthContext, Query(q): Query<RecallQuery>) -> MementoResult<Json<Value>> {
    let query = q.query.clone().unwrap_or_default();
    let limit = q.limit.unwrap_or(10);

    let alpha: f64 = auth.store.get_setting("recall_alpha").await?.and_then(|v| v.parse().ok()).unwrap_or(0.5);
    let threshold: f64 = auth.store.get_setting("recall_threshold").await?.and_then(|v| v.parse().ok()).unwrap_or(0.0);

    let (mut ranked, label) = crate::context::recall(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        state.vector.as_ref(),
        &auth.workspace.id,
        &query,
        alpha,
        threshold,
        limit,
    )
    .await?;

    if let Some(type_filter) = q.memory_type.as_deref().and_then(MemoryType::parse) {
        ranked.retain(|s| s.memory.memory_type == type_filter);
    }
    if let Some(tags) = &q.tags {
        let wanted: Vec<String> = tags.split(',').map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).collect();
        ranked.retain(|s| wanted.iter().any(|t| s.memory.tags.iter().any(|mt| mt.to_lowercase() == *t)));
    }

    // Access logging is fire-and-forget: it must never gate the response or
    // fail the request on a log-write error (§5, §9).
    let track_access = q.track_access.unwrap_or(true);
    if track_access && !ranked.is_empty() {
        let store = auth.store.clone();
        let ids: Vec<String> = ranked.iter().map(|s| s.memory.id.clone()).collect();
        let log_query = query.clone();
        tokio::spawn(async move {
            for id in ids {
                if let Err(e) = store.record_access(&id).await {
                    tracing::warn!(error = %e, memory_id = %id, "failed to record access");
                }
                if let Err(e) = store.insert_access_log(&id, Some(&log_query)).await {
                    tracing::warn!(error = %e, memory_id = %id, "failed to insert access log");
                }
            }
        });
    }

    let mut is_hybrid = matches!(label, crate::scoring::RankingLabel::Hybrid);
    let mut hits: Vec<RecallHit> = ranked
        .into_iter()
        .map(|s| RecallHit {
            id: s.memory.id,
            content: s.memory.content,
            score: s.score,
            keyword_score: s.keyword_score,
            vector_score: s.vector_score,
            workspace: None,
            created_at: s.memory.created_at,
        })
        .collect();

    // Peek fan-out: never writes to the peeked workspace (no access-log row,
    // no access-count bump), merged into the local ranking by score-desc.
    let peek_names: Vec<String> = q.peek_workspaces.as_deref().map(|s| s.split(',').map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()).unwrap_or_default();
    let peeks = if !peek_names.is_empty() {
        auth::resolve_peek_workspaces(&state, &auth.user_id, &peek_names, &auth.workspace.name).await?
    } else {
        auth.peeks.clone()
    };
    for peek in &peeks {
        let (peeked, peek_label) = crate::context::recall(&peek.store, &state.crypto, peek.key.as_deref(), state.vector.as_ref(), &peek.name, &query, alpha, threshold, limit).await?;
        if matches!(peek_label, crate::scoring::RankingLabel::Hybrid) {
            is_hybrid = true;
        }
        for s in peeked {
            hits.push(RecallHit {
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
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(b.created_at.cmp(&a.created_at)));
    hits.truncate(limit);

    let wants_json = q.format.as_deref() == Some("json");
    if wants_json {
        let ranking = if is_hybrid { "hybrid" } else { "keyword" };
        return Ok(Json(json!({
            "results": hits.iter().map(|h| json!({
                "id": h.id,
                "content": h.content,
                "score": h.score,
                "keyword_score": h.keyword_score,
                "vector_score": h.vector_score,
                "workspace": h.workspace,
            })).collect::<Vec<_>>(),
            "ranking": ranking,
        })));
    }

    if hits.is_empty() {
        return Ok(agent_text("No memories found."));
    }
    let mut text = format!("Found {} memor{}:\n\n", hits.len(), if hits.len() == 1 { "y" } else { "ies" });
    for (i, h) in hits.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, h.content));
    }
    Ok(agent_text(text))
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub source: String,
    pub memories: Vec<CreateMemoryBody>,
}

pub async fn ingest(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<IngestBody>) -> MementoResult<Json<Value>> {
    let mut entries = Vec::with_capacity(body.memories.len());
    for m in body.memories {
        let memory_type = parse_memory_type(&m.memory_type)?;
        entries.push(CreateMemoryInput { content: m.content, memory_type, tags: m.tags, expires_at: m.expires_at, linkages: m.linkages, images: m.images });
    }
    let created = memories::ingest(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &auth.plan, &body.source, entries).await?;
    Ok(structured(&created))
}

#[derive(Debug, Deserialize)]
pub struct DistillBody {
    pub transcript: String,
}

/// Extracts candidate memories from a transcript via the LLM collaborator
/// and stores whatever survives dedup. Degrades to an empty list (200, not
/// an error) when the LLM is unavailable or returns nothing usable.
pub async fn distill(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<DistillBody>) -> MementoResult<Json<Value>> {
    let mut existing = auth.store.active_candidates().await?;
    if let Some(k) = auth.workspace_key.as_deref() {
        for m in &mut existing {
            m.content = state.crypto.decrypt(&m.content, k)?;
        }
    }
    let candidates = crate::distill::distill(state.llm.as_ref(), &body.transcript, &existing).await;

    let mut created = Vec::with_capacity(candidates.len());
    for c in candidates {
        let memory = memories::create(
            &auth.store,
            &state.crypto,
            auth.workspace_key.as_deref(),
            &auth.plan,
            CreateMemoryInput { content: c.content, memory_type: c.memory_type, tags: c.tags, expires_at: None, linkages: vec![], images: vec![] },
        )
        .await?;
        created.push(memory);
    }
    Ok(structured(&created))
}

pub async fn get(State(state): State<Arc<AppState>>, auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let memory = memories::get(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &id).await?;
    Ok(structured(&memory))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateMemoryBody {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub linkages: Option<Vec<Value>>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateMemoryBody>,
) -> MementoResult<Json<Value>> {
    let memory_type = match &body.memory_type {
        Some(s) => Some(MemoryType::parse(s).ok_or_else(|| crate::error::MementoError::validation(format!("unknown memory type '{s}'")))?),
        None => None,
    };
    let updated = memories::update(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        &id,
        UpdateMemoryInput { content: body.content, memory_type, tags: body.tags, expires_at: body.expires_at, linkages: body.linkages },
    )
    .await?;
    Ok(structured(&updated))
}

pub async fn delete(State(state): State<Arc<AppState>>, auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let deleted = memories::delete(&auth.store, &id).await?;
    crate::images::delete_all(state.blob.as_ref(), &auth.workspace.id, &id, &deleted.images).await;
    let _ = state.vector.evict(&auth.workspace.id, &id).await;
    Ok(Json(json!({ "deleted": true, "id": deleted.id })))
}

#[derive(Debug, Deserialize, Default)]
pub struct GraphQuery {
    pub depth: Option<u32>,
}

pub async fn graph(auth: AuthContext, Path(id): Path<String>, Query(q): Query<GraphQuery>) -> MementoResult<Json<Value>> {
    let depth = q.depth.unwrap_or(2);
    let subgraph = crate::graph::subgraph(&auth.store, &id, depth).await?;
    Ok(structured(&subgraph))
}

pub async fn related(State(state): State<Arc<AppState>>, auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let related = crate::graph::related(&auth.store, &id).await?;
    let decrypted: MementoResult<Vec<_>> = related
        .into_iter()
        .map(|mut m| {
            if let Some(k) = auth.workspace_key.as_deref() {
                m.content = state.crypto.decrypt(&m.content, k)?;
            }
            Ok(m)
        })
        .collect();
    Ok(structured(&decrypted?))
}
