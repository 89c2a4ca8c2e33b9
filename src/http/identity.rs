use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::error::MementoResult;
use crate::http::respond::structured;
use crate::state::AppState;
use crate::types::new_id;
use crate::workspace::IdentitySnapshot;

pub async fn get(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let snapshot = crate::identity::latest(&auth.store, &state.crypto, auth.workspace_key.as_deref()).await?;
    Ok(structured(&snapshot))
}

/// Manual override: stores `crystal` verbatim as a new snapshot with
/// `source_count: 0`, distinguishing a hand-edited identity from one
/// produced by `crystallize`.
#[derive(Debug, Deserialize)]
pub struct PutIdentityBody {
    pub crystal: String,
}

pub async fn put(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<PutIdentityBody>) -> MementoResult<Json<Value>> {
    let stored = match auth.workspace_key.as_deref() {
        Some(k) => state.crypto.encrypt(&body.crystal, k),
        None => body.crystal.clone(),
    };
    let snapshot = IdentitySnapshot { id: new_id("ident"), crystal: stored, source_count: 0, created_at: crate::types::now() };
    auth.store.insert_identity_snapshot(&snapshot).await?;
    Ok(structured(&IdentitySnapshot { crystal: body.crystal, ..snapshot }))
}

pub async fn crystallize(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let snapshot = crate::identity::crystallize(&auth.store, &state.crypto, auth.workspace_key.as_deref()).await?;
    Ok(structured(&snapshot))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn history(State(state): State<Arc<AppState>>, auth: AuthContext, Query(q): Query<HistoryQuery>) -> MementoResult<Json<Value>> {
    let limit = q.limit.unwrap_or(20);
    let history = crate::identity::history(&auth.store, &state.crypto, auth.workspace_key.as_deref(), limit).await?;
    Ok(structured(&history))
}
