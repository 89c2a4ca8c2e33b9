use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::error::MementoResult;
use crate::http::respond::structured;
use crate::skip_list;
use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let entries = skip_list::list(&auth.store, &state.crypto, auth.workspace_key.as_deref()).await?;
    Ok(structured(&entries))
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
    pub item: String,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub ttl_days: Option<i64>,
}

pub async fn add(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<AddBody>) -> MementoResult<Json<Value>> {
    let expires_at = body
        .expires_at
        .unwrap_or_else(|| Utc::now() + Duration::days(body.ttl_days.unwrap_or(30)));
    let entry = skip_list::add(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &body.item, &body.reason, expires_at).await?;
    Ok(structured(&entry))
}

#[derive(Debug, Deserialize, Default)]
pub struct CheckQuery {
    pub query: String,
}

pub async fn check(State(state): State<Arc<AppState>>, auth: AuthContext, Query(q): Query<CheckQuery>) -> MementoResult<Json<Value>> {
    let found = skip_list::check(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &q.query).await?;
    Ok(Json(json!({ "match": found })))
}

pub async fn remove(auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let deleted = skip_list::remove(&auth.store, &id).await?;
    Ok(Json(json!({ "deleted": deleted, "id": id })))
}
