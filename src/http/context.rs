use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{self, AuthContext};
use crate::context::{self, Section};
use crate::error::MementoResult;
use crate::http::respond::structured;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ComposeBody {
    pub message: Option<String>,
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub peek_workspaces: Vec<String>,
    pub limit: Option<usize>,
}

pub async fn compose(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<ComposeBody>) -> MementoResult<Json<Value>> {
    let include: Vec<Section> = match body.include {
        Some(names) => names.iter().filter_map(|n| context::parse_section(n)).collect(),
        None => context::default_sections(),
    };

    let peeks = if body.peek_workspaces.is_empty() {
        auth.peeks.clone()
    } else {
        auth::resolve_peek_workspaces(&state, &auth.user_id, &body.peek_workspaces, &auth.workspace.name).await?
    };

    let alpha: f64 = auth.store.get_setting("recall_alpha").await?.and_then(|v| v.parse().ok()).unwrap_or(0.5);
    let threshold: f64 = auth.store.get_setting("recall_threshold").await?.and_then(|v| v.parse().ok()).unwrap_or(0.0);
    let limit = body.limit.unwrap_or(10);

    let response = context::compose(
        &auth.store,
        &state.crypto,
        auth.workspace_key.as_deref(),
        state.vector.as_ref(),
        &auth.workspace.id,
        &auth.workspace.name,
        &include,
        body.message.as_deref(),
        &peeks,
        alpha,
        threshold,
        limit,
    )
    .await?;

    Ok(structured(&response))
}
