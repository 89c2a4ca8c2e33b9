use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::error::MementoResult;
use crate::health;
use crate::state::AppState;

pub async fn report(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let workspace_count = state.control.count_workspaces(&auth.user_id).await?;
    let report = health::report(&auth.store, &auth.plan, workspace_count).await?;
    Ok(Json(json!({ "content": [{ "type": "text", "text": report }] })))
}
