use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::config::Config;
use crate::control::Workspace;
use crate::error::{MementoError, MementoResult};
use crate::state::AppState;

/// Public view of a workspace: never exposes `db_token` or `encrypted_key`.
#[derive(Debug, Serialize)]
pub struct WorkspaceView {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Workspace> for WorkspaceView {
    fn from(ws: &Workspace) -> Self {
        Self { id: ws.id.clone(), name: ws.name.clone(), created_at: ws.created_at }
    }
}

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let workspaces = state.control.list_workspaces(&auth.user_id).await?;
    let views: Vec<WorkspaceView> = workspaces.iter().map(WorkspaceView::from).collect();
    Ok(Json(serde_json::to_value(views).unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceBody {
    pub name: String,
}

fn workspace_db_url(config: &Config, user_id: &str, name: &str) -> String {
    format!("{}/{}-{}.db", config.workspace_db_dir, user_id, name)
}

pub async fn create(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<CreateWorkspaceBody>) -> MementoResult<Json<Value>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(MementoError::validation("workspace name must not be empty"));
    }
    if state.control.get_workspace_by_name(&auth.user_id, name).await?.is_some() {
        return Err(MementoError::validation(format!("workspace '{name}' already exists")));
    }
    let current = state.control.count_workspaces(&auth.user_id).await?;
    if auth.plan.max_workspaces.exceeded(current) {
        return Err(MementoError::Quota { resource: "workspaces".to_string(), limit: auth.plan.max_workspaces.limit().unwrap_or(0), current });
    }

    let db_url = workspace_db_url(&state.config, &auth.user_id, name);
    let ws = state.control.create_workspace(&auth.user_id, name, &db_url, None).await?;
    crate::auth::resolve_workspace_key(&state, &ws).await?;

    Ok(Json(json!(WorkspaceView::from(&ws))))
}

pub async fn delete(State(state): State<Arc<AppState>>, auth: AuthContext, Path(id): Path<String>) -> MementoResult<Json<Value>> {
    let ws = state.control.get_workspace_by_id(&id).await?.ok_or_else(|| MementoError::not_found("workspace", &id))?;
    if ws.user_id != auth.user_id {
        return Err(MementoError::Authorization);
    }
    state.control.delete_workspace(&id).await?;
    state.forget_workspace(&id);
    Ok(Json(json!({ "deleted": true, "id": id })))
}
