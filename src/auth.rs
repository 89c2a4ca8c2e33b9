//! Auth + routing middleware (C4). Runs at the top of every authenticated
//! request: credential check, workspace resolution (with auto-create under
//! quota), and peek-workspace resolution.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::config::Plan;
use crate::control::Workspace;
use crate::crypto::WorkspaceKey;
use crate::error::MementoError;
use crate::state::AppState;
use crate::workspace::WorkspaceStore;

const MAX_PEEK_WORKSPACES: usize = 5;

/// One resolved peek target: a read-only handle into another of the user's
/// workspaces, named so results can be tagged with their origin.
#[derive(Clone)]
pub struct PeekHandle {
    pub name: String,
    pub store: Arc<WorkspaceStore>,
    pub key: Option<Arc<WorkspaceKey>>,
}

/// Everything a handler needs once a request has cleared authentication and
/// workspace resolution.
pub struct AuthContext {
    pub user_id: String,
    pub credential_id: String,
    pub workspace: Workspace,
    pub workspace_key: Option<Arc<WorkspaceKey>>,
    pub store: Arc<WorkspaceStore>,
    pub plan: Plan,
    pub peeks: Vec<PeekHandle>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts.headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

pub(crate) async fn resolve_workspace_key(state: &AppState, ws: &Workspace) -> Result<Option<Arc<WorkspaceKey>>, MementoError> {
    if state.crypto.is_degraded() && ws.encrypted_key.is_none() {
        // Degraded mode with no key ever materialized: fields stay plaintext.
        return Ok(None);
    }
    let workspace_id = ws.id.clone();
    let key = state
        .crypto
        .get_or_create_workspace_key(
            &workspace_id,
            || async { Ok(ws.encrypted_key.clone()) },
            |blob| {
                let workspace_id = workspace_id.clone();
                async move { state.control.set_workspace_key(&workspace_id, &blob).await }
            },
        )
        .await?;
    Ok(Some(key))
}

async fn resolve_named_workspace(state: &AppState, user_id: &str, name: &str, plan: &Plan) -> Result<Workspace, MementoError> {
    if let Some(ws) = state.control.get_workspace_by_name(user_id, name).await? {
        return Ok(ws);
    }
    let current = state.control.count_workspaces(user_id).await?;
    if plan.max_workspaces.exceeded(current) {
        return Err(MementoError::Quota { resource: "workspaces".to_string(), limit: plan.max_workspaces.limit().unwrap_or(0), current });
    }
    let db_url = format!("{}/{}-{}.db", state.config.workspace_db_dir, user_id, name);
    state.control.create_workspace(user_id, name, &db_url, None).await
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = MementoError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);

        let token = bearer_token(parts).ok_or(MementoError::Authentication)?;
        let hash = crate::control::ControlStore::hash_secret(token);
        let credential = app.control.find_credential_by_hash(&hash).await?.ok_or(MementoError::Authentication)?;
        if !credential.is_active() {
            return Err(MementoError::Authentication);
        }
        let credential_id = credential.id.clone();
        let user = app.control.get_user(&credential.user_id).await?.ok_or(MementoError::Authentication)?;
        let plan = app.config.plan(&user.plan);

        {
            let app = app.clone();
            let credential_id = credential_id.clone();
            tokio::spawn(async move { app.control.touch_credential_last_used(&credential_id).await });
        }

        let workspace_name = parts
            .headers
            .get("x-memento-workspace")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&app.config.default_workspace_name)
            .to_string();
        let workspace = resolve_named_workspace(&app, &user.id, &workspace_name, &plan).await?;
        let workspace_key = resolve_workspace_key(&app, &workspace).await?;
        let store = app.workspace_store(&workspace).await?;

        let mut peeks = Vec::new();
        if let Some(raw) = parts.headers.get("x-memento-peek-workspaces").and_then(|v| v.to_str().ok()) {
            let names: Vec<&str> = raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
            if names.len() > MAX_PEEK_WORKSPACES {
                return Err(MementoError::validation(format!("at most {MAX_PEEK_WORKSPACES} peek workspaces")));
            }
            for name in names {
                if name == workspace_name {
                    continue;
                }
                if let Some(peek_ws) = app.control.get_workspace_by_name(&user.id, name).await? {
                    let key = resolve_workspace_key(&app, &peek_ws).await?;
                    let store = app.workspace_store(&peek_ws).await?;
                    peeks.push(PeekHandle { name: name.to_string(), store, key });
                }
                // Unresolvable peek names are silently dropped per the spec.
            }
        }

        Ok(AuthContext { user_id: user.id, credential_id, workspace, workspace_key, store, plan, peeks })
    }
}

/// Resolves up to `MAX_PEEK_WORKSPACES` peek workspace names supplied in a
/// request body (the `/context` endpoint accepts this in addition to the
/// header form).
pub async fn resolve_peek_workspaces(app: &AppState, user_id: &str, names: &[String], local_name: &str) -> Result<Vec<PeekHandle>, MementoError> {
    if names.len() > MAX_PEEK_WORKSPACES {
        return Err(MementoError::validation(format!("at most {MAX_PEEK_WORKSPACES} peek workspaces")));
    }
    let mut peeks = Vec::new();
    for name in names {
        if name == local_name {
            continue;
        }
        if let Some(ws) = app.control.get_workspace_by_name(user_id, name).await? {
            let key = resolve_workspace_key(app, &ws).await?;
            let store = app.workspace_store(&ws).await?;
            peeks.push(PeekHandle { name: name.clone(), store, key });
        }
    }
    Ok(peeks)
}
