use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{MementoError, MementoResult};
use crate::state::AppState;
use crate::types::new_id;

#[derive(Debug, Deserialize, Default)]
pub struct SignupBody {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SignupBody>,
) -> MementoResult<Json<Value>> {
    if let Err(retry_after_secs) = state.signup_limiter.check(addr.ip()) {
        return Err(MementoError::RateLimited { retry_after_secs });
    }

    let email = body.email.unwrap_or_else(|| format!("{}@agents.memento.local", new_id("usr")));
    let display_name = body.display_name.unwrap_or_else(|| "Agent".to_string());

    let user = state.control.create_user(&email, &display_name, "free").await?;
    let (_credential, secret) = state.control.create_credential(&user.id).await?;

    let default_name = &state.config.default_workspace_name;
    let db_url = format!("{}/{}-{}.db", state.config.workspace_db_dir, user.id, default_name);
    let workspace = state.control.create_workspace(&user.id, default_name, &db_url, None).await?;
    crate::auth::resolve_workspace_key(&state, &workspace).await?;

    Ok(Json(json!({
        "api_key": secret,
        "user_id": user.id,
        "workspace": workspace.name,
    })))
}
