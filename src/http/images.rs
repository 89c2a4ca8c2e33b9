use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthContext;
use crate::error::MementoResult;
use crate::images;
use crate::state::AppState;

const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// `GET /images/:workspace/:memory_id/:filename`. The `:workspace` in the
/// path must match the authenticated caller's own workspace id; images are
/// never served cross-workspace, even under peek.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path((workspace_id, memory_id, filename)): Path<(String, String, String)>,
) -> MementoResult<Response> {
    let bytes = images::fetch(state.blob.as_ref(), &auth.workspace.id, &workspace_id, &memory_id, &filename).await?;

    let mimetype = auth
        .store
        .get_memory(&memory_id)
        .await?
        .and_then(|m| m.images.into_iter().find(|img| img.filename == filename).map(|img| img.mimetype))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, mimetype), (header::CACHE_CONTROL, CACHE_CONTROL.to_string())], Bytes::from(bytes)).into_response())
}
