//! HTTP surface: one `axum::Router` wiring every endpoint in §6 to shared
//! `Arc<AppState>`. Handlers are grouped one module per resource, mirroring
//! the teacher's `http/` layout.

pub mod consolidation;
pub mod context;
pub mod health;
pub mod identity;
pub mod images;
pub mod memories;
pub mod respond;
pub mod settings;
pub mod signup;
pub mod skip_list;
pub mod workspaces;
pub mod working_memory;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Headroom over the raw image size cap for JSON/base64 overhead and the
/// surrounding request envelope.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/signup", post(signup::signup))
        .route("/memories", post(memories::create).get(memories::list))
        .route("/memories/recall", get(memories::recall))
        .route("/memories/ingest", post(memories::ingest))
        .route("/memories/distill", post(memories::distill))
        .route("/memories/:id", get(memories::get).put(memories::update).delete(memories::delete))
        .route("/memories/:id/graph", get(memories::graph))
        .route("/memories/:id/related", get(memories::related))
        .route("/working-memory", get(working_memory::overview))
        .route("/working-memory/items", post(working_memory::create_item).get(working_memory::list_items))
        .route(
            "/working-memory/items/:id",
            get(working_memory::get_item).put(working_memory::update_item).delete(working_memory::delete_item),
        )
        .route("/working-memory/:section", get(working_memory::get_section).put(working_memory::put_section))
        .route("/skip-list", get(skip_list::list).post(skip_list::add))
        .route("/skip-list/check", get(skip_list::check))
        .route("/skip-list/:id", delete(skip_list::remove))
        .route("/identity", get(identity::get).put(identity::put))
        .route("/identity/crystallize", post(identity::crystallize))
        .route("/identity/history", get(identity::history))
        .route("/consolidate", post(consolidation::run))
        .route("/consolidate/group", post(consolidation::group))
        .route("/context", post(context::compose))
        .route("/workspaces", post(workspaces::create).get(workspaces::list))
        .route("/workspaces/:id", delete(workspaces::delete))
        .route("/settings", get(settings::list))
        .route("/settings/:key", put(settings::put).delete(settings::delete))
        .route("/health", get(health::report))
        .route("/images/:workspace/:memory_id/:filename", get(images::fetch))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http().on_request(|req: &axum::http::Request<_>, _span: &tracing::Span| {
            tracing::info!(method = %req.method(), path = %req.uri().path(), "request");
        }))
        .with_state(state)
}
