//! # Memento
//!
//! A multi-tenant memory service for autonomous agents. Agents call it to
//! persist, recall, consolidate, and forget structured pieces of knowledge
//! across sessions.
//!
//! The service is built around three ideas:
//! - **Multi-tenancy with envelope encryption** — a control plane owns
//!   users, credentials, and the workspace registry; each workspace is a
//!   logically isolated store whose sensitive fields are encrypted under a
//!   per-workspace data key, itself wrapped by a process-wide master key.
//! - **Hybrid ranking with decay** — keyword and (optional) semantic scores
//!   blend into a single ranking, with recency and access-frequency factors
//!   applied on top and periodically swept back into storage.
//! - **A context composer** — a single request that assembles working
//!   memory, ranked memories, skip-list matches, and identity under a
//!   cooperative cross-workspace "peek" protocol.
//!
//! ## Quick start
//!
//! ```ignore
//! use memento::state::AppState;
//! use memento::config::Config;
//! use memento::control::ControlStore;
//! use memento::vector_backend::NullVectorBackend;
//! use memento::llm::NullLlm;
//! use memento::blob::FsBlobStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     memento::init_logging();
//!     let config = Config::from_env();
//!     let control = ControlStore::open(&config.control_db_url, config.control_db_token.as_deref()).await?;
//!     let state = Arc::new(AppState::new(
//!         config,
//!         control,
//!         Arc::new(NullVectorBackend),
//!         Arc::new(NullLlm),
//!         Arc::new(FsBlobStore::new("./data/blobs")),
//!     ));
//!     let router = memento::http::router(state);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8787").await?;
//!     axum::serve(listener, router.into_make_service()).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod blob;
pub mod config;
pub mod consolidation;
pub mod context;
pub mod control;
pub mod crypto;
pub mod db;
pub mod decay;
pub mod distill;
pub mod error;
pub mod graph;
pub mod health;
pub mod http;
pub mod identity;
pub mod images;
pub mod items;
pub mod llm;
pub mod memories;
pub mod rate_limit;
pub mod scheduler;
pub mod scoring;
pub mod skip_list;
pub mod state;
pub mod types;
pub mod vector_backend;
pub mod workspace;

pub use config::Config;
pub use error::{MementoError, MementoResult};
pub use state::AppState;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use memento::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{MementoError, MementoResult};
    pub use crate::state::AppState;
    pub use crate::types::{ImageMetadata, ItemCategory, ItemStatus, Linkage, MemoryType};
    pub use crate::workspace::{Memory, WorkingMemoryItem};
    pub use chrono::{DateTime, Utc};
    pub use serde_json::{json, Value as JsonValue};
}

// ============================================================================
// Logging and Observability
// ============================================================================

/// Initializes the tracing subscriber from `MEMENTO_LOG` (default `info`).
/// Call once at process startup, before anything else logs.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MEMENTO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Initializes logging with an explicit level, ignoring `MEMENTO_LOG`. Used
/// by tests that want deterministic verbosity.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging_with_level(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
