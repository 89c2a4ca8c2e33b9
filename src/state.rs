//! Process-wide shared state: the control store, the crypto service, the
//! opaque collaborators, and a cache of open workspace store handles.
//! Exactly the shared resources §5 of the design calls out as safe for
//! concurrent reuse across requests.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::control::{ControlStore, Workspace};
use crate::crypto::CryptoService;
use crate::error::MementoResult;
use crate::llm::Llm;
use crate::rate_limit::SignupRateLimiter;
use crate::vector_backend::VectorBackend;
use crate::workspace::WorkspaceStore;

pub struct AppState {
    pub config: Config,
    pub control: ControlStore,
    pub crypto: CryptoService,
    pub vector: Arc<dyn VectorBackend>,
    pub llm: Arc<dyn Llm>,
    pub blob: Arc<dyn BlobStore>,
    pub signup_limiter: SignupRateLimiter,
    workspace_handles: DashMap<String, Arc<WorkspaceStore>>,
    workspace_inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl AppState {
    pub fn new(config: Config, control: ControlStore, vector: Arc<dyn VectorBackend>, llm: Arc<dyn Llm>, blob: Arc<dyn BlobStore>) -> Self {
        let crypto = CryptoService::new(config.master_key);
        Self {
            config,
            control,
            crypto,
            vector,
            llm,
            blob,
            signup_limiter: SignupRateLimiter::new(),
            workspace_handles: DashMap::new(),
            workspace_inflight: DashMap::new(),
        }
    }

    /// Returns the (cached) store handle for a workspace, opening it on
    /// first use. Concurrent callers for the same workspace single-flight
    /// on the open.
    pub async fn workspace_store(&self, ws: &Workspace) -> MementoResult<Arc<WorkspaceStore>> {
        if let Some(store) = self.workspace_handles.get(&ws.id) {
            return Ok(store.clone());
        }
        let lock = self
            .workspace_inflight
            .entry(ws.id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        if let Some(store) = self.workspace_handles.get(&ws.id) {
            return Ok(store.clone());
        }
        let store = Arc::new(WorkspaceStore::open(&ws.db_url, ws.db_token.as_deref()).await?);
        self.workspace_handles.insert(ws.id.clone(), store.clone());
        Ok(store)
    }

    /// Evicts a workspace's cached store handle and key, if any. Called on
    /// workspace deletion so a stale handle can't outlive its row.
    pub fn forget_workspace(&self, workspace_id: &str) {
        self.workspace_handles.remove(workspace_id);
        self.workspace_inflight.remove(workspace_id);
        self.crypto.invalidate(workspace_id);
    }
}
