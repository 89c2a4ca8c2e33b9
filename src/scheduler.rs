//! Background scheduler: periodic decay sweeps and automatic consolidation
//! passes across every workspace. Modeled as a config struct with interval
//! settings plus counters, the same shape the rest of this codebase uses
//! for its long-running background processes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub decay_interval: Duration,
    pub consolidation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { decay_interval: Duration::from_secs(15 * 60), consolidation_interval: Duration::from_secs(60 * 60) }
    }
}

#[derive(Default)]
pub struct SchedulerStats {
    pub decay_passes: AtomicU64,
    pub consolidation_passes: AtomicU64,
    pub memories_decayed: AtomicU64,
    pub groups_consolidated: AtomicU64,
}

pub fn spawn(state: Arc<AppState>, config: SchedulerConfig, stats: Arc<SchedulerStats>) {
    tokio::spawn(decay_loop(state.clone(), config.decay_interval, stats.clone()));
    tokio::spawn(consolidation_loop(state, config.consolidation_interval, stats));
}

async fn decay_loop(state: Arc<AppState>, interval: Duration, stats: Arc<SchedulerStats>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let workspaces = match state.control.list_all_workspaces().await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, "decay sweep: failed to list workspaces");
                continue;
            }
        };
        for ws in workspaces {
            let store = match state.workspace_store(&ws).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, workspace = %ws.id, "decay sweep: failed to open workspace");
                    continue;
                }
            };
            match crate::decay::run_sweep(&store).await {
                Ok(n) => {
                    stats.memories_decayed.fetch_add(n, Ordering::Relaxed);
                }
                Err(e) => tracing::warn!(error = %e, workspace = %ws.id, "decay sweep failed"),
            }
        }
        stats.decay_passes.fetch_add(1, Ordering::Relaxed);
    }
}

async fn consolidation_loop(state: Arc<AppState>, interval: Duration, stats: Arc<SchedulerStats>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let workspaces = match state.control.list_all_workspaces().await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, "consolidation sweep: failed to list workspaces");
                continue;
            }
        };
        for ws in workspaces {
            let store = match state.workspace_store(&ws).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, workspace = %ws.id, "consolidation sweep: failed to open workspace");
                    continue;
                }
            };
            let key = match resolve_key_quiet(&state, &ws).await {
                Some(k) => Some(k),
                None => None,
            };
            let none_fn: Option<fn(Vec<crate::workspace::Memory>) -> std::future::Ready<Option<String>>> = None;
            match crate::consolidation::run_automatic(&store, &state.crypto, key.as_deref(), none_fn).await {
                Ok(outcomes) => {
                    stats.groups_consolidated.fetch_add(outcomes.len() as u64, Ordering::Relaxed);
                }
                Err(e) => tracing::warn!(error = %e, workspace = %ws.id, "consolidation sweep failed"),
            }
        }
        stats.consolidation_passes.fetch_add(1, Ordering::Relaxed);
    }
}

async fn resolve_key_quiet(state: &AppState, ws: &crate::control::Workspace) -> Option<Arc<crate::crypto::WorkspaceKey>> {
    let Some(blob) = ws.encrypted_key.clone() else {
        return None;
    };
    state.crypto.unwrap_workspace_key(&blob).ok().map(Arc::new)
}
