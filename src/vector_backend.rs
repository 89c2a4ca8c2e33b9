//! Opaque semantic-search collaborator (C5 hybrid ranking, C8 embedding
//! writes). Treated as two operations — index by id, search by text —
//! exactly as the specification scopes it; no concrete embedding provider
//! is wired in here.

use async_trait::async_trait;

#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Upserts (or replaces) the embedding for `memory_id` derived from
    /// `plaintext`. Fire-and-forget from the caller's point of view —
    /// failures are logged, never surfaced to the request.
    async fn index(&self, workspace_id: &str, memory_id: &str, plaintext: &str) -> anyhow::Result<()>;

    /// Semantic search over a workspace's index. Returns `(memory_id,
    /// score)` pairs with `score ∈ [0,1]`. An empty result is a valid
    /// "nothing relevant" answer, not a degraded-mode signal — degraded mode
    /// is a `None` backend entirely.
    async fn search(&self, workspace_id: &str, query: &str, limit: usize) -> anyhow::Result<Vec<(String, f64)>>;

    /// Drops a memory's embedding. Best-effort.
    async fn evict(&self, workspace_id: &str, memory_id: &str) -> anyhow::Result<()>;
}

/// No-op backend used when no semantic-search provider is configured.
/// Every call returns the degraded-but-valid "no results" answer, driving
/// hybrid ranking's keyword fallback.
pub struct NullVectorBackend;

#[async_trait]
impl VectorBackend for NullVectorBackend {
    async fn index(&self, _workspace_id: &str, _memory_id: &str, _plaintext: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn search(&self, _workspace_id: &str, _query: &str, _limit: usize) -> anyhow::Result<Vec<(String, f64)>> {
        Ok(Vec::new())
    }

    async fn evict(&self, _workspace_id: &str, _memory_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
