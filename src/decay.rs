//! Decay worker (C13): periodic relevance recomputation over non-expired,
//! non-consolidated memories. Writes back only when the value changes, so a
//! sweep that finds nothing new does no I/O.

use chrono::Utc;

use crate::error::MementoResult;
use crate::scoring::relevance;
use crate::workspace::WorkspaceStore;

const EPSILON: f64 = 1e-9;

/// Runs one decay sweep, returning the number of memories whose relevance
/// was actually updated.
pub async fn run_sweep(store: &WorkspaceStore) -> MementoResult<u64> {
    let now = Utc::now();
    let mut updated = 0u64;
    for m in store.active_candidates().await? {
        let recomputed = relevance(&m, now);
        if (recomputed - m.relevance).abs() > EPSILON {
            store.set_relevance(&m.id, recomputed).await?;
            updated += 1;
        }
    }
    Ok(updated)
}
