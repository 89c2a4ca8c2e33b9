//! Skip list service (C9): things an agent has already decided not to
//! investigate, with symmetric word-containment matching and TTL purge on
//! every read.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::{MementoError, MementoResult};
use crate::types::new_id;
use crate::workspace::{SkipEntry, WorkspaceStore};

fn words(s: &str) -> HashSet<String> {
    s.to_lowercase().split_whitespace().map(|w| w.to_string()).collect()
}

/// `match(q, item) ⇔ every word of q is in item ∨ every word of item is in
/// q`. The symmetry covers both a short query against a long item and a
/// long query against a short item.
pub fn matches(query: &str, item: &str) -> bool {
    let q = words(query);
    let i = words(item);
    if q.is_empty() || i.is_empty() {
        return false;
    }
    q.is_subset(&i) || i.is_subset(&q)
}

pub async fn add(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    item: &str,
    reason: &str,
    expires_at: DateTime<Utc>,
) -> MementoResult<SkipEntry> {
    if item.trim().is_empty() || reason.trim().is_empty() {
        return Err(MementoError::validation("skip list entry requires item and reason"));
    }
    let (stored_item, stored_reason) = match key {
        Some(k) => (crypto.encrypt(item, k), crypto.encrypt(reason, k)),
        None => (item.to_string(), reason.to_string()),
    };
    let entry = SkipEntry { id: new_id("skip"), item: stored_item, reason: stored_reason, expires_at, added_at: Utc::now() };
    store.insert_skip(&entry).await?;
    Ok(decrypt_entry(entry, crypto, key)?)
}

fn decrypt_entry(mut entry: SkipEntry, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<SkipEntry> {
    if let Some(k) = key {
        entry.item = crypto.decrypt(&entry.item, k)?;
        entry.reason = crypto.decrypt(&entry.reason, k)?;
    }
    Ok(entry)
}

pub async fn list(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<Vec<SkipEntry>> {
    store.list_skip().await?.into_iter().map(|e| decrypt_entry(e, crypto, key)).collect()
}

/// Returns at most one match for `query`, purging expired entries first.
pub async fn check(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    query: &str,
) -> MementoResult<Option<SkipEntry>> {
    for entry in list(store, crypto, key).await? {
        if matches(query, &entry.item) {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

pub async fn remove(store: &WorkspaceStore, id: &str) -> MementoResult<bool> {
    store.delete_skip(id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_short_query_long_item() {
        assert!(matches("vector search", "implement vector search feature"));
    }

    #[test]
    fn symmetric_long_query_short_item() {
        assert!(matches("implement vector search feature", "vector search"));
    }

    #[test]
    fn no_match_on_disjoint_words() {
        assert!(!matches("keyword matching", "vector search"));
    }
}
