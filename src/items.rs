//! Working-memory item CRUD (C8, item half). Quota applies only to
//! non-archived items; archived items never count against it.

use crate::config::Plan;
use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::{MementoError, MementoResult};
use crate::types::{new_id, ItemCategory, ItemStatus};
use crate::workspace::{ItemListFilter, ItemUpdate, WorkingMemoryItem, WorkspaceStore};

fn decrypt_item(mut it: WorkingMemoryItem, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<WorkingMemoryItem> {
    if let (Some(c), Some(k)) = (it.content.clone(), key) {
        it.content = Some(crypto.decrypt(&c, k)?);
    }
    Ok(it)
}

pub struct CreateItemInput {
    pub category: ItemCategory,
    pub title: String,
    pub content: Option<String>,
    pub priority: i64,
    pub tags: Vec<String>,
    pub next_action: Option<String>,
}

pub async fn create(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    plan: &Plan,
    input: CreateItemInput,
) -> MementoResult<WorkingMemoryItem> {
    if input.title.trim().is_empty() {
        return Err(MementoError::validation("item title must not be empty"));
    }
    let current = store.count_non_archived_items().await?;
    if plan.max_items.exceeded(current) {
        return Err(MementoError::Quota { resource: "items".to_string(), limit: plan.max_items.limit().unwrap_or(0), current });
    }

    let content = match (&input.content, key) {
        (Some(c), Some(k)) => Some(crypto.encrypt(c, k)),
        (c, _) => c.clone(),
    };
    let now = crate::types::now();
    let item = WorkingMemoryItem {
        id: new_id("item"),
        category: input.category,
        title: input.title,
        content,
        status: ItemStatus::Active,
        priority: input.priority,
        tags: crate::types::canonical_tags(input.tags).into_iter().collect(),
        next_action: input.next_action,
        created_at: now,
        updated_at: now,
        last_touched_at: now,
    };
    store.insert_item(&item).await?;
    decrypt_item(item, crypto, key)
}

pub async fn get(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>, id: &str) -> MementoResult<WorkingMemoryItem> {
    let item = store.get_item(id).await?.ok_or_else(|| MementoError::not_found("item", id))?;
    decrypt_item(item, crypto, key)
}

pub async fn list(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>, filter: &ItemListFilter) -> MementoResult<Vec<WorkingMemoryItem>> {
    let stored = store.list_items(&ItemListFilter { query: None, ..filter.clone() }).await?;
    let decrypted: MementoResult<Vec<WorkingMemoryItem>> = stored.into_iter().map(|i| decrypt_item(i, crypto, key)).collect();
    let mut decrypted = decrypted?;
    // Free-text query matches post-decryption when encryption is active.
    if let Some(q) = &filter.query {
        let q = q.to_lowercase();
        decrypted.retain(|i| i.title.to_lowercase().contains(&q) || i.content.as_deref().unwrap_or("").to_lowercase().contains(&q));
    }
    let offset = filter.offset.min(decrypted.len());
    let decrypted = decrypted.split_off(offset);
    Ok(match filter.limit {
        Some(limit) => decrypted.into_iter().take(limit).collect(),
        None => decrypted,
    })
}

#[derive(Default)]
pub struct UpdateItemInput {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub status: Option<ItemStatus>,
    pub priority: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub next_action: Option<Option<String>>,
}

pub async fn update(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    id: &str,
    input: UpdateItemInput,
) -> MementoResult<WorkingMemoryItem> {
    let update = ItemUpdate {
        title: input.title,
        content: input.content.map(|c| match (c, key) {
            (Some(plain), Some(k)) => Some(crypto.encrypt(&plain, k)),
            (c, _) => c,
        }),
        status: input.status,
        priority: input.priority,
        tags: input.tags.map(|t| crate::types::canonical_tags(t).into_iter().collect()),
        next_action: input.next_action,
    };
    let updated = store.update_item(id, update).await?.ok_or_else(|| MementoError::not_found("item", id))?;
    decrypt_item(updated, crypto, key)
}

pub async fn delete(store: &WorkspaceStore, id: &str) -> MementoResult<WorkingMemoryItem> {
    store.delete_item(id).await?.ok_or_else(|| MementoError::not_found("item", id))
}
