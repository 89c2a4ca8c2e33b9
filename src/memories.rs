//! Memory CRUD (C8, memory half). Every handler here is responsible for
//! its own encryption envelope and quota check; the HTTP layer only
//! (de)serializes.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::Plan;
use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::{MementoError, MementoResult};
use crate::graph::validate_linkages;
use crate::types::{new_id, ImageMetadata, MemoryType};
use crate::workspace::{Memory, MemoryListFilter, MemoryUpdate, WorkspaceStore};

const MAX_IMAGES_PER_MEMORY: usize = 5;
const ALLOWED_IMAGE_MIMETYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub struct CreateMemoryInput {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub linkages: Vec<Value>,
    pub images: Vec<ImageMetadata>,
}

fn decrypt_memory(mut m: Memory, crypto: &CryptoService, key: Option<&WorkspaceKey>) -> MementoResult<Memory> {
    if let Some(k) = key {
        m.content = crypto.decrypt(&m.content, k)?;
    }
    Ok(m)
}

pub fn validate_images(images: &[ImageMetadata], max_size: u64) -> MementoResult<()> {
    if images.len() > MAX_IMAGES_PER_MEMORY {
        return Err(MementoError::validation(format!("at most {MAX_IMAGES_PER_MEMORY} images per memory")));
    }
    for img in images {
        if !ALLOWED_IMAGE_MIMETYPES.contains(&img.mimetype.as_str()) {
            return Err(MementoError::validation(format!("unsupported image mimetype '{}'", img.mimetype)));
        }
        if img.size_bytes > max_size {
            return Err(MementoError::validation("image exceeds maximum size"));
        }
    }
    Ok(())
}

pub async fn create(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    plan: &Plan,
    input: CreateMemoryInput,
) -> MementoResult<Memory> {
    if input.content.trim().is_empty() {
        return Err(MementoError::validation("memory content must not be empty"));
    }
    let current = store.count_active_memories().await?;
    if plan.max_memories.exceeded(current) {
        return Err(MementoError::Quota {
            resource: "memories".to_string(),
            limit: plan.max_memories.limit().unwrap_or(0),
            current,
        });
    }

    let linkages = validate_linkages(&input.linkages);
    let content = match key {
        Some(k) => crypto.encrypt(&input.content, k),
        None => input.content.clone(),
    };

    let memory = Memory {
        id: new_id("mem"),
        content,
        memory_type: input.memory_type,
        tags: crate::types::canonical_tags(input.tags).into_iter().collect(),
        created_at: Utc::now(),
        expires_at: input.expires_at,
        relevance: 1.0,
        access_count: 0,
        last_accessed_at: None,
        consolidated: false,
        consolidated_into: None,
        linkages,
        images: input.images,
    };
    store.insert_memory(&memory).await?;

    let mut out = memory.clone();
    out.content = input.content;
    Ok(out)
}

pub async fn get(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>, id: &str) -> MementoResult<Memory> {
    let m = store.get_memory(id).await?.ok_or_else(|| MementoError::not_found("memory", id))?;
    decrypt_memory(m, crypto, key)
}

pub async fn list(store: &WorkspaceStore, crypto: &CryptoService, key: Option<&WorkspaceKey>, filter: &MemoryListFilter) -> MementoResult<Vec<Memory>> {
    store.list_memories(filter).await?.into_iter().map(|m| decrypt_memory(m, crypto, key)).collect()
}

#[derive(Default)]
pub struct UpdateMemoryInput {
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub linkages: Option<Vec<Value>>,
}

pub async fn update(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    id: &str,
    input: UpdateMemoryInput,
) -> MementoResult<Memory> {
    let update = MemoryUpdate {
        content: match input.content {
            Some(c) => {
                if c.trim().is_empty() {
                    return Err(MementoError::validation("memory content must not be empty"));
                }
                Some(match key {
                    Some(k) => crypto.encrypt(&c, k),
                    None => c,
                })
            }
            None => None,
        },
        memory_type: input.memory_type,
        tags: input.tags.map(|t| crate::types::canonical_tags(t).into_iter().collect()),
        expires_at: input.expires_at,
        linkages: input.linkages.map(|raw| validate_linkages(&raw)),
    };
    let updated = store.update_memory(id, update).await?.ok_or_else(|| MementoError::not_found("memory", id))?;
    decrypt_memory(updated, crypto, key)
}

pub async fn delete(store: &WorkspaceStore, id: &str) -> MementoResult<Memory> {
    store.delete_memory(id).await?.ok_or_else(|| MementoError::not_found("memory", id))
}

/// Bulk ingest, tagging every inserted memory with `source:<src>`.
pub async fn ingest(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    plan: &Plan,
    source: &str,
    entries: Vec<CreateMemoryInput>,
) -> MementoResult<Vec<Memory>> {
    if entries.is_empty() {
        return Err(MementoError::validation("ingest batch must not be empty"));
    }
    if entries.len() > 100 {
        return Err(MementoError::validation("ingest batch exceeds 100 entries"));
    }
    let mut out = Vec::with_capacity(entries.len());
    for mut entry in entries {
        entry.tags.push(format!("source:{source}"));
        out.push(create(store, crypto, key, plan, entry).await?);
    }
    Ok(out)
}
