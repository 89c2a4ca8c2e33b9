//! Image attachment handling (C8). Images are stored in the opaque blob
//! store keyed by `<workspace>/<memory_id>/<filename>` and referenced from
//! the memory row as metadata only — the blob is never inlined.

use crate::blob::BlobStore;
use crate::error::{MementoError, MementoResult};
use crate::types::ImageMetadata;

const ALLOWED_MIMETYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub fn blob_key(workspace_id: &str, memory_id: &str, filename: &str) -> String {
    format!("{workspace_id}/{memory_id}/{filename}")
}

pub async fn store(
    blob: &dyn BlobStore,
    workspace_id: &str,
    memory_id: &str,
    filename: &str,
    mimetype: &str,
    bytes: &[u8],
    max_size: u64,
) -> MementoResult<ImageMetadata> {
    if !ALLOWED_MIMETYPES.contains(&mimetype) {
        return Err(MementoError::validation(format!("unsupported image mimetype '{mimetype}'")));
    }
    if bytes.len() as u64 > max_size {
        return Err(MementoError::validation("image exceeds maximum size"));
    }
    let key = blob_key(workspace_id, memory_id, filename);
    blob.put(&key, bytes).await.map_err(|e| MementoError::Storage(e.to_string()))?;
    Ok(ImageMetadata { filename: filename.to_string(), mimetype: mimetype.to_string(), size_bytes: bytes.len() as u64, blob_key: key })
}

/// Serves an image only if `requested_workspace_id` matches the
/// authenticated workspace the path claims to belong to.
pub async fn fetch(
    blob: &dyn BlobStore,
    authenticated_workspace_id: &str,
    path_workspace_id: &str,
    memory_id: &str,
    filename: &str,
) -> MementoResult<Vec<u8>> {
    if authenticated_workspace_id != path_workspace_id {
        return Err(MementoError::Authorization);
    }
    let key = blob_key(path_workspace_id, memory_id, filename);
    blob.get(&key)
        .await
        .map_err(|e| MementoError::Storage(e.to_string()))?
        .ok_or_else(|| MementoError::not_found("image", filename))
}

pub async fn delete_all(blob: &dyn BlobStore, workspace_id: &str, memory_id: &str, images: &[ImageMetadata]) {
    for img in images {
        let key = blob_key(workspace_id, memory_id, &img.filename);
        if let Err(e) = blob.delete(&key).await {
            tracing::warn!(error = %e, key, "failed to delete image blob");
        }
    }
}
