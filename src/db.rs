//! Thin libsql connection helpers shared by the control store and every
//! workspace store. Both schemas support a local file backend and a remote
//! hosted (Turso/libSQL) backend — the locator is just a URL plus an
//! optional auth token, matching how the workspace row describes itself.

use libsql::{Builder, Connection};

use crate::error::{MementoError, MementoResult};

/// Open a connection against either a local sqlite file or a remote
/// libsql/Turso endpoint, depending on whether a token is present.
pub async fn open(db_url: &str, db_token: Option<&str>) -> MementoResult<Connection> {
    let database = match db_token {
        Some(token) if !token.is_empty() => Builder::new_remote(db_url.to_string(), token.to_string())
            .build()
            .await
            .map_err(|e| MementoError::Storage(format!("failed to open remote db: {e}")))?,
        _ => {
            if let Some(parent) = std::path::Path::new(db_url).parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
            }
            Builder::new_local(db_url)
                .build()
                .await
                .map_err(|e| MementoError::Storage(format!("failed to open local db: {e}")))?
        }
    };
    database
        .connect()
        .map_err(|e| MementoError::Storage(format!("failed to connect: {e}")))
}

pub async fn open_in_memory() -> MementoResult<Connection> {
    let database = Builder::new_local(":memory:")
        .build()
        .await
        .map_err(|e| MementoError::Storage(format!("failed to open in-memory db: {e}")))?;
    database
        .connect()
        .map_err(|e| MementoError::Storage(format!("failed to connect: {e}")))
}
