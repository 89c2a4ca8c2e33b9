use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::control::models::{Credential, User, Workspace};
use crate::error::{MementoError, MementoResult};
use crate::types::new_id;

/// The control schema: users, credentials, and the workspace registry. Owned
/// exclusively by the control store — no other component writes these
/// tables.
pub struct ControlStore {
    conn: Connection,
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ControlStore {
    pub async fn open(db_url: &str, db_token: Option<&str>) -> MementoResult<Self> {
        let conn = crate::db::open(db_url, db_token).await?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> MementoResult<Self> {
        let conn = crate::db::open_in_memory().await?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> MementoResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    plan TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS credentials (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    hash TEXT NOT NULL UNIQUE,
                    prefix TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    revoked_at TEXT,
                    last_used_at TEXT
                );
                CREATE TABLE IF NOT EXISTS workspaces (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    db_url TEXT NOT NULL,
                    db_token TEXT,
                    encrypted_key TEXT,
                    created_at TEXT NOT NULL,
                    UNIQUE(user_id, name)
                );
                "#,
            )
            .await
            .map_err(|e| MementoError::Storage(format!("control migration failed: {e}")))?;
        Ok(())
    }

    // -- users -------------------------------------------------

    pub async fn create_user(&self, email: &str, display_name: &str, plan: &str) -> MementoResult<User> {
        let user = User {
            id: new_id("usr"),
            email: email.to_string(),
            display_name: display_name.to_string(),
            plan: plan.to_string(),
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO users (id, email, display_name, plan, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.clone(),
                    user.email.clone(),
                    user.display_name.clone(),
                    user.plan.clone(),
                    user.created_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> MementoResult<Option<User>> {
        let mut rows = self
            .conn
            .query("SELECT id, email, display_name, plan, created_at FROM users WHERE id = ?1", params![id])
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(User {
                id: row.get::<String>(0)?,
                email: row.get::<String>(1)?,
                display_name: row.get::<String>(2)?,
                plan: row.get::<String>(3)?,
                created_at: parse_ts(&row.get::<String>(4)?),
            }))
        } else {
            Ok(None)
        }
    }

    // -- credentials -------------------------------------------------

    /// Create a new credential for `user_id`. Returns the row plus the
    /// plaintext secret, which is returned to the caller exactly once and
    /// never stored.
    pub async fn create_credential(&self, user_id: &str) -> MementoResult<(Credential, String)> {
        let secret = format!("mmt_{}", uuid::Uuid::new_v4().simple());
        let hash = blake3::hash(secret.as_bytes()).to_hex().to_string();
        let prefix = secret.chars().take(12).collect::<String>();
        let cred = Credential {
            id: new_id("cred"),
            user_id: user_id.to_string(),
            hash,
            prefix,
            created_at: Utc::now(),
            revoked_at: None,
            last_used_at: None,
        };
        self.conn
            .execute(
                "INSERT INTO credentials (id, user_id, hash, prefix, created_at, revoked_at, last_used_at) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL)",
                params![
                    cred.id.clone(),
                    cred.user_id.clone(),
                    cred.hash.clone(),
                    cred.prefix.clone(),
                    cred.created_at.to_rfc3339()
                ],
            )
            .await?;
        Ok((cred, secret))
    }

    pub fn hash_secret(secret: &str) -> String {
        blake3::hash(secret.as_bytes()).to_hex().to_string()
    }

    pub async fn find_credential_by_hash(&self, hash: &str) -> MementoResult<Option<Credential>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, hash, prefix, created_at, revoked_at, last_used_at FROM credentials WHERE hash = ?1",
                params![hash],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Credential {
                id: row.get::<String>(0)?,
                user_id: row.get::<String>(1)?,
                hash: row.get::<String>(2)?,
                prefix: row.get::<String>(3)?,
                created_at: parse_ts(&row.get::<String>(4)?),
                revoked_at: row.get::<Option<String>>(5)?.map(|s| parse_ts(&s)),
                last_used_at: row.get::<Option<String>>(6)?.map(|s| parse_ts(&s)),
            }))
        } else {
            Ok(None)
        }
    }

    /// Fire-and-forget last-used touch. Failures are logged, never surfaced.
    pub async fn touch_credential_last_used(&self, id: &str) {
        let now = Utc::now().to_rfc3339();
        if let Err(e) = self
            .conn
            .execute("UPDATE credentials SET last_used_at = ?1 WHERE id = ?2", params![now, id.to_string()])
            .await
        {
            tracing::warn!(error = %e, credential_id = id, "failed to update credential last_used_at");
        }
    }

    // -- workspaces -------------------------------------------------

    pub async fn get_workspace_by_name(&self, user_id: &str, name: &str) -> MementoResult<Option<Workspace>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, db_url, db_token, encrypted_key, created_at FROM workspaces WHERE user_id = ?1 AND name = ?2",
                params![user_id.to_string(), name.to_string()],
            )
            .await?;
        self.row_to_workspace(rows.next().await?)
    }

    pub async fn get_workspace_by_id(&self, id: &str) -> MementoResult<Option<Workspace>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, db_url, db_token, encrypted_key, created_at FROM workspaces WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;
        self.row_to_workspace(rows.next().await?)
    }

    fn row_to_workspace(&self, row: Option<libsql::Row>) -> MementoResult<Option<Workspace>> {
        Ok(match row {
            Some(row) => Some(Workspace {
                id: row.get::<String>(0)?,
                user_id: row.get::<String>(1)?,
                name: row.get::<String>(2)?,
                db_url: row.get::<String>(3)?,
                db_token: row.get::<Option<String>>(4)?,
                encrypted_key: row.get::<Option<String>>(5)?,
                created_at: parse_ts(&row.get::<String>(6)?),
            }),
            None => None,
        })
    }

    pub async fn list_workspaces(&self, user_id: &str) -> MementoResult<Vec<Workspace>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, db_url, db_token, encrypted_key, created_at FROM workspaces WHERE user_id = ?1 ORDER BY created_at ASC",
                params![user_id.to_string()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            if let Some(ws) = self.row_to_workspace(Some(row))? {
                out.push(ws);
            }
        }
        Ok(out)
    }

    pub async fn count_workspaces(&self, user_id: &str) -> MementoResult<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM workspaces WHERE user_id = ?1", params![user_id.to_string()])
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count as u64)
    }

    pub async fn create_workspace(&self, user_id: &str, name: &str, db_url: &str, db_token: Option<&str>) -> MementoResult<Workspace> {
        let ws = Workspace {
            id: new_id("ws"),
            user_id: user_id.to_string(),
            name: name.to_string(),
            db_url: db_url.to_string(),
            db_token: db_token.map(|s| s.to_string()),
            encrypted_key: None,
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO workspaces (id, user_id, name, db_url, db_token, encrypted_key, created_at) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
                params![
                    ws.id.clone(),
                    ws.user_id.clone(),
                    ws.name.clone(),
                    ws.db_url.clone(),
                    ws.db_token.clone(),
                    ws.created_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(ws)
    }

    pub async fn set_workspace_key(&self, workspace_id: &str, wrapped_blob: &str) -> MementoResult<()> {
        self.conn
            .execute(
                "UPDATE workspaces SET encrypted_key = ?1 WHERE id = ?2",
                params![wrapped_blob.to_string(), workspace_id.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Every workspace across every user. Used by the background scheduler,
    /// never by a request handler (which always scopes to one user).
    pub async fn list_all_workspaces(&self) -> MementoResult<Vec<Workspace>> {
        let mut rows = self
            .conn
            .query("SELECT id, user_id, name, db_url, db_token, encrypted_key, created_at FROM workspaces", ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            if let Some(ws) = self.row_to_workspace(Some(row))? {
                out.push(ws);
            }
        }
        Ok(out)
    }

    pub async fn delete_workspace(&self, id: &str) -> MementoResult<()> {
        self.conn
            .execute("DELETE FROM workspaces WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_find_credential() {
        let store = ControlStore::open_in_memory().await.unwrap();
        let user = store.create_user("a@example.com", "Alice", "free").await.unwrap();
        let (cred, secret) = store.create_credential(&user.id).await.unwrap();
        let hash = ControlStore::hash_secret(&secret);
        assert_eq!(hash, cred.hash);
        let found = store.find_credential_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.id, cred.id);
        assert!(found.is_active());
    }

    #[tokio::test]
    async fn workspace_quota_count() {
        let store = ControlStore::open_in_memory().await.unwrap();
        let user = store.create_user("b@example.com", "Bob", "free").await.unwrap();
        assert_eq!(store.count_workspaces(&user.id).await.unwrap(), 0);
        store.create_workspace(&user.id, "default", "./x.db", None).await.unwrap();
        assert_eq!(store.count_workspaces(&user.id).await.unwrap(), 1);
    }
}
