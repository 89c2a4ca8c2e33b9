use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

/// A credential row. `hash` is the blake3 digest of the bearer secret, never
/// the secret itself.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    pub user_id: String,
    pub hash: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub db_url: String,
    pub db_token: Option<String>,
    pub encrypted_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
