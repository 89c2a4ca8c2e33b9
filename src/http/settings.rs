use axum::extract::Path;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::error::{MementoError, MementoResult};

/// The only workspace settings the service interprets. `PUT` rejects any
/// other key rather than silently accepting free-form configuration.
const RECOGNIZED_KEYS: &[&str] = &["recall_alpha", "recall_threshold"];

fn validate_value(key: &str, value: &str) -> MementoResult<()> {
    let parsed: f64 = value.parse().map_err(|_| MementoError::validation(format!("setting '{key}' must be a float")))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(MementoError::validation(format!("setting '{key}' must be in [0, 1]")));
    }
    Ok(())
}

pub async fn list(auth: AuthContext) -> MementoResult<Json<Value>> {
    let settings = auth.store.all_settings().await?;
    Ok(Json(json!(settings.into_iter().collect::<std::collections::HashMap<_, _>>())))
}

#[derive(Debug, Deserialize)]
pub struct PutSettingBody {
    pub value: String,
}

pub async fn put(auth: AuthContext, Path(key): Path<String>, Json(body): Json<PutSettingBody>) -> MementoResult<Json<Value>> {
    if !RECOGNIZED_KEYS.contains(&key.as_str()) {
        return Err(MementoError::validation(format!("unrecognized setting key '{key}'")));
    }
    validate_value(&key, &body.value)?;
    auth.store.set_setting(&key, &body.value).await?;
    Ok(Json(json!({ "key": key, "value": body.value })))
}

pub async fn delete(auth: AuthContext, Path(key): Path<String>) -> MementoResult<Json<Value>> {
    auth.store.delete_setting(&key).await?;
    Ok(Json(json!({ "deleted": true, "key": key })))
}
