//! The two response envelopes used across the HTTP surface: agent-facing
//! prose the caller can present directly, and structured native JSON for
//! programmatic callers.

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

pub fn agent_text(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "content": [{ "type": "text", "text": text.into() }] }))
}

pub fn structured<T: Serialize>(value: &T) -> Json<Value> {
    Json(serde_json::to_value(value).unwrap_or(Value::Null))
}

/// Query-string switch most listing/recall endpoints expose: `format=json`
/// selects the structured envelope over the default agent-facing prose.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct FormatParam {
    #[serde(default)]
    pub format: Option<String>,
}

impl FormatParam {
    pub fn wants_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}
