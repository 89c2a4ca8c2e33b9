use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::consolidation;
use crate::error::MementoResult;
use crate::http::respond::structured;
use crate::state::AppState;
use crate::types::MemoryType;

/// Triggers one automatic consolidation pass immediately, using the
/// workspace's LLM collaborator for synthesis when it returns a summary.
pub async fn run(State(state): State<Arc<AppState>>, auth: AuthContext) -> MementoResult<Json<Value>> {
    let llm = state.llm.clone();
    let outcomes = consolidation::run_automatic(&auth.store, &state.crypto, auth.workspace_key.as_deref(), Some(move |members: Vec<crate::workspace::Memory>| {
        let llm = llm.clone();
        async move {
            let bullets: Vec<String> = members.iter().map(|m| m.content.clone()).collect();
            llm.summarize(&bullets).await
        }
    }))
    .await?;
    Ok(structured(&outcomes))
}

#[derive(Debug, Deserialize)]
pub struct GroupBody {
    pub source_ids: Vec<String>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn group(State(state): State<Arc<AppState>>, auth: AuthContext, Json(body): Json<GroupBody>) -> MementoResult<Json<Value>> {
    let memory_type = match &body.memory_type {
        Some(s) => Some(MemoryType::parse(s).ok_or_else(|| crate::error::MementoError::validation(format!("unknown memory type '{s}'")))?),
        None => None,
    };
    let outcome = consolidation::run_manual(&auth.store, &state.crypto, auth.workspace_key.as_deref(), &body.source_ids, body.summary, memory_type, &body.tags).await?;
    Ok(structured(&outcome))
}
