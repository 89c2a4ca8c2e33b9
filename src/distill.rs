//! Distill driver (C12): transcript → candidate memories via the opaque
//! LLM collaborator, with noise-tolerant JSON extraction and dedup against
//! existing content.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::Llm;
use crate::types::MemoryType;
use crate::workspace::Memory;

const MAX_CANDIDATES: usize = 20;
const MAX_TAGS: usize = 3;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    content: Option<String>,
    #[serde(rename = "type")]
    memory_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct Candidate {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
}

/// Strips code fences and falls back to the first `[ ... ]` substring when
/// the model wraps its JSON array in prose.
fn extract_json_array(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();
    if serde_json::from_str::<Value>(unfenced).is_ok() {
        return Some(unfenced.to_string());
    }
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

fn normalize_type(raw: Option<&str>) -> MemoryType {
    raw.and_then(MemoryType::parse).unwrap_or(MemoryType::Observation)
}

/// Parses the raw LLM response into validated candidates, tagging each with
/// `source:distill` and deduplicating against `existing`.
pub fn parse_candidates(raw: &str, existing: &[Memory]) -> Vec<Candidate> {
    let Some(json) = extract_json_array(raw) else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<Vec<RawCandidate>>(&json) else {
        return Vec::new();
    };

    let existing_contents: std::collections::HashSet<String> =
        existing.iter().map(|m| m.content.trim().to_lowercase()).collect();
    let mut seen_new: std::collections::HashSet<String> = std::collections::HashSet::new();

    let mut out = Vec::new();
    for raw in parsed.into_iter().take(MAX_CANDIDATES * 2) {
        let Some(content) = raw.content.filter(|c| !c.trim().is_empty()) else {
            continue;
        };
        let normalized = content.trim().to_lowercase();
        if existing_contents.contains(&normalized) || !seen_new.insert(normalized) {
            continue;
        }
        let mut tags: Vec<String> = raw.tags.into_iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).take(MAX_TAGS).collect();
        tags.push("source:distill".to_string());
        out.push(Candidate { content, memory_type: normalize_type(raw.memory_type.as_deref()), tags });
        if out.len() >= MAX_CANDIDATES {
            break;
        }
    }
    out
}

pub async fn distill(llm: &dyn Llm, transcript: &str, existing: &[Memory]) -> Vec<Candidate> {
    let context: Vec<String> = existing.iter().map(|m| m.content.clone()).collect();
    match llm.extract_memories(transcript, &context).await {
        Some(raw) => parse_candidates(&raw, existing),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let raw = "```json\n[{\"content\": \"uses zod\", \"type\": \"fact\", \"tags\": [\"mcp\"]}]\n```";
        let candidates = parse_candidates(raw, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].memory_type, MemoryType::Fact);
        assert!(candidates[0].tags.contains(&"source:distill".to_string()));
    }

    #[test]
    fn extracts_array_wrapped_in_prose() {
        let raw = "Here are the memories: [{\"content\": \"a fact\"}] thanks!";
        let candidates = parse_candidates(raw, &[]);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn dedupes_against_existing_content() {
        use crate::types::new_id;
        let existing = vec![Memory {
            id: new_id("mem"),
            content: "uses zod".to_string(),
            memory_type: MemoryType::Fact,
            tags: vec![],
            created_at: chrono::Utc::now(),
            expires_at: None,
            relevance: 1.0,
            access_count: 0,
            last_accessed_at: None,
            consolidated: false,
            consolidated_into: None,
            linkages: vec![],
            images: vec![],
        }];
        let raw = "[{\"content\": \"Uses Zod\"}]";
        let candidates = parse_candidates(raw, &existing);
        assert!(candidates.is_empty());
    }
}
