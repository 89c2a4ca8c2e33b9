use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ImageMetadata, Linkage, MemoryType};

/// A stored memory row. `content` may be `enc:`-prefixed ciphertext;
/// whoever reads this struct out of the store is responsible for decrypting
/// it with the workspace key before handing it to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub relevance: f64,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub consolidated: bool,
    pub consolidated_into: Option<String>,
    pub linkages: Vec<Linkage>,
    pub images: Vec<ImageMetadata>,
}

impl Memory {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.consolidated && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkingMemoryItem {
    pub id: String,
    pub category: crate::types::ItemCategory,
    pub title: String,
    pub content: Option<String>,
    pub status: crate::types::ItemStatus,
    pub priority: i64,
    pub tags: Vec<String>,
    pub next_action: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipEntry {
    pub id: String,
    pub item: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentitySnapshot {
    pub id: String,
    pub crystal: String,
    pub source_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationType {
    Auto,
    Manual,
}

impl ConsolidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationType::Auto => "auto",
            ConsolidationType::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    Ai,
    Template,
}

impl SynthesisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisMethod::Ai => "ai",
            SynthesisMethod::Template => "template",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationRecord {
    pub id: String,
    pub summary: String,
    pub source_ids: Vec<String>,
    pub tags: Vec<String>,
    pub consolidation_type: ConsolidationType,
    pub method: SynthesisMethod,
    pub template_summary: Option<String>,
    pub new_memory_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessLogRow {
    pub id: String,
    pub memory_id: String,
    pub query: Option<String>,
    pub created_at: DateTime<Utc>,
}
