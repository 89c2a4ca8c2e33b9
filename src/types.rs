//! Core domain types shared across the crate.
//!
//! These are the typed sum/product types backing the workspace data model:
//! memory/linkage/item/skip-entry variants are explicit enums rather than
//! dynamically-shaped records, so unknown variants are rejected (or dropped,
//! per the write-time rule each caller documents) rather than mis-parsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Short opaque id used for every entity in the system.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

/// A canonicalized, deduplicated tag set (lowercase, order-independent on
/// comparison but kept sorted for deterministic serialization).
pub type TagSet = BTreeSet<String>;

pub fn canonical_tags<I: IntoIterator<Item = String>>(tags: I) -> TagSet {
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Decision,
    Instruction,
    Observation,
    Preference,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Decision => "decision",
            MemoryType::Instruction => "instruction",
            MemoryType::Observation => "observation",
            MemoryType::Preference => "preference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(MemoryType::Fact),
            "decision" => Some(MemoryType::Decision),
            "instruction" => Some(MemoryType::Instruction),
            "observation" => Some(MemoryType::Observation),
            "preference" => Some(MemoryType::Preference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    ActiveWork,
    StandingDecision,
    SkipList,
    WaitingFor,
    SessionNote,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::ActiveWork => "active_work",
            ItemCategory::StandingDecision => "standing_decision",
            ItemCategory::SkipList => "skip_list",
            ItemCategory::WaitingFor => "waiting_for",
            ItemCategory::SessionNote => "session_note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active_work" => Some(ItemCategory::ActiveWork),
            "standing_decision" => Some(ItemCategory::StandingDecision),
            "skip_list" => Some(ItemCategory::SkipList),
            "waiting_for" => Some(ItemCategory::WaitingFor),
            "session_note" => Some(ItemCategory::SessionNote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Paused => "paused",
            ItemStatus::Completed => "completed",
            ItemStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ItemStatus::Active),
            "paused" => Some(ItemStatus::Paused),
            "completed" => Some(ItemStatus::Completed),
            "archived" => Some(ItemStatus::Archived),
            _ => None,
        }
    }
}

/// Status filter for memory listing (`active | consolidated | expired | all`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatusFilter {
    Active,
    Consolidated,
    Expired,
    All,
}

impl MemoryStatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "consolidated" => Some(Self::Consolidated),
            "expired" => Some(Self::Expired),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    CreatedAt,
    Relevance,
    AccessCount,
    LastAccessedAt,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "relevance" => Some(Self::Relevance),
            "access_count" => Some(Self::AccessCount),
            "last_accessed_at" => Some(Self::LastAccessedAt),
            _ => None,
        }
    }
}

/// A typed linkage edge attached to a memory. Invalid shapes are rejected at
/// the parse boundary (validation in `crate::graph`), never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Linkage {
    Memory {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Item {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    File {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl Linkage {
    pub fn label(&self) -> Option<&str> {
        match self {
            Linkage::Memory { label, .. }
            | Linkage::Item { label, .. }
            | Linkage::File { label, .. } => label.as_deref(),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Linkage::Memory { id, .. } | Linkage::Item { id, .. } => id,
            Linkage::File { path, .. } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Linkage::Memory { .. } => "memory",
            Linkage::Item { .. } => "item",
            Linkage::File { .. } => "file",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub mimetype: String,
    pub size_bytes: u64,
    pub blob_key: String,
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
