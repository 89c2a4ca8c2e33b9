//! The workspace data plane (C3): one schema instance per tenant workspace,
//! holding memories, working-memory items, the skip list, identity
//! snapshots, consolidations, the access log, and settings.

pub mod models;
pub mod store;

pub use models::{
    AccessLogRow, ConsolidationRecord, ConsolidationType, IdentitySnapshot, Memory, SkipEntry,
    SynthesisMethod, WorkingMemoryItem,
};
pub use store::{ItemListFilter, ItemUpdate, MemoryListFilter, MemoryUpdate, WorkspaceStore};
