//! The control plane (C2): users, bearer credentials, and the workspace
//! registry. Exactly one control database per deployment, shared across all
//! tenants — the data each tenant actually owns lives in per-workspace
//! databases addressed by the rows here.

mod models;
mod store;

pub use models::{Credential, User, Workspace};
pub use store::ControlStore;
