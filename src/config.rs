//! Process configuration, loaded from the environment.
//!
//! There is no config file or CLI wizard here (that's the out-of-scope setup
//! tool) — the running service reads everything it needs from environment
//! variables with documented defaults, the way `mnemosyne`/`engram` size
//! their server binaries in this corpus.

use std::collections::HashMap;
use std::env;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanQuota {
    Limited(u64),
    Unlimited,
}

impl PlanQuota {
    pub fn limit(&self) -> Option<u64> {
        match self {
            PlanQuota::Limited(n) => Some(*n),
            PlanQuota::Unlimited => None,
        }
    }

    pub fn exceeded(&self, current: u64) -> bool {
        matches!(self, PlanQuota::Limited(n) if current >= *n)
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub name: String,
    pub max_workspaces: PlanQuota,
    pub max_memories: PlanQuota,
    pub max_items: PlanQuota,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub master_key: Option<[u8; 32]>,
    pub environment: String,
    pub control_db_url: String,
    pub control_db_token: Option<String>,
    pub workspace_db_dir: String,
    pub bind_addr: String,
    pub max_image_size_bytes: u64,
    pub max_images_per_memory: usize,
    pub default_workspace_name: String,
    pub plans: HashMap<String, Plan>,
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_plans() -> HashMap<String, Plan> {
    let mut plans = HashMap::new();
    plans.insert(
        "free".to_string(),
        Plan {
            name: "free".to_string(),
            max_workspaces: PlanQuota::Limited(3),
            max_memories: PlanQuota::Limited(500),
            max_items: PlanQuota::Limited(100),
        },
    );
    plans.insert(
        "pro".to_string(),
        Plan {
            name: "pro".to_string(),
            max_workspaces: PlanQuota::Limited(25),
            max_memories: PlanQuota::Limited(20_000),
            max_items: PlanQuota::Limited(2_000),
        },
    );
    plans.insert(
        "unlimited".to_string(),
        Plan {
            name: "unlimited".to_string(),
            max_workspaces: PlanQuota::Unlimited,
            max_memories: PlanQuota::Unlimited,
            max_items: PlanQuota::Unlimited,
        },
    );
    plans
}

impl Config {
    pub fn from_env() -> Self {
        let master_key = env_var("MEMENTO_MASTER_KEY").and_then(|v| {
            let bytes = B64.decode(v).ok()?;
            if bytes.len() == 32 {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Some(arr)
            } else {
                tracing::warn!("MEMENTO_MASTER_KEY is not 32 bytes after base64 decoding; ignoring");
                None
            }
        });

        Self {
            master_key,
            environment: env_var("MEMENTO_ENV").unwrap_or_else(|| "development".to_string()),
            control_db_url: env_var("MEMENTO_CONTROL_DB_URL")
                .unwrap_or_else(|| "./data/control.db".to_string()),
            control_db_token: env_var("MEMENTO_CONTROL_DB_TOKEN"),
            workspace_db_dir: env_var("MEMENTO_WORKSPACE_DB_DIR")
                .unwrap_or_else(|| "./data/workspaces".to_string()),
            bind_addr: env_var("MEMENTO_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8787".to_string()),
            max_image_size_bytes: 10 * 1024 * 1024,
            max_images_per_memory: 5,
            default_workspace_name: "default".to_string(),
            plans: default_plans(),
        }
    }

    pub fn plan(&self, name: &str) -> Plan {
        self.plans
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.plans.get("free").cloned().expect("free plan always present"))
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_plan_never_exceeded() {
        assert!(!PlanQuota::Unlimited.exceeded(u64::MAX));
    }

    #[test]
    fn limited_plan_exceeded_at_boundary() {
        let q = PlanQuota::Limited(3);
        assert!(!q.exceeded(2));
        assert!(q.exceeded(3));
    }
}
