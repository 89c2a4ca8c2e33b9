//! Health report (ambient): a plaintext prose summary of one workspace's
//! state, covering working-memory freshness, memory counts by status,
//! skip-list size, access-log total, and quota usage.

use chrono::Utc;

use crate::config::Plan;
use crate::error::MementoResult;
use crate::types::ItemStatus;
use crate::workspace::WorkspaceStore;

fn quota_line(label: &str, current: u64, limit: Option<u64>) -> String {
    match limit {
        Some(limit) => format!("{label}: {current} / {limit}"),
        None => format!("{label}: {current} / unlimited"),
    }
}

pub async fn report(store: &WorkspaceStore, plan: &Plan, workspace_count: u64) -> MementoResult<String> {
    let now = Utc::now();
    let memories = store.all_memories().await?;
    let active = memories.iter().filter(|m| m.is_active(now)).count();
    let consolidated = memories.iter().filter(|m| m.consolidated).count();
    let expired = memories.iter().filter(|m| m.is_expired(now)).count();

    let items = store.all_items().await?;
    let non_archived = items.iter().filter(|i| i.status != ItemStatus::Archived).count();
    let stalest = items
        .iter()
        .filter(|i| i.status == ItemStatus::Active)
        .map(|i| i.last_touched_at)
        .min();

    let skip_count = store.list_skip().await?.len();
    let access_total = store.count_access_log().await?;

    let mut out = String::new();
    out.push_str("Memento workspace health\n");
    out.push_str("=========================\n\n");
    out.push_str(&format!(
        "Working memory: {non_archived} non-archived items{}.\n",
        match stalest {
            Some(ts) => format!(", oldest untouched since {}", ts.to_rfc3339()),
            None => String::new(),
        }
    ));
    out.push_str(&format!("Memories: {active} active, {consolidated} consolidated, {expired} expired ({} total).\n", memories.len()));
    out.push_str(&format!("Skip list: {skip_count} active entries.\n"));
    out.push_str(&format!("Access log: {access_total} recorded hits.\n\n"));
    out.push_str("Quota usage:\n");
    out.push_str(&format!("  {}\n", quota_line("memories", active as u64, plan.max_memories.limit())));
    out.push_str(&format!("  {}\n", quota_line("items", non_archived as u64, plan.max_items.limit())));
    out.push_str(&format!("  {}\n", quota_line("workspaces", workspace_count, plan.max_workspaces.limit())));

    Ok(out)
}
