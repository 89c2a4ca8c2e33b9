//! Linkage graph service (C6): validation at write time, forward/reverse
//! edge discovery, and BFS subgraph extraction.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;

use crate::error::MementoResult;
use crate::types::Linkage;
use crate::workspace::WorkspaceStore;

pub const MAX_DEPTH: u32 = 5;

/// Parses one raw linkage value into a typed `Linkage`, returning `None` for
/// anything that doesn't match one of the three variants. Unknown shapes are
/// dropped, never rejected with an error — per-linkage invalidity is not a
/// request-level failure.
pub fn parse_linkage(raw: &Value) -> Option<Linkage> {
    let obj = raw.as_object()?;
    let label = obj.get("label").and_then(|v| v.as_str()).map(|s| s.to_string());
    match obj.get("type").and_then(|v| v.as_str())? {
        "memory" => Some(Linkage::Memory { id: obj.get("id")?.as_str()?.to_string(), label }),
        "item" => Some(Linkage::Item { id: obj.get("id")?.as_str()?.to_string(), label }),
        "file" => Some(Linkage::File { path: obj.get("path")?.as_str()?.to_string(), label }),
        _ => None,
    }
}

pub fn validate_linkages(raw: &[Value]) -> Vec<Linkage> {
    raw.iter().filter_map(parse_linkage).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub depth: u32,
    pub content_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn preview(content: &str) -> String {
    content.chars().take(120).collect()
}

/// Edges a memory declares outward: `memory`/`item` linkages plus synthetic
/// `file:<path>` targets for `file` linkages.
fn outgoing(m: &crate::workspace::Memory) -> Vec<(String, Option<String>)> {
    m.linkages
        .iter()
        .map(|l| {
            let target = match l {
                Linkage::Memory { id, .. } | Linkage::Item { id, .. } => id.clone(),
                Linkage::File { path, .. } => format!("file:{path}"),
            };
            (target, l.label().map(|s| s.to_string()))
        })
        .collect()
}

/// Reverse-lookup: memories whose linkage list names `target` as a `memory`
/// edge. A substring match on the serialized linkage is never sufficient on
/// its own — the candidate is always confirmed against the typed list.
fn incoming<'a>(all: &'a [crate::workspace::Memory], target: &str) -> Vec<(&'a crate::workspace::Memory, Option<String>)> {
    all.iter()
        .filter_map(|m| {
            m.linkages.iter().find_map(|l| match l {
                Linkage::Memory { id, label } if id == target => Some((m, label.clone())),
                _ => None,
            })
        })
        .collect()
}

/// BFS subgraph starting at `start_id`, traversing `memory` edges forward
/// and in reverse up to `depth` (capped at `MAX_DEPTH`). `file` edges emit a
/// synthetic leaf node but are never traversed further.
pub async fn subgraph(store: &WorkspaceStore, start_id: &str, depth: u32) -> MementoResult<Subgraph> {
    let depth = depth.min(MAX_DEPTH);
    let Some(start) = store.get_memory(start_id).await? else {
        return Ok(Subgraph::default());
    };

    let all = store.all_memories().await?;
    let mut result = Subgraph::default();
    let mut seen_nodes: HashSet<String> = HashSet::new();
    let mut seen_edges: HashSet<(String, String, Option<String>)> = HashSet::new();
    let mut queue: VecDeque<(crate::workspace::Memory, u32)> = VecDeque::new();

    seen_nodes.insert(start.id.clone());
    result.nodes.push(GraphNode { id: start.id.clone(), depth: 0, content_preview: preview(&start.content) });
    queue.push_back((start, 0));

    while let Some((node, node_depth)) = queue.pop_front() {
        for (target, label) in outgoing(&node) {
            let edge_key = (node.id.clone(), target.clone(), label.clone());
            if seen_edges.insert(edge_key) {
                result.edges.push(GraphEdge { from: node.id.clone(), to: target.clone(), label: label.clone() });
            }
            if let Some(file_path) = target.strip_prefix("file:") {
                if seen_nodes.insert(target.clone()) {
                    result.nodes.push(GraphNode { id: format!("file:{file_path}"), depth: node_depth + 1, content_preview: String::new() });
                }
                continue;
            }
            if node_depth < depth && !seen_nodes.contains(&target) {
                if let Some(next) = all.iter().find(|m| m.id == target).cloned() {
                    seen_nodes.insert(target.clone());
                    result.nodes.push(GraphNode { id: next.id.clone(), depth: node_depth + 1, content_preview: preview(&next.content) });
                    queue.push_back((next, node_depth + 1));
                }
            }
        }

        for (source, label) in incoming(&all, &node.id) {
            let edge_key = (source.id.clone(), node.id.clone(), label.clone());
            if seen_edges.insert(edge_key) {
                result.edges.push(GraphEdge { from: source.id.clone(), to: node.id.clone(), label: label.clone() });
            }
            if node_depth < depth && !seen_nodes.contains(&source.id) {
                seen_nodes.insert(source.id.clone());
                result.nodes.push(GraphNode { id: source.id.clone(), depth: node_depth + 1, content_preview: preview(&source.content) });
                queue.push_back((source.clone(), node_depth + 1));
            }
        }
    }

    Ok(result)
}

/// Memories directly related to `memory_id`: union of forward `memory`
/// targets and reverse sources, deduplicated by id.
pub async fn related(store: &WorkspaceStore, memory_id: &str) -> MementoResult<Vec<crate::workspace::Memory>> {
    let Some(m) = store.get_memory(memory_id).await? else {
        return Ok(Vec::new());
    };
    let all = store.all_memories().await?;
    let mut ids: HashSet<String> = HashSet::new();
    for l in &m.linkages {
        if let Linkage::Memory { id, .. } = l {
            ids.insert(id.clone());
        }
    }
    for (source, _) in incoming(&all, memory_id) {
        ids.insert(source.id.clone());
    }
    Ok(all.into_iter().filter(|cand| ids.contains(&cand.id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_linkage_type_is_dropped() {
        let raw = serde_json::json!([
            {"type": "memory", "id": "mem_1"},
            {"type": "bogus", "id": "x"},
        ]);
        let parsed = validate_linkages(raw.as_array().unwrap());
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn file_linkage_requires_path() {
        let raw = serde_json::json!([{"type": "file"}]);
        let parsed = validate_linkages(raw.as_array().unwrap());
        assert!(parsed.is_empty());
    }
}
