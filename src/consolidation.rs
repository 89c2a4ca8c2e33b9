//! Consolidation service (C7): union-find tag grouping for automatic
//! consolidation, plus agent-driven merge. Nothing is ever hard-deleted —
//! sources are flagged consolidated and pointed at the new memory.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;

use crate::crypto::{CryptoService, WorkspaceKey};
use crate::error::{MementoError, MementoResult};
use crate::types::{new_id, Linkage, MemoryType};
use crate::workspace::{ConsolidationRecord, ConsolidationType, Memory, SynthesisMethod, WorkspaceStore};

const MIN_GROUP_SIZE: usize = 3;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Groups `candidates` (already filtered to non-consolidated, non-expired,
/// tag-bearing memories) into connected components under the shared-tag
/// relation, keeping only components of size ≥3.
pub fn group_by_shared_tags(candidates: &[Memory]) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(candidates.len());
    let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, m) in candidates.iter().enumerate() {
        for tag in &m.tags {
            by_tag.entry(tag.to_lowercase()).or_default().push(idx);
        }
    }
    for members in by_tag.values() {
        for pair in members.windows(2) {
            uf.union(pair[0], pair[1]);
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..candidates.len() {
        let root = uf.find(idx);
        groups.entry(root).or_default().push(idx);
    }
    groups.into_values().filter(|g| g.len() >= MIN_GROUP_SIZE).collect()
}

fn template_summary(members: &[&Memory]) -> String {
    let mut tags: Vec<String> = members.iter().flat_map(|m| m.tags.iter().cloned()).collect::<HashSet<_>>().into_iter().collect();
    tags.sort();
    let mut out = format!("[{}] — {} memories consolidated\n", tags.join(", "), members.len());
    for m in members {
        out.push_str(&format!("• {} ({}, {})\n", m.content, m.memory_type.as_str(), m.created_at.to_rfc3339()));
    }
    out
}

fn modal_type(members: &[&Memory]) -> MemoryType {
    let mut counts: HashMap<&'static str, (usize, usize)> = HashMap::new();
    for (i, m) in members.iter().enumerate() {
        let entry = counts.entry(m.memory_type.as_str()).or_insert((0, i));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, (count, first_seen))| (*count, std::cmp::Reverse(*first_seen)))
        .and_then(|(name, _)| MemoryType::parse(name))
        .unwrap_or(MemoryType::Fact)
}

fn union_tags(members: &[&Memory]) -> Vec<String> {
    let set: HashSet<String> = members.iter().flat_map(|m| m.tags.iter().cloned()).collect();
    let mut tags: Vec<String> = set.into_iter().collect();
    tags.sort();
    tags
}

fn inherited_linkages(members: &[&Memory]) -> Vec<Linkage> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in members {
        for l in &m.linkages {
            let key = (l.kind().to_string(), l.target().to_string(), l.label().map(|s| s.to_string()));
            if seen.insert(key) {
                out.push(l.clone());
            }
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationOutcome {
    pub record: ConsolidationRecord,
    pub new_memory: Memory,
}

/// Builds and persists one consolidated memory (and its consolidation
/// record) from `members`, marking each source consolidated. Atomic at the
/// workspace level from the caller's point of view: the new memory is
/// written before any source is flagged, and flagging happens for every
/// source before returning.
async fn synthesize_group(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    members: &[Memory],
    consolidation_type: ConsolidationType,
    ai_summary: Option<String>,
    override_type: Option<MemoryType>,
    extra_tags: &[String],
) -> MementoResult<ConsolidationOutcome> {
    let refs: Vec<&Memory> = members.iter().collect();
    let template = template_summary(&refs);
    let (summary, method) = match ai_summary {
        Some(s) if !s.trim().is_empty() => (s, SynthesisMethod::Ai),
        _ => (template.clone(), SynthesisMethod::Template),
    };

    let mut tags = union_tags(&refs);
    for t in extra_tags {
        let lower = t.to_lowercase();
        if !tags.contains(&lower) {
            tags.push(lower);
        }
    }
    tags.sort();

    let new_memory_id = new_id("mem");
    let source_links: Vec<Linkage> = members
        .iter()
        .map(|m| Linkage::Memory { id: m.id.clone(), label: Some("consolidated-from".to_string()) })
        .collect();
    let mut linkages = inherited_linkages(&refs);
    linkages.extend(source_links);

    let total_access: u64 = members.iter().map(|m| m.access_count).sum();
    let memory_type = override_type.unwrap_or_else(|| modal_type(&refs));

    let content = match key {
        Some(k) => crypto.encrypt(&summary, k),
        None => summary.clone(),
    };

    let new_memory = Memory {
        id: new_memory_id.clone(),
        content,
        memory_type,
        tags: tags.clone(),
        created_at: Utc::now(),
        expires_at: None,
        relevance: 1.0,
        access_count: total_access,
        last_accessed_at: None,
        consolidated: false,
        consolidated_into: None,
        linkages,
        images: vec![],
    };
    store.insert_memory(&new_memory).await?;

    for m in members {
        store.mark_consolidated(&m.id, &new_memory_id).await?;
    }

    let record = ConsolidationRecord {
        id: new_id("cons"),
        summary: summary.clone(),
        source_ids: members.iter().map(|m| m.id.clone()).collect(),
        tags,
        consolidation_type,
        method,
        template_summary: if method == SynthesisMethod::Ai { Some(template) } else { None },
        new_memory_id: new_memory_id.clone(),
        created_at: Utc::now(),
    };
    store.insert_consolidation(&record).await?;

    let mut new_memory = new_memory;
    new_memory.content = summary;
    Ok(ConsolidationOutcome { record, new_memory })
}

/// Runs one automatic consolidation pass: group eligible candidates by
/// shared tag, synthesize every component of size ≥3. `ai_summarize`, when
/// given, is attempted per group and falls back to the template on `None`.
pub async fn run_automatic<F, Fut>(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    ai_summarize: Option<F>,
) -> MementoResult<Vec<ConsolidationOutcome>>
where
    F: Fn(Vec<Memory>) -> Fut,
    Fut: std::future::Future<Output = Option<String>>,
{
    let candidates: Vec<Memory> = store.active_candidates().await?.into_iter().filter(|m| !m.tags.is_empty()).collect();
    let groups = group_by_shared_tags(&candidates);

    let mut outcomes = Vec::new();
    for group in groups {
        let members: Vec<Memory> = group.into_iter().map(|i| candidates[i].clone()).collect();
        let ai_summary = match &ai_summarize {
            Some(f) => f(members.clone()).await,
            None => None,
        };
        let outcome = synthesize_group(store, crypto, key, &members, ConsolidationType::Auto, ai_summary, None, &[]).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Agent-driven merge of explicitly named sources. All ids must exist and
/// be non-consolidated, or the whole request is rejected.
pub async fn run_manual(
    store: &WorkspaceStore,
    crypto: &CryptoService,
    key: Option<&WorkspaceKey>,
    source_ids: &[String],
    summary: Option<String>,
    memory_type: Option<MemoryType>,
    extra_tags: &[String],
) -> MementoResult<ConsolidationOutcome> {
    if source_ids.len() < 2 {
        return Err(MementoError::validation("consolidation group requires at least 2 source ids"));
    }
    let mut members = Vec::with_capacity(source_ids.len());
    for id in source_ids {
        let m = store
            .get_memory(id)
            .await?
            .ok_or_else(|| MementoError::validation(format!("source memory '{id}' does not exist")))?;
        if m.consolidated {
            return Err(MementoError::validation(format!("source memory '{id}' is already consolidated")));
        }
        members.push(m);
    }
    synthesize_group(store, crypto, key, &members, ConsolidationType::Manual, summary, memory_type, extra_tags).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::new_id as nid;

    fn mem(tags: &[&str]) -> Memory {
        Memory {
            id: nid("mem"),
            content: "x".into(),
            memory_type: MemoryType::Fact,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
            expires_at: None,
            relevance: 1.0,
            access_count: 0,
            last_accessed_at: None,
            consolidated: false,
            consolidated_into: None,
            linkages: vec![],
            images: vec![],
        }
    }

    #[test]
    fn groups_by_shared_tag_minimum_three() {
        let candidates = vec![mem(&["a"]), mem(&["a"]), mem(&["a"]), mem(&["b"])];
        let groups = group_by_shared_tags(&candidates);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn no_group_under_three() {
        let candidates = vec![mem(&["a"]), mem(&["a"])];
        assert!(group_by_shared_tags(&candidates).is_empty());
    }
}
