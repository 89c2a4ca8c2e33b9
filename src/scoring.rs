//! Scoring engine (C5): keyword ranking with recency/access decay, hybrid
//! merge against an optional vector backend, abstention, and threshold
//! filtering.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::workspace::Memory;

/// Closed, documented stop-word set. Deliberately small — short numeric
/// tokens and most content words must survive tokenization.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "of", "to", "in", "on",
    "at", "for", "with", "and", "or", "but", "not", "this", "that", "it", "as", "by", "from",
];

/// Lowercases, strips to word characters, splits on whitespace, drops stop
/// words. Falls back to the un-filtered token list if stop-word removal
/// would leave nothing — the degenerate-query safeguard.
pub fn tokenize(query: &str) -> Vec<String> {
    let raw: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();
    let filtered: Vec<String> = raw.iter().filter(|w| !STOP_WORDS.contains(&w.as_str())).cloned().collect();
    if filtered.is_empty() {
        raw
    } else {
        filtered
    }
}

fn memory_tokens(m: &Memory) -> String {
    let mut s = m.content.to_lowercase();
    s.push(' ');
    s.push_str(&m.tags.join(" ").to_lowercase());
    s
}

/// `kw(M) = |{t ∈ Q : t ⊆ tokens(M)}| / |Q|`; `kw = 1` for an empty query
/// (decay-mode ranking with no keyword signal to apply).
pub fn kw_score(query: &[String], m: &Memory) -> f64 {
    if query.is_empty() {
        return 1.0;
    }
    let tokens = memory_tokens(m);
    let hits = query.iter().filter(|t| tokens.contains(t.as_str())).count();
    hits as f64 / query.len() as f64
}

const RECENCY_HALF_LIFE_DAYS: f64 = 7.0;
const ACCESS_BOOST_CAP: f64 = 2.0;
const LAST_ACCESS_WINDOW_HOURS: f64 = 48.0;

/// Exponential decay from creation time, ~7-day half-life. Future-dated
/// memories (clock skew, imported data) are clamped to full weight.
pub fn recency_factor(m: &Memory, now: DateTime<Utc>) -> f64 {
    let age_days = (now - m.created_at).num_seconds() as f64 / 86_400.0;
    if age_days <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(age_days / RECENCY_HALF_LIFE_DAYS).clamp(f64::MIN_POSITIVE, 1.0)
}

/// Monotonic in access count, capped at 2.0, so that heavily-accessed
/// memories surface more readily without ever dominating recency.
pub fn access_boost(m: &Memory) -> f64 {
    1.0 + (1.0 - (-(m.access_count as f64) / 10.0).exp()) * (ACCESS_BOOST_CAP - 1.0)
}

/// Bounded (≤1) bonus, maximal just after access, decaying linearly to 0
/// over ~48h. A memory never accessed carries the neutral factor 1.0 — this
/// is a boost on top of recency, not a replacement for it.
pub fn last_access_boost(m: &Memory, now: DateTime<Utc>) -> f64 {
    match m.last_accessed_at {
        None => 1.0,
        Some(last) => {
            let hours = (now - last).num_seconds() as f64 / 3600.0;
            if hours <= 0.0 {
                1.0
            } else {
                (1.0 - hours / LAST_ACCESS_WINDOW_HOURS).clamp(0.0, 1.0)
            }
        }
    }
}

pub fn relevance(m: &Memory, now: DateTime<Utc>) -> f64 {
    recency_factor(m, now) * access_boost(m) * last_access_boost(m, now)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f64,
    pub keyword_score: Option<f64>,
    pub vector_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingLabel {
    Keyword,
    Hybrid,
}

/// Ranks `candidates` against `query_tokens` under the keyword model only.
/// Implements the abstention rule: for a non-degenerate query, if no
/// candidate's *content* (not tags — a term present only in a tag must not
/// count as covered) contains some prepared token, the whole ranking is
/// suppressed rather than surfacing a weak best match.
pub fn rank_keyword(candidates: &[Memory], query_tokens: &[String], now: DateTime<Utc>) -> Vec<ScoredMemory> {
    if !query_tokens.is_empty() {
        let covered: HashSet<&str> = candidates
            .iter()
            .flat_map(|m| {
                let content = m.content.to_lowercase();
                query_tokens.iter().filter(move |t| content.contains(t.as_str())).map(|t| t.as_str())
            })
            .collect();
        if query_tokens.iter().any(|t| !covered.contains(t.as_str())) {
            return Vec::new();
        }
    }

    let mut scored: Vec<ScoredMemory> = candidates
        .iter()
        .filter_map(|m| {
            let kw = kw_score(query_tokens, m);
            if kw == 0.0 && !query_tokens.is_empty() {
                return None;
            }
            let score = kw * recency_factor(m, now) * access_boost(m) * last_access_boost(m, now);
            Some(ScoredMemory { memory: m.clone(), score, keyword_score: Some(kw), vector_score: None })
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(b.memory.created_at.cmp(&a.memory.created_at)));
    scored
}

pub fn apply_threshold(scored: Vec<ScoredMemory>, threshold: f64) -> Vec<ScoredMemory> {
    if threshold <= 0.0 {
        return scored;
    }
    scored.into_iter().filter(|s| s.score >= threshold).collect()
}

/// Merges a keyword ranking with vector-backend scores: `final = α·kw +
/// (1-α)·vec` over the union of ids. Falls back to pure keyword output
/// (labelled `keyword`) when the vector backend returned nothing.
pub fn blend_hybrid(
    keyword_ranked: Vec<ScoredMemory>,
    vector_scores: &[(String, f64)],
    all_candidates: &[Memory],
    alpha: f64,
) -> (Vec<ScoredMemory>, RankingLabel) {
    if vector_scores.is_empty() {
        return (keyword_ranked, RankingLabel::Keyword);
    }

    use std::collections::HashMap;
    let kw_by_id: HashMap<&str, &ScoredMemory> = keyword_ranked.iter().map(|s| (s.memory.id.as_str(), s)).collect();
    let vec_by_id: HashMap<&str, f64> = vector_scores.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    let mem_by_id: HashMap<&str, &Memory> = all_candidates.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut ids: Vec<String> = kw_by_id.keys().chain(vec_by_id.keys()).map(|s| s.to_string()).collect();
    ids.sort();
    ids.dedup();

    let mut merged: Vec<ScoredMemory> = ids
        .into_iter()
        .filter_map(|id| {
            let memory = kw_by_id.get(id.as_str()).map(|s| s.memory.clone()).or_else(|| mem_by_id.get(id.as_str()).map(|m| (*m).clone()))?;
            let kw = kw_by_id.get(id.as_str()).and_then(|s| s.keyword_score).unwrap_or(0.0);
            let vec = vec_by_id.get(id.as_str()).copied().unwrap_or(0.0);
            let score = alpha * kw + (1.0 - alpha) * vec;
            Some(ScoredMemory { memory, score, keyword_score: Some(kw), vector_score: Some(vec) })
        })
        .collect();
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(b.memory.created_at.cmp(&a.memory.created_at)));
    (merged, RankingLabel::Hybrid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::new_id;

    fn mem(content: &str, tags: &[&str], created_at: DateTime<Utc>) -> Memory {
        Memory {
            id: new_id("mem"),
            content: content.to_string(),
            memory_type: crate::types::MemoryType::Fact,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            created_at,
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
    fn tokenize_drops_stop_words_but_keeps_numbers() {
        let tokens = tokenize("the zod 42 schema");
        assert_eq!(tokens, vec!["zod", "42", "schema"]);
    }

    #[test]
    fn tokenize_falls_back_when_all_stop_words() {
        let tokens = tokenize("the a of");
        assert_eq!(tokens, vec!["the", "a", "of"]);
    }

    #[test]
    fn keyword_monotonicity() {
        let now = Utc::now();
        let a = mem("zod schema validation tool", &[], now);
        let b = mem("zod schema", &[], now);
        let q = vec!["zod".to_string(), "schema".to_string()];
        assert!(kw_score(&q, &a) >= kw_score(&q, &b));
    }

    #[test]
    fn abstention_on_uncovered_token() {
        let now = Utc::now();
        let candidates = vec![mem("alpha beta", &[], now)];
        let q = tokenize("xyzzy nonexistent");
        let ranked = rank_keyword(&candidates, &q, now);
        assert!(ranked.is_empty());
    }

    #[test]
    fn abstention_ignores_tag_only_coverage() {
        let now = Utc::now();
        let candidates = vec![mem("alpha beta", &["xyzzy"], now)];
        let q = tokenize("xyzzy");
        let ranked = rank_keyword(&candidates, &q, now);
        assert!(ranked.is_empty(), "a term present only in tags must not satisfy abstention coverage");
    }

    #[test]
    fn threshold_filters_low_scores() {
        let now = Utc::now();
        let candidates = vec![mem("zod schema", &[], now)];
        let q = tokenize("zod");
        let ranked = rank_keyword(&candidates, &q, now);
        let filtered = apply_threshold(ranked, 2.0);
        assert!(filtered.is_empty());
    }

    #[test]
    fn hybrid_blend_is_in_range() {
        let now = Utc::now();
        let m = mem("zod schema", &[], now);
        let id = m.id.clone();
        let candidates = vec![m];
        let q = tokenize("zod");
        let kw_ranked = rank_keyword(&candidates, &q, now);
        let (merged, label) = blend_hybrid(kw_ranked, &[(id, 0.8)], &candidates, 0.5);
        assert_eq!(label, RankingLabel::Hybrid);
        assert!(merged[0].score >= 0.0 && merged[0].score <= 1.0 + 1e-9);
    }

    #[test]
    fn empty_vector_scores_falls_back_to_keyword() {
        let now = Utc::now();
        let candidates = vec![mem("zod schema", &[], now)];
        let q = tokenize("zod");
        let kw_ranked = rank_keyword(&candidates, &q, now);
        let (_, label) = blend_hybrid(kw_ranked, &[], &candidates, 0.5);
        assert_eq!(label, RankingLabel::Keyword);
    }
}
