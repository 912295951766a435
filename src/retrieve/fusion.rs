//! Multi-query helpers: related-query parsing and rank fusion.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::hierarchy::NodeId;
use crate::index::QueryResult;

/// Smoothing constant for reciprocal rank fusion.
pub const RRF_K: f64 = 60.0;

/// Fuse several rankings with reciprocal rank fusion.
///
/// A node's fused score is `Σ 1 / (k + rank)` over the rankings it appears
/// in (rank is 1-based). The returned hits keep the best similarity seen for
/// each node and are ordered by fused score, ties by lower node id.
pub fn reciprocal_rank_fusion(rankings: &[Vec<QueryResult>], k: f64) -> Vec<QueryResult> {
    fused_scores(rankings, k).into_iter().map(|(hit, _)| hit).collect()
}

/// [`reciprocal_rank_fusion`] with each hit's fused score alongside.
pub(crate) fn fused_scores(rankings: &[Vec<QueryResult>], k: f64) -> Vec<(QueryResult, f64)> {
    let mut fused: HashMap<NodeId, (f64, f32)> = HashMap::new();
    for ranking in rankings {
        for (rank, hit) in ranking.iter().enumerate() {
            let entry = fused.entry(hit.node_id).or_insert((0.0, f32::NEG_INFINITY));
            entry.0 += 1.0 / (k + rank as f64 + 1.0);
            entry.1 = entry.1.max(hit.score);
        }
    }
    let mut out: Vec<(QueryResult, f64)> = fused
        .into_iter()
        .map(|(node_id, (rrf, score))| (QueryResult { node_id, score }, rrf))
        .collect();
    out.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| a.0.node_id.cmp(&b.0.node_id))
    });
    out
}

/// Extract related queries from a model response.
///
/// Looks for a JSON array between the first `[` and the last `]`. Elements
/// may be strings or objects with a `"query"` string. Blank and repeated
/// queries (case-insensitive), and repeats of `original`, are dropped.
/// Returns `None` when no array parses.
pub fn parse_related_queries(response: &str, original: &str, max: usize) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(&response[start..=end]).ok()?;

    let mut seen: HashSet<String> = HashSet::from([original.trim().to_lowercase()]);
    let mut out = Vec::new();
    for item in items {
        let text = match &item {
            Value::String(s) => s.as_str(),
            Value::Object(map) => match map.get("query") {
                Some(Value::String(s)) => s.as_str(),
                _ => continue,
            },
            _ => continue,
        };
        let text = text.trim();
        if text.is_empty() || !seen.insert(text.to_lowercase()) {
            continue;
        }
        out.push(text.to_string());
        if out.len() == max {
            break;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: u32, score: f32) -> QueryResult {
        QueryResult {
            node_id: NodeId(id),
            score,
        }
    }

    #[test]
    fn test_rrf_rewards_agreement() {
        let a = vec![hit(1, 0.9), hit(2, 0.8), hit(3, 0.7)];
        let b = vec![hit(2, 0.85), hit(3, 0.6), hit(4, 0.5)];
        let fused = reciprocal_rank_fusion(&[a, b], RRF_K);
        let ids: Vec<u32> = fused.iter().map(|r| r.node_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);
        // Best similarity is kept.
        assert_eq!(fused[0].score, 0.85);
    }

    #[test]
    fn test_rrf_ties_by_id() {
        let fused = reciprocal_rank_fusion(&[vec![hit(7, 0.5)], vec![hit(3, 0.4)]], RRF_K);
        let ids: Vec<u32> = fused.iter().map(|r| r.node_id.0).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn test_fused_scores_sum_reciprocal_ranks() {
        let fused = fused_scores(&[vec![hit(1, 0.9), hit(2, 0.8)], vec![hit(2, 0.7)]], RRF_K);
        assert_eq!(fused[0].0.node_id, NodeId(2));
        assert!((fused[0].1 - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((fused[1].1 - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_strings_and_objects() {
        let response = r#"Sure! Here you go:
[{"query": "What drove revenue growth?"}, "How did margins change?", {"other": 1}, "  "]
Hope that helps."#;
        let parsed = parse_related_queries(response, "q", 4).unwrap();
        assert_eq!(
            parsed,
            vec!["What drove revenue growth?", "How did margins change?"]
        );
    }

    #[test]
    fn test_parse_drops_repeats_and_caps() {
        let response = r#"["Original?", "a", "A", "b", "c"]"#;
        let parsed = parse_related_queries(response, "original?", 2).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_related_queries("no json here", "q", 4).is_none());
        assert!(parse_related_queries("] backwards [", "q", 4).is_none());
        assert!(parse_related_queries("[not, json]", "q", 4).is_none());
    }
}
