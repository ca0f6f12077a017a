// ── Engine: Query Strategy Selection ───────────────────────────────────────
//
// Decides, per query, which store(s) to consult. Each store gets a score
// from four signals: the per-type preference table, the urgency weight, an
// estimated query complexity, and the response-cache status. When one score
// clears the other by the configured margin only that store is queried
// (single-system, low latency); otherwise both are queried and merged.
//
// All scoring is keyword/structure heuristics: fast and deterministic.

use crate::atoms::types::{MemoryHit, MemoryQuery, MemoryQueryType, ResponseSource};

// ═══════════════════════════════════════════════════════════════════════════
// Signal weights
// ═══════════════════════════════════════════════════════════════════════════

/// Share of the score coming from the type preference table.
const TYPE_WEIGHT: f64 = 0.45;

/// Share coming from the urgency signal (urgent → System 1).
const URGENCY_WEIGHT: f64 = 0.3;

/// Share coming from the complexity estimate (complex → System 2).
const COMPLEXITY_WEIGHT_S1: f64 = 0.15;
const COMPLEXITY_WEIGHT_S2: f64 = 0.25;

/// Flat bonus System 1 receives when the cache is warm for this key space.
const CACHE_WARM_BONUS: f64 = 0.1;

/// Token count at which the length factor reaches one half.
const LENGTH_KNEE_TOKENS: f64 = 20.0;

// ═══════════════════════════════════════════════════════════════════════════
// Strategy Selection
// ═══════════════════════════════════════════════════════════════════════════

/// The routing decision for one query.
#[derive(Debug, Clone, Copy)]
pub struct StrategyDecision {
    pub system1_score: f64,
    pub system2_score: f64,
    pub route: ResponseSource,
}

/// Score both stores and pick a route. `margin` is the score gap beyond
/// which a single store answers alone.
pub fn select_strategy(query: &MemoryQuery, cache_warm: bool, margin: f64) -> StrategyDecision {
    let (pref_s1, pref_s2) = type_preference(query.query_type);
    let urgency = query.urgency.weight();
    let complexity = complexity_estimate(&query.text);

    let system1_score = TYPE_WEIGHT * pref_s1
        + URGENCY_WEIGHT * urgency
        + COMPLEXITY_WEIGHT_S1 * (1.0 - complexity)
        + if cache_warm { CACHE_WARM_BONUS } else { 0.0 };
    let system2_score = TYPE_WEIGHT * pref_s2
        + URGENCY_WEIGHT * (1.0 - urgency)
        + COMPLEXITY_WEIGHT_S2 * complexity;

    let route = if system1_score - system2_score > margin {
        ResponseSource::System1
    } else if system2_score - system1_score > margin {
        ResponseSource::System2
    } else {
        ResponseSource::Both
    };

    StrategyDecision { system1_score, system2_score, route }
}

/// Per-type store preference (System 1 bias, System 2 bias).
fn type_preference(query_type: MemoryQueryType) -> (f64, f64) {
    match query_type {
        MemoryQueryType::Knowledge => (0.8, 0.3),
        MemoryQueryType::Pattern => (0.9, 0.2),
        MemoryQueryType::Preference => (0.85, 0.25),
        MemoryQueryType::Reasoning => (0.2, 0.9),
        MemoryQueryType::Decision => (0.3, 0.85),
        MemoryQueryType::Quality => (0.3, 0.8),
        MemoryQueryType::General => (0.5, 0.5),
    }
}

/// Token/structure complexity heuristic, 0.0 (trivial) to 1.0 (elaborate).
pub fn complexity_estimate(text: &str) -> f64 {
    let tokens = text.split_whitespace().count() as f64;
    if tokens == 0.0 {
        return 0.0;
    }
    let length_factor = tokens / (tokens + LENGTH_KNEE_TOKENS);

    let structure_chars = text
        .chars()
        .filter(|c| matches!(c, '?' | ';' | ',' | '(' | ')' | '{' | '}'))
        .count() as f64;
    let structure_factor = (structure_chars / tokens).min(1.0);

    (length_factor * 0.7 + structure_factor * 0.3).clamp(0.0, 1.0)
}

// ═══════════════════════════════════════════════════════════════════════════
// Result Merging
// ═══════════════════════════════════════════════════════════════════════════

/// Blend the two stores' confidences for a Both response. `weight_s1` is
/// System 1's configurable share; the remainder goes to System 2.
pub fn blend_confidence(system1: f64, system2: f64, weight_s1: f64) -> f64 {
    let w1 = weight_s1.clamp(0.0, 1.0);
    (system1 * w1 + system2 * (1.0 - w1)).clamp(0.0, 1.0)
}

/// Union of the two hit lists: System 1 contributes fast candidates,
/// System 2 contributes validated context. Deduplicated by hit id (higher
/// score wins), sorted by score with id tie-break, truncated to `limit`.
pub fn merge_hits(
    system1: Vec<MemoryHit>,
    system2: Vec<MemoryHit>,
    limit: usize,
) -> Vec<MemoryHit> {
    let mut merged: Vec<MemoryHit> = Vec::with_capacity(system1.len() + system2.len());
    for hit in system1.into_iter().chain(system2) {
        match merged.iter().position(|h| h.id == hit.id) {
            Some(i) if hit.score > merged[i].score => merged[i] = hit,
            Some(_) => {}
            None => merged.push(hit),
        }
    }

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(limit);
    merged
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::Priority;

    #[test]
    fn critical_knowledge_routes_to_system1() {
        let query = MemoryQuery::new(MemoryQueryType::Knowledge, "tokio spawn")
            .with_urgency(Priority::Critical);
        let decision = select_strategy(&query, true, 0.25);
        assert_eq!(decision.route, ResponseSource::System1);
        assert!(decision.system1_score > decision.system2_score);
    }

    #[test]
    fn ambiguous_low_urgency_routes_to_both() {
        let query = MemoryQuery::new(MemoryQueryType::General, "how should we structure this")
            .with_urgency(Priority::Low);
        let decision = select_strategy(&query, false, 0.25);
        assert_eq!(decision.route, ResponseSource::Both);
    }

    #[test]
    fn reasoning_routes_to_system2() {
        let query = MemoryQuery::new(
            MemoryQueryType::Reasoning,
            "why did we reject the connection-pool approach, and what were the tradeoffs?",
        )
        .with_urgency(Priority::Low);
        let decision = select_strategy(&query, false, 0.25);
        assert_eq!(decision.route, ResponseSource::System2);
    }

    #[test]
    fn complexity_grows_with_length_and_structure() {
        let trivial = complexity_estimate("parse json");
        let elaborate = complexity_estimate(
            "given a streaming parser, how do we recover from malformed frames (partial \
             headers, truncated bodies), re-synchronize, and surface errors to the caller?",
        );
        assert!(elaborate > trivial);
        assert!(complexity_estimate("") < f64::EPSILON);
    }

    #[test]
    fn blend_respects_configured_weight() {
        assert!((blend_confidence(1.0, 0.0, 0.6) - 0.6).abs() < 1e-9);
        assert!((blend_confidence(0.0, 1.0, 0.6) - 0.4).abs() < 1e-9);
        assert!((blend_confidence(0.8, 0.8, 0.6) - 0.8).abs() < 1e-9);
    }

    fn hit(id: &str, source: ResponseSource, score: f64) -> MemoryHit {
        MemoryHit {
            id: id.to_string(),
            source,
            label: id.to_string(),
            content: String::new(),
            score,
        }
    }

    #[test]
    fn merge_dedups_and_sorts() {
        let s1 = vec![
            hit("a", ResponseSource::System1, 0.9),
            hit("b", ResponseSource::System1, 0.4),
        ];
        let s2 = vec![
            hit("b", ResponseSource::System2, 0.7), // higher score wins the dedup
            hit("c", ResponseSource::System2, 0.5),
        ];

        let merged = merge_hits(s1, s2, 10);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[1].id, "b");
        assert_eq!(merged[1].source, ResponseSource::System2);
        assert_eq!(merged[2].id, "c");
    }

    #[test]
    fn merge_truncates_to_limit() {
        let s1 = (0..5).map(|i| hit(&format!("s1-{i}"), ResponseSource::System1, 0.5)).collect();
        let s2 = (0..5).map(|i| hit(&format!("s2-{i}"), ResponseSource::System2, 0.4)).collect();
        assert_eq!(merge_hits(s1, s2, 3).len(), 3);
    }
}
