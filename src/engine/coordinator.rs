// ── Engine: Coordinator ────────────────────────────────────────────────────
//
// Keeps the two stores consistent and tuned. Each maintenance cycle moves
// Idle → Syncing → Optimizing → ConflictCheck → Idle, driven by two
// independent timers; the shared `maintenance` mutex prevents concurrent
// Sync and Optimize phases from mutating the same store simultaneously,
// and the cancel flag is checked between phases so `clear_memory` can
// preempt an in-flight cycle.
//
// Responsibilities:
//   - synchronize_systems: four cross-layer transfers, each audited as a
//     SyncPoint; idempotent via sha256 source fingerprints
//   - optimize_performance: ranked recommendations from router metrics;
//     automated low-risk ones are applied immediately
//   - resolve_conflicts: four conflict classes, strategy-driven, every
//     detection logged, no silent drops
//   - adapt_to_user_behavior: recent-event pattern detection feeding
//     targeted nudges into either store
//
// Failure semantics: any single transfer/recommendation/resolution failure
// is caught and logged; the rest of the cycle proceeds (best-effort batch).

use crate::atoms::error::MemoryResult;
use crate::atoms::system1_types::BestPractice;
use crate::atoms::system2_types::{DecisionNodeKind, Evidence};
use crate::atoms::types::{
    ConflictKind, ConflictResolution, ConflictStrategy, CoordinatorPhase, MemoryEvent,
    MemoryEventKind, OptimizationRecommendation, ResponseSource, SyncPoint, SyncTransfer,
};
use crate::engine::router::{DualMemoryEngine, EngineShared};
use chrono::Utc;
use log::{info, warn};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ═════════════════════════════════════════════════════════════════════════════
// Constants
// ═════════════════════════════════════════════════════════════════════════════

/// Node confidence at or above which knowledge transfers into System 2
/// evidence.
const KNOWLEDGE_TRANSFER_FLOOR: f64 = 0.75;

/// How many top nodes the knowledge transfer considers per cycle.
const KNOWLEDGE_TRANSFER_LIMIT: usize = 5;

/// Sealed-trace quality at or above which learning data flows back into
/// System 1 best practices.
const LEARNING_QUALITY_FLOOR: f64 = 0.7;

/// Recommendations at or below this risk may be applied automatically.
const AUTO_APPLY_RISK_CEILING: f64 = 0.3;

/// Divergence thresholds for conflict detection.
const DATA_DIVERGENCE_THRESHOLD: f64 = 0.3;
const QUALITY_FLOOR_DIVERGENCE: f64 = 0.3;

/// Repetitions of a suggestion outcome before an adaptation fires.
const BEHAVIOR_REPEAT_THRESHOLD: usize = 3;

// ═════════════════════════════════════════════════════════════════════════════
// Coordinator
// ═════════════════════════════════════════════════════════════════════════════

pub struct Coordinator {
    shared: Arc<EngineShared>,
    phase: Mutex<CoordinatorPhase>,
    sync_points: Mutex<VecDeque<SyncPoint>>,
    conflicts: Mutex<VecDeque<ConflictResolution>>,
    recommendations: Mutex<VecDeque<OptimizationRecommendation>>,
    /// Source fingerprints from the last successful run of each transfer.
    sync_fingerprints: Mutex<HashMap<SyncTransfer, Vec<u8>>>,
    /// Events already considered by behavior adaptation.
    adapted_events: Mutex<HashSet<String>>,
}

impl Coordinator {
    pub fn new(engine: &DualMemoryEngine) -> Self {
        Self::from_shared(engine.shared())
    }

    pub(crate) fn from_shared(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            phase: Mutex::new(CoordinatorPhase::Idle),
            sync_points: Mutex::new(VecDeque::new()),
            conflicts: Mutex::new(VecDeque::new()),
            recommendations: Mutex::new(VecDeque::new()),
            sync_fingerprints: Mutex::new(HashMap::new()),
            adapted_events: Mutex::new(HashSet::new()),
        }
    }

    pub fn phase(&self) -> CoordinatorPhase {
        *self.phase.lock()
    }

    // ── Public cycle entry points ───────────────────────────────────────

    /// Run the four cross-layer transfers. Returns the SyncPoints recorded
    /// this run (transfers whose source is unchanged are skipped entirely,
    /// which is what makes re-running with no new events idempotent).
    pub fn synchronize_systems(&self) -> Vec<SyncPoint> {
        let _guard = self.shared.maintenance.lock();
        let points = self.sync_locked();
        *self.phase.lock() = CoordinatorPhase::Idle;
        points
    }

    /// Run the optimization pass alone.
    pub fn optimize_performance(&self) -> Vec<OptimizationRecommendation> {
        let _guard = self.shared.maintenance.lock();
        let recs = self.optimize_locked();
        *self.phase.lock() = CoordinatorPhase::Idle;
        recs
    }

    /// Run conflict detection and resolution alone.
    pub fn resolve_conflicts(&self) -> Vec<ConflictResolution> {
        let _guard = self.shared.maintenance.lock();
        let found = self.conflicts_locked();
        *self.phase.lock() = CoordinatorPhase::Idle;
        found
    }

    /// The optimization timer's full cycle: Optimizing → ConflictCheck →
    /// Idle, with behavior adaptation folded into the conflict phase.
    pub(crate) fn run_optimize_cycle(&self) {
        let _guard = self.shared.maintenance.lock();
        self.optimize_locked();
        if !self.cancelled() {
            self.conflicts_locked();
            self.adapt_recent_locked();
        }
        *self.phase.lock() = CoordinatorPhase::Idle;
    }

    // ── Synchronization ─────────────────────────────────────────────────

    fn sync_locked(&self) -> Vec<SyncPoint> {
        *self.phase.lock() = CoordinatorPhase::Syncing;
        let mut recorded = Vec::new();

        for transfer in [
            SyncTransfer::KnowledgeToReasoning,
            SyncTransfer::QualityToPatterns,
            SyncTransfer::Preferences,
            SyncTransfer::LearningData,
        ] {
            if self.cancelled() {
                info!("[coordinator] Sync preempted by clear_memory");
                break;
            }

            let fingerprint = self.source_fingerprint(transfer);
            {
                let fingerprints = self.sync_fingerprints.lock();
                if fingerprints.get(&transfer) == Some(&fingerprint) {
                    // Source unchanged since the last run: skip without a
                    // SyncPoint so re-syncs are observably idempotent
                    continue;
                }
            }

            let started = Instant::now();
            let result = self.run_transfer(transfer);
            let latency_ms = started.elapsed().as_millis() as u64;

            let point = match result {
                Ok(items_written) => {
                    self.sync_fingerprints.lock().insert(transfer, fingerprint);
                    SyncPoint {
                        id: uuid::Uuid::new_v4().to_string(),
                        transfer,
                        timestamp: Utc::now(),
                        latency_ms,
                        success: true,
                        items_written,
                        detail: None,
                    }
                }
                Err(e) => {
                    warn!("[coordinator] Transfer {transfer:?} failed: {e}");
                    SyncPoint {
                        id: uuid::Uuid::new_v4().to_string(),
                        transfer,
                        timestamp: Utc::now(),
                        latency_ms,
                        success: false,
                        items_written: 0,
                        detail: Some(e.to_string()),
                    }
                }
            };
            recorded.push(point.clone());

            let retention = self.shared.config.read().audit_retention;
            let mut points = self.sync_points.lock();
            points.push_back(point);
            while points.len() > retention {
                points.pop_front();
            }
        }

        if !recorded.is_empty() {
            info!("[coordinator] ✓ Sync cycle recorded {} transfers", recorded.len());
        }
        recorded
    }

    /// Content fingerprint of a transfer's source-side data.
    fn source_fingerprint(&self, transfer: SyncTransfer) -> Vec<u8> {
        let mut hasher = Sha256::new();
        match transfer {
            SyncTransfer::KnowledgeToReasoning => {
                let system1 = self.shared.system1.read();
                for node in system1.top_nodes_by_confidence(KNOWLEDGE_TRANSFER_LIMIT) {
                    hasher.update(node.id.as_bytes());
                    hasher.update(format!("{:.3}", node.confidence).as_bytes());
                }
            }
            SyncTransfer::QualityToPatterns => {
                let system2 = self.shared.system2.read();
                for (domain, quality) in system2.quality_by_domain() {
                    hasher.update(domain.as_bytes());
                    hasher.update(format!("{quality:.3}").as_bytes());
                }
            }
            SyncTransfer::Preferences => {
                let system1 = self.shared.system1.read();
                if let Ok(serialized) = serde_json::to_vec(system1.preferences()) {
                    hasher.update(&serialized);
                }
            }
            SyncTransfer::LearningData => {
                let system2 = self.shared.system2.read();
                for trace in system2.sealed_traces_above(LEARNING_QUALITY_FLOOR) {
                    hasher.update(trace.id.as_bytes());
                }
            }
        }
        hasher.finalize().to_vec()
    }

    fn run_transfer(&self, transfer: SyncTransfer) -> MemoryResult<usize> {
        match transfer {
            // High-confidence System 1 knowledge becomes decision-tree
            // evidence in System 2
            SyncTransfer::KnowledgeToReasoning => {
                let top = {
                    let system1 = self.shared.system1.read();
                    system1.top_nodes_by_confidence(KNOWLEDGE_TRANSFER_LIMIT)
                };
                let mut written = 0;
                let mut system2 = self.shared.system2.write();
                for node in top.iter().filter(|n| n.confidence >= KNOWLEDGE_TRANSFER_FLOOR) {
                    let domain =
                        node.metadata.domain.clone().unwrap_or_else(|| "knowledge".to_string());
                    let tree_id = system2.create_decision_tree(
                        &domain,
                        DecisionNodeKind::Condition,
                        "established knowledge applies?",
                    );
                    system2.add_evidence(
                        &tree_id,
                        0,
                        Evidence {
                            description: node.name.clone(),
                            strength: node.confidence,
                            source: "system1_sync".to_string(),
                            added_at: Utc::now(),
                        },
                    )?;
                    written += 1;
                }
                Ok(written)
            }

            // Observed per-domain trace quality nudges pattern relevance
            SyncTransfer::QualityToPatterns => {
                let by_domain = {
                    let system2 = self.shared.system2.read();
                    system2.quality_by_domain()
                };
                let mut system1 = self.shared.system1.write();
                let mut written = 0;
                for (domain, quality) in by_domain {
                    written += system1.adjust_pattern_relevance(&domain, quality);
                }
                Ok(written)
            }

            // System 1's preference record mirrors into System 2
            SyncTransfer::Preferences => {
                let preferences = self.shared.system1.read().preferences().clone();
                self.shared.system2.write().apply_preferences(&preferences);
                Ok(1)
            }

            // High-quality sealed traces distill into best practices
            SyncTransfer::LearningData => {
                let traces = {
                    let system2 = self.shared.system2.read();
                    system2.sealed_traces_above(LEARNING_QUALITY_FLOOR)
                };
                let mut system1 = self.shared.system1.write();
                let mut written = 0;
                for trace in traces {
                    let title = match &trace.conclusion {
                        Some(c) if !c.is_empty() => c.clone(),
                        _ => continue,
                    };
                    if system1.has_best_practice(&title) {
                        continue;
                    }
                    system1.add_best_practice(BestPractice {
                        id: uuid::Uuid::new_v4().to_string(),
                        title,
                        description: trace.context.problem.clone(),
                        language: None,
                        tags: vec![trace.metadata.domain.clone()],
                        created_at: Utc::now(),
                    });
                    written += 1;
                }
                Ok(written)
            }
        }
    }

    // ── Optimization ────────────────────────────────────────────────────

    fn optimize_locked(&self) -> Vec<OptimizationRecommendation> {
        *self.phase.lock() = CoordinatorPhase::Optimizing;

        // Scheduled decay piggybacks on the optimization timer
        let half_life = self.shared.config.read().decay_half_life_days;
        self.shared.system1.write().decay(half_life);

        if self.cancelled() {
            return Vec::new();
        }

        let metrics = self.shared.metrics.lock().clone();
        let s1_stats = self.shared.system1.read().stats();
        let config = self.shared.config.read().clone();

        let mut recs: Vec<OptimizationRecommendation> = Vec::new();

        if metrics.total_operations >= 20 && metrics.cache_hit_rate() < 0.2 {
            recs.push(recommendation(
                format!(
                    "Raise cache TTL from {}s: hit rate {:.0}%",
                    config.cache_ttl_secs,
                    metrics.cache_hit_rate() * 100.0
                ),
                0.6,
                0.1,
                0.1,
                true,
            ));
        }

        if s1_stats.nodes * 10 >= config.system1_capacity * 9 {
            recs.push(recommendation(
                format!(
                    "System 1 at {}/{} nodes: raise capacity or tighten eviction",
                    s1_stats.nodes, config.system1_capacity
                ),
                0.7,
                0.4,
                0.5,
                false,
            ));
        }

        if metrics.error_rate() > 0.1 {
            recs.push(recommendation(
                format!("Error rate {:.0}%: review failing operations", metrics.error_rate() * 100.0),
                0.8,
                0.6,
                0.3,
                false,
            ));
        }

        if metrics.avg_latency_ms > 50.0 && metrics.total_operations >= 20 {
            recs.push(recommendation(
                format!(
                    "Average latency {:.0}ms: narrow the single-system margin",
                    metrics.avg_latency_ms
                ),
                0.5,
                0.1,
                0.2,
                true,
            ));
        }

        // Priority = benefit/effort, tie-break by lower risk
        recs.sort_by(|a, b| {
            b.priority()
                .partial_cmp(&a.priority())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.risk.partial_cmp(&b.risk).unwrap_or(std::cmp::Ordering::Equal))
        });

        for rec in &mut recs {
            if rec.automated && rec.risk <= AUTO_APPLY_RISK_CEILING {
                if let Err(e) = self.apply_recommendation(rec) {
                    warn!("[coordinator] Failed to apply '{}': {e}", rec.description);
                    continue;
                }
                rec.applied = true;
                info!("[coordinator] ✓ Applied: {}", rec.description);
            }
        }

        let retention = self.shared.config.read().audit_retention;
        let mut stored = self.recommendations.lock();
        for rec in &recs {
            stored.push_back(rec.clone());
            while stored.len() > retention {
                stored.pop_front();
            }
        }

        recs
    }

    /// Apply one automated tuning change to the live configuration.
    fn apply_recommendation(&self, rec: &OptimizationRecommendation) -> MemoryResult<()> {
        if rec.description.contains("cache TTL") {
            let mut config = self.shared.config.write();
            config.cache_ttl_secs = (config.cache_ttl_secs.max(1) * 2).min(600);
            self.shared.cache.lock().set_ttl(Duration::from_secs(config.cache_ttl_secs));
        } else if rec.description.contains("single-system margin") {
            let mut config = self.shared.config.write();
            config.single_system_margin = (config.single_system_margin * 0.8).max(0.05);
        }
        Ok(())
    }

    // ── Conflict detection & resolution ─────────────────────────────────

    fn conflicts_locked(&self) -> Vec<ConflictResolution> {
        *self.phase.lock() = CoordinatorPhase::ConflictCheck;
        let strategy = self.shared.config.read().conflict_strategy;
        let mut found = Vec::new();

        // 1. Data inconsistency: the stores disagree about how good the
        //    current knowledge actually is
        let (node_count, avg_confidence) = {
            let system1 = self.shared.system1.read();
            let nodes = system1.top_nodes_by_confidence(usize::MAX);
            let count = nodes.len();
            let avg = if count == 0 {
                0.0
            } else {
                nodes.iter().map(|n| n.confidence).sum::<f64>() / count as f64
            };
            (count, avg)
        };
        let baseline = self.shared.system2.read().quality_baseline();
        if node_count > 0 && (avg_confidence - baseline).abs() > DATA_DIVERGENCE_THRESHOLD {
            let winner = match strategy {
                ConflictStrategy::System1Priority => {
                    self.shared.system2.write().nudge_quality_floor(-0.05);
                    Some(ResponseSource::System1)
                }
                ConflictStrategy::System2Priority => {
                    self.shared.system1.write().decay(7.0);
                    Some(ResponseSource::System2)
                }
                ConflictStrategy::Balanced => {
                    self.shared.system2.write().nudge_quality_floor(-0.02);
                    self.shared.system1.write().decay(21.0);
                    None
                }
            };
            found.push(self.record_conflict(
                ConflictKind::DataInconsistency,
                strategy,
                winner,
                0.7,
                (avg_confidence - baseline).abs(),
                format!(
                    "System 1 mean confidence {avg_confidence:.2} vs System 2 quality baseline {baseline:.2}"
                ),
            ));
        }

        // 2. Preference mismatch between the live record and the mirror
        let s1_lang = self.shared.system1.read().preferences().preferred_language.clone();
        let s2_lang = self.shared.system2.read().preference_mirror().preferred_language.clone();
        if let (Some(live), Some(mirror)) = (&s1_lang, &s2_lang) {
            if live != mirror {
                let winner = match strategy {
                    ConflictStrategy::System2Priority => {
                        let mirror_prefs = self.shared.system2.read().preference_mirror().clone();
                        self.shared.system1.write().update_user_preferences(&mirror_prefs);
                        Some(ResponseSource::System2)
                    }
                    _ => {
                        let live_prefs = self.shared.system1.read().preferences().clone();
                        self.shared.system2.write().apply_preferences(&live_prefs);
                        Some(ResponseSource::System1)
                    }
                };
                found.push(self.record_conflict(
                    ConflictKind::PreferenceMismatch,
                    strategy,
                    winner,
                    0.8,
                    0.4,
                    format!("preferred_language '{live}' vs mirrored '{mirror}'"),
                ));
            }
        }

        // 3. Quality-threshold disagreement between the stores' floors
        let anti_floor = self.shared.config.read().anti_pattern_confidence_floor;
        let quality_floor = self.shared.system2.read().quality_floor();
        if (anti_floor - quality_floor).abs() > QUALITY_FLOOR_DIVERGENCE {
            let gap = anti_floor - quality_floor;
            let winner = match strategy {
                ConflictStrategy::System1Priority => {
                    self.shared.system2.write().nudge_quality_floor(gap / 2.0);
                    Some(ResponseSource::System1)
                }
                ConflictStrategy::System2Priority => {
                    let mut config = self.shared.config.write();
                    config.anti_pattern_confidence_floor =
                        (anti_floor - gap / 2.0).clamp(0.05, 0.95);
                    let snapshot = config.clone();
                    drop(config);
                    self.shared.system1.write().apply_config(&snapshot);
                    Some(ResponseSource::System2)
                }
                ConflictStrategy::Balanced => {
                    self.shared.system2.write().nudge_quality_floor(gap / 4.0);
                    let mut config = self.shared.config.write();
                    config.anti_pattern_confidence_floor =
                        (anti_floor - gap / 4.0).clamp(0.05, 0.95);
                    let snapshot = config.clone();
                    drop(config);
                    self.shared.system1.write().apply_config(&snapshot);
                    None
                }
            };
            found.push(self.record_conflict(
                ConflictKind::QualityThreshold,
                strategy,
                winner,
                0.6,
                gap.abs(),
                format!("anti-pattern floor {anti_floor:.2} vs quality floor {quality_floor:.2}"),
            ));
        }

        // 4. Performance tradeoff: cache is working yet latency is high,
        //    so store size is the likely culprit
        let metrics = self.shared.metrics.lock().clone();
        if metrics.total_operations >= 20
            && metrics.avg_latency_ms > 100.0
            && metrics.cache_hit_rate() > 0.5
        {
            let winner = match strategy {
                ConflictStrategy::System2Priority => Some(ResponseSource::System2),
                _ => {
                    self.shared.system1.write().cleanup_least_used_nodes();
                    Some(ResponseSource::System1)
                }
            };
            found.push(self.record_conflict(
                ConflictKind::PerformanceTradeoff,
                strategy,
                winner,
                0.5,
                0.3,
                format!(
                    "latency {:.0}ms despite {:.0}% cache hits",
                    metrics.avg_latency_ms,
                    metrics.cache_hit_rate() * 100.0
                ),
            ));
        }

        found
    }

    fn record_conflict(
        &self,
        kind: ConflictKind,
        strategy: ConflictStrategy,
        winner: Option<ResponseSource>,
        confidence: f64,
        impact: f64,
        detail: String,
    ) -> ConflictResolution {
        let resolution = ConflictResolution {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            strategy,
            winner,
            confidence,
            impact: impact.clamp(0.0, 1.0),
            detail,
        };
        info!(
            "[coordinator] Conflict {:?} resolved ({:?}): {}",
            resolution.kind, resolution.strategy, resolution.detail
        );

        let retention = self.shared.config.read().audit_retention;
        let mut conflicts = self.conflicts.lock();
        conflicts.push_back(resolution.clone());
        while conflicts.len() > retention {
            conflicts.pop_front();
        }
        resolution
    }

    // ── Behavior adaptation ─────────────────────────────────────────────

    /// Analyze the recent event window for a recognizable behavioral
    /// pattern around this event. Returns true when an adaptation was
    /// pushed into a store.
    pub fn adapt_to_user_behavior(&self, event: &MemoryEvent) -> bool {
        let repeated = {
            let recent = self.shared.recent_events.lock();
            recent.iter().filter(|e| e.kind == event.kind).count()
        };
        if repeated < BEHAVIOR_REPEAT_THRESHOLD {
            return false;
        }

        match event.kind {
            MemoryEventKind::SuggestionRejected => {
                self.shared.system1.write().nudge_suggestion_bias(-0.1);
                self.shared.system2.write().nudge_quality_floor(0.05);
                info!(
                    "[coordinator] Repeated rejections ({repeated}): lowering suggestion bias, raising quality floor"
                );
                true
            }
            MemoryEventKind::SuggestionAccepted => {
                self.shared.system1.write().nudge_suggestion_bias(0.05);
                true
            }
            _ => false,
        }
    }

    fn adapt_recent_locked(&self) {
        let candidates: Vec<MemoryEvent> = {
            let recent = self.shared.recent_events.lock();
            recent
                .iter()
                .filter(|e| {
                    matches!(
                        e.kind,
                        MemoryEventKind::SuggestionAccepted | MemoryEventKind::SuggestionRejected
                    )
                })
                .cloned()
                .collect()
        };

        let fresh: Vec<MemoryEvent> = {
            let mut adapted = self.adapted_events.lock();
            // Bound the seen-set alongside the ring it mirrors
            if adapted.len() > 1024 {
                adapted.clear();
            }
            candidates.into_iter().filter(|e| adapted.insert(e.id.clone())).collect()
        };
        for event in fresh {
            self.adapt_to_user_behavior(&event);
        }
    }

    // ── Audit access ────────────────────────────────────────────────────

    pub fn sync_points(&self) -> Vec<SyncPoint> {
        self.sync_points.lock().iter().cloned().collect()
    }

    pub fn conflict_log(&self) -> Vec<ConflictResolution> {
        self.conflicts.lock().iter().cloned().collect()
    }

    pub fn recommendation_log(&self) -> Vec<OptimizationRecommendation> {
        self.recommendations.lock().iter().cloned().collect()
    }

    fn cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

fn recommendation(
    description: String,
    benefit: f64,
    effort: f64,
    risk: f64,
    automated: bool,
) -> OptimizationRecommendation {
    OptimizationRecommendation {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        description,
        benefit,
        effort,
        risk,
        automated,
        applied: false,
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::system1_types::{NodeKind, UserPreferenceSet};
    use crate::atoms::types::EngineConfig;

    fn make_engine() -> DualMemoryEngine {
        DualMemoryEngine::new(EngineConfig { embedding_dim: 2, ..Default::default() })
    }

    fn seed(engine: &DualMemoryEngine) {
        let shared = engine.shared();
        let mut s1 = shared.system1.write();
        s1.add_node(NodeKind::Concept, "async runtime", "tokio", vec![1.0, 0.0], None).unwrap();
        s1.update_user_preferences(&UserPreferenceSet {
            preferred_language: Some("rust".into()),
            ..Default::default()
        });
    }

    #[test]
    fn sync_runs_all_four_transfers() {
        let engine = make_engine();
        seed(&engine);
        let coordinator = Coordinator::new(&engine);

        let points = coordinator.synchronize_systems();
        // All transfers with changed (non-empty) sources recorded exactly once
        assert!(points.iter().any(|p| p.transfer == SyncTransfer::KnowledgeToReasoning));
        assert!(points.iter().any(|p| p.transfer == SyncTransfer::Preferences));
        assert!(points.iter().all(|p| p.success));
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
    }

    #[test]
    fn sync_is_idempotent_without_new_events() {
        let engine = make_engine();
        seed(&engine);
        let coordinator = Coordinator::new(&engine);

        let first = coordinator.synchronize_systems();
        assert!(!first.is_empty());

        // No new events: a second run records zero additional SyncPoints
        let second = coordinator.synchronize_systems();
        assert!(second.is_empty(), "expected no-op resync, got {second:?}");
        assert_eq!(coordinator.sync_points().len(), first.len());
    }

    #[test]
    fn sync_transfers_preferences_into_mirror() {
        let engine = make_engine();
        seed(&engine);
        let coordinator = Coordinator::new(&engine);
        coordinator.synchronize_systems();

        let shared = engine.shared();
        let mirror = shared.system2.read().preference_mirror().clone();
        assert_eq!(mirror.preferred_language.as_deref(), Some("rust"));
    }

    #[test]
    fn learning_data_distills_best_practices_once() {
        let engine = make_engine();
        let shared = engine.shared();
        {
            let mut s2 = shared.system2.write();
            let trace = s2.start_trace(
                crate::atoms::system2_types::TraceContext {
                    problem: "pick a logger".into(),
                    goals: vec!["structured".into()],
                    constraints: vec!["lightweight".into()],
                    assumptions: vec!["single process".into()],
                },
                Some("compare log and tracing"),
            );
            s2.add_step(&trace.id, "compare log and tracing feature sets").unwrap();
            s2.complete_trace(&trace.id, "use the log crate", 0.7).unwrap();
        }

        let coordinator = Coordinator::new(&engine);
        coordinator.synchronize_systems();
        let first_count = shared.system1.read().best_practices().len();

        coordinator.synchronize_systems();
        let second_count = shared.system1.read().best_practices().len();
        assert_eq!(first_count, second_count);
    }

    #[test]
    fn cancel_flag_preempts_sync() {
        let engine = make_engine();
        seed(&engine);
        let coordinator = Coordinator::new(&engine);

        engine.shared().cancel.store(true, Ordering::SeqCst);
        let points = coordinator.synchronize_systems();
        assert!(points.is_empty());
        engine.shared().cancel.store(false, Ordering::SeqCst);
    }

    #[test]
    fn low_hit_rate_yields_applied_ttl_recommendation() {
        let engine = make_engine();
        let shared = engine.shared();
        {
            let mut metrics = shared.metrics.lock();
            metrics.total_operations = 40;
            metrics.cache_misses = 40;
        }
        let ttl_before = shared.config.read().cache_ttl_secs;

        let coordinator = Coordinator::new(&engine);
        let recs = coordinator.optimize_performance();

        let ttl_rec = recs.iter().find(|r| r.description.contains("cache TTL")).unwrap();
        assert!(ttl_rec.automated);
        assert!(ttl_rec.applied);
        assert!(shared.config.read().cache_ttl_secs > ttl_before);
    }

    #[test]
    fn risky_recommendations_are_not_auto_applied() {
        let engine = DualMemoryEngine::new(EngineConfig {
            embedding_dim: 2,
            system1_capacity: 10,
            ..Default::default()
        });
        let shared = engine.shared();
        {
            let mut s1 = shared.system1.write();
            for i in 0..9 {
                s1.add_node(NodeKind::Concept, format!("n{i}"), "c", vec![1.0, 0.0], None)
                    .unwrap();
            }
        }

        let coordinator = Coordinator::new(&engine);
        let recs = coordinator.optimize_performance();
        let capacity_rec = recs.iter().find(|r| r.description.contains("capacity")).unwrap();
        assert!(!capacity_rec.automated);
        assert!(!capacity_rec.applied);
    }

    #[test]
    fn recommendations_rank_by_benefit_per_effort() {
        let engine = make_engine();
        let shared = engine.shared();
        {
            let mut metrics = shared.metrics.lock();
            metrics.total_operations = 40;
            metrics.cache_misses = 40;
            metrics.errors = 10; // 25% error rate
        }

        let coordinator = Coordinator::new(&engine);
        let recs = coordinator.optimize_performance();
        assert!(recs.len() >= 2);
        for pair in recs.windows(2) {
            assert!(pair[0].priority() >= pair[1].priority());
        }
    }

    #[test]
    fn every_detected_conflict_is_logged() {
        let engine = make_engine();
        let shared = engine.shared();
        {
            // Diverge the stores: confident System 1, unimpressed System 2
            let mut s1 = shared.system1.write();
            s1.add_node(NodeKind::Concept, "hot", "c", vec![1.0, 0.0], None).unwrap();
            for _ in 0..10 {
                s1.search_nodes("", &[1.0, 0.0], 1);
            }
        }
        {
            let mut s2 = shared.system2.write();
            for _ in 0..3 {
                let event = MemoryEvent::new(
                    MemoryEventKind::QualityImprovement,
                    "u1",
                    "s1",
                    serde_json::json!({"quality": 0.05}),
                );
                s2.process_event(&event);
            }
        }

        let coordinator = Coordinator::new(&engine);
        let found = coordinator.resolve_conflicts();
        assert!(found.iter().any(|c| c.kind == ConflictKind::DataInconsistency));
        // No silent drops: everything detected is in the log
        assert_eq!(coordinator.conflict_log().len(), found.len());
    }

    #[test]
    fn preference_mismatch_resolves_by_strategy() {
        let engine = make_engine();
        let shared = engine.shared();
        shared.system1.write().update_user_preferences(&UserPreferenceSet {
            preferred_language: Some("rust".into()),
            ..Default::default()
        });
        shared.system2.write().apply_preferences(&UserPreferenceSet {
            preferred_language: Some("python".into()),
            ..Default::default()
        });

        let coordinator = Coordinator::new(&engine);
        let found = coordinator.resolve_conflicts();

        let pref = found.iter().find(|c| c.kind == ConflictKind::PreferenceMismatch).unwrap();
        // Balanced strategy defaults to the live System 1 record
        assert_eq!(pref.winner, Some(ResponseSource::System1));
        assert_eq!(
            shared.system2.read().preference_mirror().preferred_language.as_deref(),
            Some("rust")
        );
    }

    #[test]
    fn repeated_rejections_nudge_both_stores() {
        let engine = make_engine();
        let shared = engine.shared();
        let bias_before = shared.system1.read().preferences().suggestion_bias;
        let floor_before = shared.system2.read().quality_floor();

        let mut last_event = None;
        {
            let mut recent = shared.recent_events.lock();
            for _ in 0..3 {
                let event = MemoryEvent::new(
                    MemoryEventKind::SuggestionRejected,
                    "u1",
                    "s1",
                    serde_json::json!({"suggestion_type": "completion"}),
                );
                recent.push_back(event.clone());
                last_event = Some(event);
            }
        }

        let coordinator = Coordinator::new(&engine);
        assert!(coordinator.adapt_to_user_behavior(&last_event.unwrap()));
        assert!(shared.system1.read().preferences().suggestion_bias < bias_before);
        assert!(shared.system2.read().quality_floor() > floor_before);
    }

    #[test]
    fn single_rejection_does_not_adapt() {
        let engine = make_engine();
        let shared = engine.shared();
        let event = MemoryEvent::new(
            MemoryEventKind::SuggestionRejected,
            "u1",
            "s1",
            serde_json::json!({}),
        );
        shared.recent_events.lock().push_back(event.clone());

        let coordinator = Coordinator::new(&engine);
        assert!(!coordinator.adapt_to_user_behavior(&event));
    }
}
