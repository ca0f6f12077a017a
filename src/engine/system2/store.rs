// ── System 2: Deliberate Reasoning Store ───────────────────────────────────
//
// The analytical half of the engine: reasoning traces with an open→sealed
// lifecycle, per-domain decision trees, the enhancement ledger, the
// reflection log, and heuristic quality assessment.
//
// Failure semantics: operations on an unknown trace/tree id fail with
// `NotFound`; state-violating mutations (step-add after seal) fail with
// `InvalidState`; all other computation failures degrade to low-confidence
// results rather than propagating.
//
// Thread-safety: NOT internally synchronized. The engine wraps this store
// in a lock.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::system1_types::{Complexity, UserPreferenceSet};
use crate::atoms::system2_types::{
    ActionItem, AlternativeReasoning, CodeQualityMetrics, DecisionNodeKind, DecisionTree,
    Enhancement, EnhancementImpact, EnhancementKind, EnhancementStatus, Evidence, ReasoningStep,
    ReasoningTrace, ReflectionEntry, System2Stats, TraceContext, TraceMetadata, TraceState,
    TreeEvaluation,
};
use crate::atoms::types::{EngineConfig, MemoryEvent, MemoryEventKind};
use crate::engine::system2::decisions;
use crate::engine::system2::quality::{HeuristicScorer, QualityScorer};
use crate::engine::system2::reflection::{EnhancementLedger, ReflectionLog};
use chrono::{Duration, Utc};
use log::{debug, info};
use std::collections::{HashMap, HashSet, VecDeque};

// ═════════════════════════════════════════════════════════════════════════════
// Constants
// ═════════════════════════════════════════════════════════════════════════════

/// Word-overlap threshold above which a step is taken to build on its
/// predecessor.
const STEP_DEPENDENCY_OVERLAP: f64 = 0.25;

/// Confidence assigned to traces generated from uncategorized events.
const GENERIC_TRACE_CONFIDENCE: f64 = 0.4;

// ═════════════════════════════════════════════════════════════════════════════
// System 2 Store
// ═════════════════════════════════════════════════════════════════════════════

pub struct System2Store {
    traces: HashMap<String, ReasoningTrace>,
    /// Insertion order, oldest first; drives capacity eviction.
    trace_order: VecDeque<String>,
    trees: HashMap<String, DecisionTree>,
    /// domain → tree id; one tree per domain.
    domain_index: HashMap<String, String>,
    enhancements: EnhancementLedger,
    reflections: ReflectionLog,
    scorer: Box<dyn QualityScorer>,
    /// Mirror of System 1's preferences, refreshed by the Coordinator.
    preference_mirror: UserPreferenceSet,
    /// Rolling average of observed quality signals.
    quality_baseline: f64,
    quality_samples: u64,
    capacity: usize,
    quality_floor: f64,
}

impl System2Store {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_scorer(config, Box::new(HeuristicScorer::new()))
    }

    /// Construct with a replacement scorer; the heuristics are pluggable.
    pub fn with_scorer(config: &EngineConfig, scorer: Box<dyn QualityScorer>) -> Self {
        Self {
            traces: HashMap::new(),
            trace_order: VecDeque::new(),
            trees: HashMap::new(),
            domain_index: HashMap::new(),
            enhancements: EnhancementLedger::new(),
            reflections: ReflectionLog::new(config.audit_retention),
            scorer,
            preference_mirror: UserPreferenceSet::default(),
            quality_baseline: 0.5,
            quality_samples: 0,
            capacity: config.system2_capacity,
            quality_floor: config.quality_enhancement_floor,
        }
    }

    /// Re-read tunables after a hot config reload.
    pub fn apply_config(&mut self, config: &EngineConfig) {
        self.capacity = config.system2_capacity;
        self.quality_floor = config.quality_enhancement_floor;
        self.reflections.set_retention(config.audit_retention);
    }

    // ── Reasoning traces ────────────────────────────────────────────────

    /// Open a new trace. The oldest trace is evicted when the store is at
    /// capacity.
    pub fn start_trace(
        &mut self,
        context: TraceContext,
        initial_step: Option<&str>,
    ) -> ReasoningTrace {
        while self.traces.len() >= self.capacity {
            if let Some(oldest) = self.trace_order.pop_front() {
                self.traces.remove(&oldest);
            } else {
                break;
            }
        }

        let complexity = match context.goals.len() + context.constraints.len() {
            0..=1 => Complexity::Low,
            2..=4 => Complexity::Medium,
            _ => Complexity::High,
        };
        let domain = self
            .preference_mirror
            .preferred_language
            .clone()
            .unwrap_or_else(|| "general".to_string());

        let mut trace = ReasoningTrace {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            context,
            steps: Vec::new(),
            conclusion: None,
            confidence: 0.0,
            alternatives: Vec::new(),
            state: TraceState::Open,
            metadata: TraceMetadata { complexity, domain, quality_score: 0.0, review_required: false },
        };

        if let Some(description) = initial_step {
            trace.steps.push(derive_step(&trace, description));
        }

        debug!("[system2] Opened trace {} ({})", trace.id, trace.context.problem);
        self.trace_order.push_back(trace.id.clone());
        self.traces.insert(trace.id.clone(), trace.clone());
        trace
    }

    /// Append a step. `confidence`, `duration_ms` and `dependencies` are
    /// derived here, never caller-supplied. Sealed traces reject steps.
    pub fn add_step(&mut self, trace_id: &str, description: &str) -> MemoryResult<ReasoningStep> {
        let trace = self
            .traces
            .get_mut(trace_id)
            .ok_or_else(|| MemoryError::not_found("trace", trace_id))?;
        if trace.is_sealed() {
            return Err(MemoryError::invalid_state(format!(
                "trace {trace_id} is sealed; no further steps permitted"
            )));
        }

        let step = derive_step(trace, description);
        trace.steps.push(step.clone());
        Ok(step)
    }

    /// Attach an alternative line of reasoning. Must happen before sealing.
    pub fn add_alternative(
        &mut self,
        trace_id: &str,
        alternative: AlternativeReasoning,
    ) -> MemoryResult<()> {
        let trace = self
            .traces
            .get_mut(trace_id)
            .ok_or_else(|| MemoryError::not_found("trace", trace_id))?;
        if trace.is_sealed() {
            return Err(MemoryError::invalid_state(format!(
                "trace {trace_id} is sealed; alternatives must be attached before completion"
            )));
        }
        trace.alternatives.push(alternative);
        Ok(())
    }

    /// Seal the trace: record the conclusion, compute quality, and emit an
    /// Enhancement proposal when quality falls below the floor.
    /// Sealing twice is an `InvalidState` error.
    pub fn complete_trace(
        &mut self,
        trace_id: &str,
        conclusion: &str,
        confidence: f64,
    ) -> MemoryResult<ReasoningTrace> {
        let trace = self
            .traces
            .get_mut(trace_id)
            .ok_or_else(|| MemoryError::not_found("trace", trace_id))?;
        if trace.is_sealed() {
            return Err(MemoryError::invalid_state(format!(
                "trace {trace_id} is already sealed"
            )));
        }

        trace.conclusion = Some(conclusion.to_string());
        trace.confidence = confidence.clamp(0.0, 1.0);
        trace.state = TraceState::Sealed;

        let quality = self.scorer.assess_trace(trace);
        trace.metadata.quality_score = quality.overall;
        trace.metadata.review_required = quality.overall < self.quality_floor;
        let sealed = trace.clone();

        self.record_quality_sample(quality.overall);

        if sealed.metadata.review_required {
            self.enhancements.propose(
                EnhancementKind::Quality,
                format!("Improve reasoning for '{}'", sealed.context.problem),
                format!(
                    "Trace {} sealed with quality {:.2}, below the {:.2} floor",
                    sealed.id, quality.overall, self.quality_floor
                ),
                EnhancementImpact {
                    benefit_score: 1.0 - quality.overall,
                    effort_score: 0.5,
                    risk_score: 0.2,
                },
                Some(sealed.id.clone()),
            );
        }

        info!(
            "[system2] ✓ Sealed trace {} (quality {:.2})",
            sealed.id, sealed.metadata.quality_score
        );
        Ok(sealed)
    }

    pub fn get_trace(&self, trace_id: &str) -> Option<ReasoningTrace> {
        self.traces.get(trace_id).cloned()
    }

    /// Filtered trace search, sorted by recency then quality.
    pub fn search_traces(
        &self,
        domain: Option<&str>,
        complexity: Option<Complexity>,
        min_quality: Option<f64>,
        timeframe: Option<Duration>,
        limit: usize,
    ) -> Vec<ReasoningTrace> {
        let cutoff = timeframe.map(|t| Utc::now() - t);
        let mut hits: Vec<ReasoningTrace> = self
            .traces
            .values()
            .filter(|t| domain.is_none_or(|d| t.metadata.domain == d))
            .filter(|t| complexity.is_none_or(|c| t.metadata.complexity == c))
            .filter(|t| min_quality.is_none_or(|q| t.metadata.quality_score >= q))
            .filter(|t| cutoff.is_none_or(|c| t.timestamp >= c))
            .cloned()
            .collect();

        hits.sort_by(|a, b| {
            b.timestamp.cmp(&a.timestamp).then_with(|| {
                b.metadata
                    .quality_score
                    .partial_cmp(&a.metadata.quality_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        hits.truncate(limit);
        hits
    }

    // ── Decision trees ──────────────────────────────────────────────────

    /// Create a decision tree for a domain, or return the existing tree's
    /// id (one tree per domain).
    pub fn create_decision_tree(
        &mut self,
        domain: &str,
        root_kind: DecisionNodeKind,
        root_label: &str,
    ) -> String {
        if let Some(existing) = self.domain_index.get(domain) {
            return existing.clone();
        }
        let tree = decisions::new_tree(domain, root_kind, root_label);
        let id = tree.id.clone();
        self.domain_index.insert(domain.to_string(), id.clone());
        self.trees.insert(id.clone(), tree);
        id
    }

    pub fn add_decision_node(
        &mut self,
        tree_id: &str,
        parent: usize,
        kind: DecisionNodeKind,
        label: &str,
        confidence: f64,
    ) -> MemoryResult<usize> {
        let tree = self
            .trees
            .get_mut(tree_id)
            .ok_or_else(|| MemoryError::not_found("decision tree", tree_id))?;
        decisions::add_node(tree, parent, kind, label, confidence)
    }

    pub fn add_evidence(
        &mut self,
        tree_id: &str,
        node_id: usize,
        evidence: Evidence,
    ) -> MemoryResult<f64> {
        let tree = self
            .trees
            .get_mut(tree_id)
            .ok_or_else(|| MemoryError::not_found("decision tree", tree_id))?;
        decisions::add_evidence(tree, node_id, evidence)
    }

    /// Read-only walk of a tree against a context.
    pub fn evaluate(&self, tree_id: &str, context: &str) -> MemoryResult<TreeEvaluation> {
        let tree = self
            .trees
            .get(tree_id)
            .ok_or_else(|| MemoryError::not_found("decision tree", tree_id))?;
        Ok(decisions::evaluate(tree, context))
    }

    pub fn tree_for_domain(&self, domain: &str) -> Option<&str> {
        self.domain_index.get(domain).map(|s| s.as_str())
    }

    // ── Enhancements ────────────────────────────────────────────────────

    pub fn propose_enhancement(
        &mut self,
        kind: EnhancementKind,
        title: impl Into<String>,
        description: impl Into<String>,
        impact: EnhancementImpact,
    ) -> Enhancement {
        self.enhancements.propose(kind, title, description, impact, None)
    }

    pub fn update_enhancement_status(
        &mut self,
        id: &str,
        next: EnhancementStatus,
    ) -> MemoryResult<Enhancement> {
        self.enhancements.update_status(id, next)
    }

    pub fn get_enhancements_by_kind(&self, kind: EnhancementKind) -> Vec<Enhancement> {
        self.enhancements.by_kind(kind)
    }

    pub fn get_enhancements_by_status(&self, status: EnhancementStatus) -> Vec<Enhancement> {
        self.enhancements.by_status(status)
    }

    // ── Reflection log ──────────────────────────────────────────────────

    pub fn add_reflection_entry(
        &mut self,
        subject: impl Into<String>,
        insight: impl Into<String>,
        confidence: f64,
    ) -> ReflectionEntry {
        self.reflections.add_entry(subject, insight, confidence)
    }

    pub fn add_action_item(
        &mut self,
        entry_id: &str,
        description: impl Into<String>,
    ) -> MemoryResult<ActionItem> {
        self.reflections.add_action_item(entry_id, description)
    }

    pub fn get_reflection_insights(
        &self,
        timeframe: Duration,
        min_confidence: f64,
    ) -> Vec<ReflectionEntry> {
        self.reflections.insights(timeframe, min_confidence)
    }

    // ── Quality ─────────────────────────────────────────────────────────

    pub fn assess_code_quality(
        &self,
        code: &str,
        language: &str,
        context: Option<&str>,
    ) -> CodeQualityMetrics {
        self.scorer.assess_code(code, language, context)
    }

    pub fn quality_baseline(&self) -> f64 {
        self.quality_baseline
    }

    pub fn quality_floor(&self) -> f64 {
        self.quality_floor
    }

    /// Nudge the enhancement floor; used by the Coordinator's conflict
    /// resolution and behavior adaptation.
    pub fn nudge_quality_floor(&mut self, delta: f64) {
        self.quality_floor = (self.quality_floor + delta).clamp(0.05, 0.95);
    }

    fn record_quality_sample(&mut self, sample: f64) {
        self.quality_samples += 1;
        let n = self.quality_samples as f64;
        self.quality_baseline += (sample - self.quality_baseline) / n;
    }

    // ── Coordinator surface ─────────────────────────────────────────────

    /// Refresh the preference mirror. Idempotent by construction.
    pub fn apply_preferences(&mut self, preferences: &UserPreferenceSet) {
        self.preference_mirror = preferences.clone();
    }

    pub fn preference_mirror(&self) -> &UserPreferenceSet {
        &self.preference_mirror
    }

    /// Average sealed-trace quality per domain, for the quality→patterns
    /// transfer.
    pub fn quality_by_domain(&self) -> Vec<(String, f64)> {
        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
        for trace in self.traces.values().filter(|t| t.is_sealed()) {
            let entry = sums.entry(trace.metadata.domain.as_str()).or_insert((0.0, 0));
            entry.0 += trace.metadata.quality_score;
            entry.1 += 1;
        }
        let mut out: Vec<(String, f64)> = sums
            .into_iter()
            .map(|(domain, (sum, n))| (domain.to_string(), sum / n as f64))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Sealed traces at or above a quality bar, for the learning-data
    /// transfer.
    pub fn sealed_traces_above(&self, min_quality: f64) -> Vec<ReasoningTrace> {
        let mut out: Vec<ReasoningTrace> = self
            .traces
            .values()
            .filter(|t| t.is_sealed() && t.metadata.quality_score >= min_quality)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    // ── Event ingestion ─────────────────────────────────────────────────

    /// Route one ingested event into the store. Unknown kinds fall through
    /// to a generic trace; malformed payloads degrade, never propagate.
    pub fn process_event(&mut self, event: &MemoryEvent) {
        match event.kind {
            MemoryEventKind::CodeGeneration => {
                let problem = string_field(&event.data, "signature")
                    .or_else(|| string_field(&event.data, "name"))
                    .unwrap_or_else(|| "code generation".to_string());
                let context = TraceContext {
                    problem,
                    goals: vec!["produce working code".to_string()],
                    constraints: Vec::new(),
                    assumptions: Vec::new(),
                };
                let step = event
                    .reasoning
                    .clone()
                    .unwrap_or_else(|| "generated candidate implementation".to_string());
                self.start_trace(context, Some(&step));
            }
            MemoryEventKind::BugFix => {
                let subject = string_field(&event.data, "component")
                    .unwrap_or_else(|| "bug fix".to_string());
                let insight = string_field(&event.data, "fix")
                    .or_else(|| event.reasoning.clone())
                    .unwrap_or_else(|| "a defect was corrected".to_string());
                self.reflections.add_entry(subject, insight, event.metadata.confidence);
            }
            MemoryEventKind::QualityImprovement => {
                let sample = event
                    .data
                    .get("quality")
                    .and_then(|v| v.as_f64())
                    .unwrap_or_else(|| {
                        string_field(&event.data, "code")
                            .map(|code| self.scorer.assess_code(&code, "unknown", None).overall())
                            .unwrap_or(self.quality_baseline)
                    });
                self.record_quality_sample(sample.clamp(0.0, 1.0));
            }
            _ => {
                // Generic trace for everything else, sealed immediately
                let context = TraceContext {
                    problem: format!("{:?} event", event.kind),
                    goals: Vec::new(),
                    constraints: Vec::new(),
                    assumptions: Vec::new(),
                };
                let trace = self.start_trace(context, event.reasoning.as_deref());
                // The trace was just created, sealing cannot fail
                let _ = self.complete_trace(&trace.id, "recorded", GENERIC_TRACE_CONFIDENCE);
            }
        }
    }

    // ── Stats & reset ───────────────────────────────────────────────────

    pub fn stats(&self) -> System2Stats {
        System2Stats {
            traces: self.traces.len(),
            open_traces: self.traces.values().filter(|t| !t.is_sealed()).count(),
            decision_trees: self.trees.len(),
            enhancements: self.enhancements.len(),
            reflection_entries: self.reflections.len(),
        }
    }

    /// Drop everything; leaves the store in a valid empty state.
    pub fn clear(&mut self) {
        self.traces.clear();
        self.trace_order.clear();
        self.trees.clear();
        self.domain_index.clear();
        self.enhancements.clear();
        self.reflections.clear();
        self.preference_mirror = UserPreferenceSet::default();
        self.quality_baseline = 0.5;
        self.quality_samples = 0;
        info!("[system2] Store cleared");
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

fn string_field(data: &serde_json::Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Derive a step's computed fields from the trace's current state:
/// index, duration since the last activity, dependency links, and a
/// position/linkage-based confidence.
fn derive_step(trace: &ReasoningTrace, description: &str) -> ReasoningStep {
    let index = trace.steps.len();
    let now = Utc::now();
    let previous_at = trace.steps.last().map(|s| s.added_at).unwrap_or(trace.timestamp);
    let duration_ms = (now - previous_at).num_milliseconds().max(0) as u64;

    // Explicit "step N" references, else implicit linkage to the
    // predecessor when the wording overlaps enough
    let mut dependencies: Vec<usize> = (0..index)
        .filter(|i| description.to_lowercase().contains(&format!("step {}", i + 1)))
        .collect();
    if dependencies.is_empty() && index > 0 {
        let previous = &trace.steps[index - 1].description;
        if word_overlap(description, previous) >= STEP_DEPENDENCY_OVERLAP {
            dependencies.push(index - 1);
        }
    }

    let confidence = (0.5 + 0.05 * index.min(4) as f64
        + if dependencies.is_empty() { 0.0 } else { 0.1 })
    .min(0.95);

    ReasoningStep {
        index,
        description: description.to_string(),
        confidence,
        duration_ms,
        dependencies,
        added_at: now,
    }
}

/// Word-level Jaccard overlap between two descriptions.
fn word_overlap(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_words: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_words: HashSet<&str> = b_lower.split_whitespace().collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(capacity: usize) -> System2Store {
        let config = EngineConfig { system2_capacity: capacity, ..Default::default() };
        System2Store::new(&config)
    }

    fn make_context() -> TraceContext {
        TraceContext {
            problem: "choose an http client".into(),
            goals: vec!["async".into(), "rustls".into()],
            constraints: vec!["no openssl".into()],
            assumptions: Vec::new(),
        }
    }

    #[test]
    fn trace_lifecycle_and_seal_rejection() {
        let mut store = make_store(10);
        let trace = store.start_trace(make_context(), Some("list candidates"));

        store.add_step(&trace.id, "compare reqwest and hyper").unwrap();
        let sealed = store.complete_trace(&trace.id, "use reqwest", 0.9).unwrap();
        assert!(sealed.is_sealed());
        assert!(sealed.metadata.quality_score > 0.0);

        // Steps after seal always fail with InvalidState
        let err = store.add_step(&trace.id, "one more thing");
        assert!(matches!(err, Err(MemoryError::InvalidState(_))));

        // Sealing twice is not callable
        let err = store.complete_trace(&trace.id, "again", 0.9);
        assert!(matches!(err, Err(MemoryError::InvalidState(_))));
    }

    #[test]
    fn alternatives_rejected_after_seal() {
        let mut store = make_store(10);
        let trace = store.start_trace(make_context(), None);
        let alt = AlternativeReasoning {
            description: "hand-rolled hyper client".into(),
            confidence: 0.3,
            rejected_because: Some("too much plumbing".into()),
        };
        store.add_alternative(&trace.id, alt.clone()).unwrap();
        store.complete_trace(&trace.id, "use reqwest", 0.8).unwrap();

        let err = store.add_alternative(&trace.id, alt);
        assert!(matches!(err, Err(MemoryError::InvalidState(_))));
    }

    #[test]
    fn unknown_trace_is_not_found() {
        let mut store = make_store(10);
        assert!(matches!(
            store.add_step("ghost", "anything"),
            Err(MemoryError::NotFound { .. })
        ));
        assert!(matches!(
            store.complete_trace("ghost", "c", 0.5),
            Err(MemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn step_fields_are_derived() {
        let mut store = make_store(10);
        let trace = store.start_trace(make_context(), None);

        let first = store.add_step(&trace.id, "survey the async http clients").unwrap();
        assert_eq!(first.index, 0);
        assert!(first.dependencies.is_empty());

        // Overlapping wording links to the predecessor
        let second = store.add_step(&trace.id, "rank the async http clients by maturity").unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.dependencies, vec![0]);
        assert!(second.confidence > first.confidence);
    }

    #[test]
    fn trace_capacity_evicts_oldest() {
        let mut store = make_store(3);
        let first = store.start_trace(make_context(), None);
        for _ in 0..3 {
            store.start_trace(make_context(), None);
        }
        assert_eq!(store.stats().traces, 3);
        assert!(store.get_trace(&first.id).is_none());
    }

    #[test]
    fn low_quality_seal_emits_enhancement() {
        let mut store = make_store(10);
        let config = EngineConfig { quality_enhancement_floor: 0.99, ..Default::default() };
        store.apply_config(&config);

        let trace = store.start_trace(
            TraceContext { problem: "p".into(), ..Default::default() },
            None,
        );
        store.complete_trace(&trace.id, "done", 0.2).unwrap();

        let proposed = store.get_enhancements_by_status(EnhancementStatus::Proposed);
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].source_trace.as_deref(), Some(trace.id.as_str()));
    }

    #[test]
    fn search_traces_filters_and_sorts() {
        let mut store = make_store(10);
        let t1 = store.start_trace(make_context(), Some("s"));
        store.complete_trace(&t1.id, "done", 0.9).unwrap();
        store.start_trace(make_context(), None); // open, quality 0.0

        let good = store.search_traces(None, None, Some(0.1), None, 10);
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].id, t1.id);

        let all = store.search_traces(Some("general"), None, None, None, 10);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn one_decision_tree_per_domain() {
        let mut store = make_store(10);
        let a = store.create_decision_tree("caching", DecisionNodeKind::Condition, "hot?");
        let b = store.create_decision_tree("caching", DecisionNodeKind::Condition, "warm?");
        assert_eq!(a, b);
        assert_eq!(store.stats().decision_trees, 1);
    }

    #[test]
    fn tree_operations_on_unknown_id_fail() {
        let mut store = make_store(10);
        assert!(matches!(
            store.add_decision_node("ghost", 0, DecisionNodeKind::Action, "x", 0.5),
            Err(MemoryError::NotFound { .. })
        ));
        assert!(matches!(store.evaluate("ghost", "ctx"), Err(MemoryError::NotFound { .. })));
    }

    #[test]
    fn code_generation_event_seeds_open_trace() {
        let mut store = make_store(10);
        let event = MemoryEvent::new(
            MemoryEventKind::CodeGeneration,
            "u1",
            "s1",
            serde_json::json!({"signature": "fn render(doc: &Doc) -> Html"}),
        );
        store.process_event(&event);

        let stats = store.stats();
        assert_eq!(stats.traces, 1);
        assert_eq!(stats.open_traces, 1);
    }

    #[test]
    fn bug_fix_event_becomes_reflection() {
        let mut store = make_store(10);
        let event = MemoryEvent::new(
            MemoryEventKind::BugFix,
            "u1",
            "s1",
            serde_json::json!({"component": "parser", "fix": "handle empty input"}),
        );
        store.process_event(&event);

        let insights = store.get_reflection_insights(Duration::hours(1), 0.0);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].subject, "parser");
    }

    #[test]
    fn quality_improvement_event_moves_baseline() {
        let mut store = make_store(10);
        let before = store.quality_baseline();
        let event = MemoryEvent::new(
            MemoryEventKind::QualityImprovement,
            "u1",
            "s1",
            serde_json::json!({"quality": 0.95}),
        );
        store.process_event(&event);
        assert!(store.quality_baseline() > before);
    }

    #[test]
    fn uncategorized_event_becomes_sealed_generic_trace() {
        let mut store = make_store(10);
        let event = MemoryEvent::new(
            MemoryEventKind::SuggestionAccepted,
            "u1",
            "s1",
            serde_json::json!({}),
        );
        store.process_event(&event);

        let stats = store.stats();
        assert_eq!(stats.traces, 1);
        assert_eq!(stats.open_traces, 0);
    }

    #[test]
    fn clear_leaves_valid_empty_state() {
        let mut store = make_store(10);
        store.start_trace(make_context(), None);
        store.create_decision_tree("d", DecisionNodeKind::Condition, "r");
        store.clear();

        let stats = store.stats();
        assert_eq!(stats.traces, 0);
        assert_eq!(stats.decision_trees, 0);
        // Still usable after the reset
        store.start_trace(make_context(), None);
        assert_eq!(store.stats().traces, 1);
    }
}
