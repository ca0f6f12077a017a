// ── Dualmind Atoms: Engine Types ───────────────────────────────────────────
//
// Shared type definitions for the dual-layer memory engine: events, queries,
// responses, configuration, operation metrics, and the Coordinator's audit
// records. These are pure data types (no logic, no I/O).
//
// Follows the project pattern: structs in atoms/, impls in engine/.
// Store-specific types live in system1_types.rs / system2_types.rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Events
// ═══════════════════════════════════════════════════════════════════════════

/// Priority / urgency scale shared by events and queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric weight used by the strategy selector.
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 0.25,
            Priority::Medium => 0.5,
            Priority::High => 0.75,
            Priority::Critical => 1.0,
        }
    }
}

/// Closed tagged union of everything the engine knows how to ingest.
///
/// Unknown kinds arriving over the wire deserialize to `Other` and are
/// routed to a no-op handler rather than raising.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEventKind {
    CodeGeneration,
    BugFix,
    PatternRecognition,
    LearningUpdate,
    QualityImprovement,
    CommandExecution,
    SuggestionAccepted,
    SuggestionRejected,
    #[serde(other)]
    Other,
}

/// Metadata attached to every ingested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// How confident the emitter is in the event payload (0.0–1.0).
    pub confidence: f64,
    /// Which collaborator produced the event ("cli", "completion", ...).
    pub source: String,
    /// Ingestion priority.
    pub priority: Priority,
    /// Free-form tags. The hot path marks events it has already applied
    /// to System 1 with `hot_path_applied` so the drain does not re-apply.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            source: "unknown".to_string(),
            priority: Priority::Medium,
            tags: Vec::new(),
        }
    }
}

/// The single unit of ingestion. Transient: consumed by the event queue,
/// not persisted once routed into the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub id: String,
    pub kind: MemoryEventKind,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub session_id: String,
    /// Kind-specific payload (e.g. generated code, command line, bug report).
    pub data: serde_json::Value,
    /// Optional free-form reasoning supplied by the emitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub metadata: EventMetadata,
}

impl MemoryEvent {
    /// Create an event with a generated id and the current timestamp.
    pub fn new(
        kind: MemoryEventKind,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            data,
            reasoning: None,
            metadata: EventMetadata::default(),
        }
    }

    /// Check whether a tag is present on the event.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Queries & Responses
// ═══════════════════════════════════════════════════════════════════════════

/// What kind of answer the caller is after. Drives the per-type preference
/// table in the strategy selector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryQueryType {
    Knowledge,
    Pattern,
    Preference,
    Reasoning,
    Decision,
    Quality,
    #[default]
    General,
}

/// A synchronous read request against the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub query_type: MemoryQueryType,
    pub text: String,
    /// Opaque embedding supplied by the caller. The engine never computes
    /// embeddings itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Arbitrary context the caller wants factored into the cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub urgency: Priority,
    pub limit: usize,
}

impl MemoryQuery {
    /// Create a query with default urgency and limit.
    pub fn new(query_type: MemoryQueryType, text: impl Into<String>) -> Self {
        Self {
            query_type,
            text: text.into(),
            embedding: None,
            context: None,
            urgency: Priority::Medium,
            limit: 10,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_urgency(mut self, urgency: Priority) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Which subsystem(s) produced a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    System1,
    System2,
    Both,
}

/// One retrieved item, with provenance and a composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub source: ResponseSource,
    /// Short human-readable label (node name, trace problem, pattern name).
    pub label: String,
    pub content: String,
    pub score: f64,
}

/// The engine's answer to a `MemoryQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub query_id: String,
    pub source: ResponseSource,
    /// Blended confidence across contributing stores (0.0–1.0).
    pub confidence: f64,
    /// True when served from the response cache within TTL.
    pub cached: bool,
    pub latency_ms: u64,
    pub hits: Vec<MemoryHit>,
    /// Follow-up suggestions contributed by the stores (union on merge).
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl MemoryResponse {
    /// An empty, low-confidence response. The read path degrades to this
    /// instead of raising; callers treat it as "no memory context".
    pub fn empty(source: ResponseSource) -> Self {
        Self {
            query_id: uuid::Uuid::new_v4().to_string(),
            source,
            confidence: 0.0,
            cached: false,
            latency_ms: 0,
            hits: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// How the Coordinator settles disagreements between the two stores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    System1Priority,
    System2Priority,
    #[default]
    Balanced,
}

/// Weights for the System 1 node-ranking formula:
/// `w1·cosine + w2·confidence + w3·usage − w4·age`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchWeights {
    pub similarity: f64,
    pub confidence: f64,
    pub usage: f64,
    pub age: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self { similarity: 0.5, confidence: 0.2, usage: 0.2, age: 0.1 }
    }
}

/// Engine configuration, passed at construction and hot-reloadable via
/// `update_config`. All numeric weights are tunable defaults, not
/// empirically validated constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard ceiling on System 1 knowledge nodes.
    pub system1_capacity: usize,
    /// Hard ceiling on retained System 2 reasoning traces.
    pub system2_capacity: usize,
    /// Expected embedding dimension; mismatched inserts are rejected.
    pub embedding_dim: usize,
    /// Response-cache entry TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Response-cache entry ceiling.
    pub cache_capacity: usize,
    /// Event-queue ceiling; oldest events are dropped beyond it.
    pub event_queue_capacity: usize,
    /// Events processed per drain tick.
    pub drain_batch_size: usize,
    /// Drain tick interval.
    pub drain_interval_ms: u64,
    /// Coordinator sync timer interval.
    pub sync_interval_secs: u64,
    /// Coordinator optimization timer interval.
    pub optimize_interval_secs: u64,
    /// Similarity at or above which inserted code patterns merge.
    pub pattern_merge_threshold: f64,
    /// Cluster coherence at or above which compression merges nodes.
    pub cluster_coherence_threshold: f64,
    /// Score margin beyond which only one store is consulted.
    pub single_system_margin: f64,
    /// System 1 share of the both-merge confidence blend (remainder is
    /// System 2's).
    pub blend_weight_system1: f64,
    /// Trace quality below which an Enhancement proposal is emitted.
    pub quality_enhancement_floor: f64,
    /// Minimum confidence for an anti-pattern match to be reported.
    pub anti_pattern_confidence_floor: f64,
    /// Rolling command-frequency table ceiling.
    pub command_history_capacity: usize,
    /// Rolling session table ceiling.
    pub session_history_capacity: usize,
    /// Coordinator audit-record retention (per record kind).
    pub audit_retention: usize,
    /// Half-life for scheduled node-confidence decay, in days.
    pub decay_half_life_days: f64,
    pub conflict_strategy: ConflictStrategy,
    pub search_weights: SearchWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system1_capacity: 1_000,
            system2_capacity: 500,
            embedding_dim: 256,
            cache_ttl_secs: 60,
            cache_capacity: 256,
            event_queue_capacity: 1_000,
            drain_batch_size: 32,
            drain_interval_ms: 250,
            sync_interval_secs: 30,
            optimize_interval_secs: 120,
            pattern_merge_threshold: 0.85,
            cluster_coherence_threshold: 0.82,
            single_system_margin: 0.25,
            blend_weight_system1: 0.6,
            quality_enhancement_floor: 0.5,
            anti_pattern_confidence_floor: 0.4,
            command_history_capacity: 200,
            session_history_capacity: 64,
            audit_retention: 256,
            decay_half_life_days: 30.0,
            conflict_strategy: ConflictStrategy::default(),
            search_weights: SearchWeights::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Metrics & Statistics
// ═══════════════════════════════════════════════════════════════════════════

/// Rolling operation metrics, the Coordinator's primary optimization input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub total_operations: u64,
    pub system1_operations: u64,
    pub system2_operations: u64,
    /// Rolling average query latency in milliseconds.
    pub avg_latency_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
}

impl EngineMetrics {
    /// Fold one latency sample into the rolling average.
    pub fn record_latency(&mut self, latency_ms: u64) {
        let n = self.total_operations.max(1) as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
    }

    /// Cache hits over all cache lookups (0.0 when no lookups yet).
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Errors over all operations (0.0 when no operations yet).
    pub fn error_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            self.errors as f64 / self.total_operations as f64
        }
    }
}

/// Per-store summaries plus the performance summary, for status commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatistics {
    pub system1: crate::atoms::system1_types::System1Stats,
    pub system2: crate::atoms::system2_types::System2Stats,
    pub performance: EngineMetrics,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 5: Coordinator Audit Records
// ═══════════════════════════════════════════════════════════════════════════

/// The four cross-layer transfer kinds the sync cycle performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncTransfer {
    KnowledgeToReasoning,
    QualityToPatterns,
    Preferences,
    LearningData,
}

/// One audited cross-layer data transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPoint {
    pub id: String,
    pub transfer: SyncTransfer,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
    pub success: bool,
    /// Count of target-side items the transfer touched.
    pub items_written: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The four conflict classes the Coordinator detects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DataInconsistency,
    PreferenceMismatch,
    QualityThreshold,
    PerformanceTradeoff,
}

/// One audited, strategy-driven resolution of a detected disagreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub id: String,
    pub kind: ConflictKind,
    pub timestamp: DateTime<Utc>,
    pub strategy: ConflictStrategy,
    /// Which store's view prevailed (None under a balanced split).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ResponseSource>,
    pub confidence: f64,
    /// Estimated impact of the resolution (0.0–1.0).
    pub impact: f64,
    pub detail: String,
}

/// One suggested tuning change produced by the optimization cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub benefit: f64,
    pub effort: f64,
    pub risk: f64,
    /// Safe to apply without human review.
    pub automated: bool,
    /// Set once the Coordinator has applied it.
    pub applied: bool,
}

impl OptimizationRecommendation {
    /// Ranking priority: benefit per unit effort.
    pub fn priority(&self) -> f64 {
        if self.effort <= f64::EPSILON {
            self.benefit
        } else {
            self.benefit / self.effort
        }
    }
}

/// Where a maintenance cycle currently is.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorPhase {
    #[default]
    Idle,
    Syncing,
    Optimizing,
    ConflictCheck,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_weights_are_ordered() {
        assert!(Priority::Low.weight() < Priority::Medium.weight());
        assert!(Priority::Medium.weight() < Priority::High.weight());
        assert!(Priority::High.weight() < Priority::Critical.weight());
    }

    #[test]
    fn unknown_event_kind_deserializes_to_other() {
        let kind: MemoryEventKind = serde_json::from_str("\"telepathy\"").unwrap();
        assert_eq!(kind, MemoryEventKind::Other);
    }

    #[test]
    fn event_tag_lookup() {
        let mut event = MemoryEvent::new(
            MemoryEventKind::CodeGeneration,
            "u1",
            "s1",
            serde_json::json!({}),
        );
        assert!(!event.has_tag("hot_path_applied"));
        event.metadata.tags.push("hot_path_applied".to_string());
        assert!(event.has_tag("hot_path_applied"));
    }

    #[test]
    fn metrics_rolling_latency() {
        let mut m = EngineMetrics::default();
        m.total_operations = 1;
        m.record_latency(10);
        assert!((m.avg_latency_ms - 10.0).abs() < f64::EPSILON);
        m.total_operations = 2;
        m.record_latency(20);
        assert!((m.avg_latency_ms - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_rates_handle_zero() {
        let m = EngineMetrics::default();
        assert_eq!(m.cache_hit_rate(), 0.0);
        assert_eq!(m.error_rate(), 0.0);
    }

    #[test]
    fn recommendation_priority_ranks_by_benefit_per_effort() {
        let cheap = OptimizationRecommendation {
            id: "a".into(),
            timestamp: Utc::now(),
            description: "raise cache ttl".into(),
            benefit: 0.6,
            effort: 0.2,
            risk: 0.1,
            automated: true,
            applied: false,
        };
        let costly = OptimizationRecommendation {
            benefit: 0.9,
            effort: 0.9,
            ..cheap.clone()
        };
        assert!(cheap.priority() > costly.priority());
    }

    #[test]
    fn query_builder_defaults() {
        let q = MemoryQuery::new(MemoryQueryType::Knowledge, "how to parse json")
            .with_urgency(Priority::Critical)
            .with_limit(5);
        assert_eq!(q.urgency, Priority::Critical);
        assert_eq!(q.limit, 5);
        assert!(q.embedding.is_none());
    }
}
