// ── Dualmind Atoms: System 2 Types ─────────────────────────────────────────
//
// Type definitions for the deliberate, audit-oriented store: reasoning
// traces, decision trees, enhancement proposals, the reflection log, and
// code quality metrics. Pure data types; lifecycle and evaluation logic
// lives in engine/system2/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::atoms::system1_types::Complexity;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Reasoning Traces
// ═══════════════════════════════════════════════════════════════════════════

/// The problem framing a trace reasons about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceContext {
    pub problem: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// One step in a reasoning chain. `confidence`, `duration_ms` and
/// `dependencies` are derived at insertion time, never caller-supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub index: usize,
    pub description: String,
    pub confidence: f64,
    /// Milliseconds since the previous step (0 for the first).
    pub duration_ms: u64,
    /// Indices of earlier steps this one builds on.
    #[serde(default)]
    pub dependencies: Vec<usize>,
    pub added_at: DateTime<Utc>,
}

/// A considered-but-not-taken line of reasoning. Must be attached before
/// the trace seals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeReasoning {
    pub description: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_because: Option<String>,
}

/// Lifecycle state of a trace.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceState {
    #[default]
    Open,
    Sealed,
}

/// Descriptive metadata; `quality_score` and `review_required` are computed
/// at seal time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceMetadata {
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub review_required: bool,
}

/// A recorded, steppable chain of reasoning culminating in a sealed
/// conclusion with a quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub context: TraceContext,
    pub steps: Vec<ReasoningStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<AlternativeReasoning>,
    pub state: TraceState,
    pub metadata: TraceMetadata,
}

impl ReasoningTrace {
    pub fn is_sealed(&self) -> bool {
        self.state == TraceState::Sealed
    }
}

/// Per-dimension quality of a sealed trace; each sub-score is normalized
/// to 0.0–1.0, `overall` is the weighted mean.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TraceQuality {
    pub coherence: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub efficiency: f64,
    pub creativity: f64,
    pub overall: f64,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Decision Trees
// ═══════════════════════════════════════════════════════════════════════════

/// What role a decision node plays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionNodeKind {
    Condition,
    Action,
    Outcome,
}

/// One piece of supporting evidence attached to a decision node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub description: String,
    /// Strength of the evidence (0.0–1.0).
    pub strength: f64,
    pub source: String,
    pub added_at: DateTime<Utc>,
}

/// A node in a decision tree. Nodes live in the tree's arena and are
/// addressed by index, so children are index lists, not references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionNode {
    pub kind: DecisionNodeKind,
    pub label: String,
    pub confidence: f64,
    /// The confidence the node was created with, before evidence folded in.
    pub initial_confidence: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub children: Vec<usize>,
}

impl DecisionNode {
    /// Average evidence strength, neutral 0.5 with no evidence yet.
    pub fn evidence_strength(&self) -> f64 {
        if self.evidence.is_empty() {
            0.5
        } else {
            self.evidence.iter().map(|e| e.strength).sum::<f64>() / self.evidence.len() as f64
        }
    }
}

/// A rooted, evidence-weighted branching model. One tree per domain;
/// node 0 is always the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub id: String,
    pub domain: String,
    pub nodes: Vec<DecisionNode>,
    pub created_at: DateTime<Utc>,
}

/// The result of walking a tree against a context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEvaluation {
    pub tree_id: String,
    /// Node indices visited, root first.
    pub path: Vec<usize>,
    /// The final node's label when it is an outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub confidence: f64,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Enhancements
// ═══════════════════════════════════════════════════════════════════════════

/// Broad classification of an enhancement proposal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementKind {
    Performance,
    Quality,
    Usability,
    Architecture,
}

/// Approval lifecycle. Transitions are one-directional except
/// `Rejected → Proposed` (manual re-submission).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementStatus {
    Proposed,
    Approved,
    InProgress,
    Completed,
    Rejected,
}

impl EnhancementStatus {
    /// Whether moving to `next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: EnhancementStatus) -> bool {
        use EnhancementStatus::*;
        matches!(
            (self, next),
            (Proposed, Approved)
                | (Proposed, Rejected)
                | (Approved, InProgress)
                | (Approved, Rejected)
                | (InProgress, Completed)
                | (InProgress, Rejected)
                | (Rejected, Proposed)
        )
    }
}

/// Benefit / effort / risk scoring for a proposal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnhancementImpact {
    pub benefit_score: f64,
    pub effort_score: f64,
    pub risk_score: f64,
}

/// A proposed change to the system with an approval lifecycle. Owned by
/// System 2; the Coordinator references proposals but never owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enhancement {
    pub id: String,
    pub kind: EnhancementKind,
    pub title: String,
    pub description: String,
    pub impact: EnhancementImpact,
    pub status: EnhancementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The trace whose poor quality triggered this proposal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_trace: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Reflection Log
// ═══════════════════════════════════════════════════════════════════════════

/// A concrete follow-up attached to a reflection entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub description: String,
    pub completed: bool,
}

/// One append-only reflection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub insight: String,
    pub confidence: f64,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 5: Code Quality
// ═══════════════════════════════════════════════════════════════════════════

/// Composite static-heuristic quality assessment. Intentionally heuristic,
/// not a full static analyzer: each dimension is a deterministic function
/// of simple signals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CodeQualityMetrics {
    pub maintainability: f64,
    pub readability: f64,
    pub testability: f64,
    pub performance: f64,
    pub security: f64,
    /// Higher is worse; 0.0 means no bug signals found.
    pub bug_density: f64,
    /// Normalized cyclomatic-complexity approximation; higher is worse.
    pub complexity: f64,
}

impl CodeQualityMetrics {
    /// Weighted composite where the "worse" dimensions subtract.
    pub fn overall(&self) -> f64 {
        let positive = self.maintainability * 0.25
            + self.readability * 0.2
            + self.testability * 0.15
            + self.performance * 0.2
            + self.security * 0.2;
        (positive - self.bug_density * 0.15 - self.complexity * 0.1).clamp(0.0, 1.0)
    }
}

/// Summary counts for the System 2 store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System2Stats {
    pub traces: usize,
    pub open_traces: usize,
    pub decision_trees: usize,
    pub enhancements: usize,
    pub reflection_entries: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhancement_transitions_forward_only() {
        use EnhancementStatus::*;
        assert!(Proposed.can_transition_to(Approved));
        assert!(Approved.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));

        // No going back
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Approved.can_transition_to(Proposed));
        assert!(!Completed.can_transition_to(Proposed));
    }

    #[test]
    fn rejected_can_be_resubmitted() {
        use EnhancementStatus::*;
        assert!(Rejected.can_transition_to(Proposed));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn evidence_strength_neutral_when_empty() {
        let node = DecisionNode {
            kind: DecisionNodeKind::Condition,
            label: "is async".into(),
            confidence: 0.7,
            initial_confidence: 0.7,
            evidence: Vec::new(),
            alternatives: Vec::new(),
            children: Vec::new(),
        };
        assert!((node.evidence_strength() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn evidence_strength_averages() {
        let node = DecisionNode {
            kind: DecisionNodeKind::Condition,
            label: "is async".into(),
            confidence: 0.7,
            initial_confidence: 0.7,
            evidence: vec![
                Evidence {
                    description: "seen in 3 traces".into(),
                    strength: 0.8,
                    source: "sync".into(),
                    added_at: Utc::now(),
                },
                Evidence {
                    description: "user confirmed".into(),
                    strength: 0.4,
                    source: "feedback".into(),
                    added_at: Utc::now(),
                },
            ],
            alternatives: Vec::new(),
            children: Vec::new(),
        };
        assert!((node.evidence_strength() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn quality_overall_clamps() {
        let bad = CodeQualityMetrics {
            bug_density: 1.0,
            complexity: 1.0,
            ..Default::default()
        };
        assert_eq!(bad.overall(), 0.0);

        let good = CodeQualityMetrics {
            maintainability: 1.0,
            readability: 1.0,
            testability: 1.0,
            performance: 1.0,
            security: 1.0,
            bug_density: 0.0,
            complexity: 0.0,
        };
        assert!(good.overall() > 0.9);
    }
}
