// ── Dualmind Atoms: System 1 Types ─────────────────────────────────────────
//
// Type definitions for the fast, pattern-matching store: knowledge nodes,
// the concept graph, the pattern library, command usage, and user
// preferences. Pure data types; graph and library logic lives in
// engine/system1/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Knowledge Nodes
// ═══════════════════════════════════════════════════════════════════════════

/// What kind of thing a knowledge node describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Class,
    Module,
    Concept,
    Pattern,
}

/// Coarse complexity bucket shared by nodes and traces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

/// Per-node descriptive metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub complexity: Complexity,
    /// Quality estimate (0.0–1.0).
    #[serde(default)]
    pub quality: f64,
    /// Relevance estimate (0.0–1.0), nudged by the Coordinator.
    #[serde(default)]
    pub relevance: f64,
}

/// An atomic stored fact/pattern/concept with an embedding and usage
/// statistics. Identity is immutable after creation; `confidence`,
/// `relevance` and `access_count` mutate on access and decay on a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Trust in this node (0.0–1.0). Boosted on retrieval, decayed on a
    /// schedule.
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub metadata: NodeMetadata,
}

impl KnowledgeNode {
    /// Sub-linear usage signal: ln(1 + access_count).
    pub fn usage_score(&self) -> f64 {
        (1.0 + self.access_count as f64).ln()
    }

    /// Hours since this node was last retrieved.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_accessed).num_seconds().max(0) as f64 / 3600.0
    }

    /// Read implies reinforcement: bump the access count, refresh the
    /// access timestamp, and boost confidence by the spacing-effect amount.
    pub fn record_access(&mut self, boost: f64) {
        self.access_count += 1;
        self.last_accessed = Utc::now();
        self.confidence = (self.confidence + boost).min(1.0);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Concept Graph
// ═══════════════════════════════════════════════════════════════════════════

/// Relationship kinds between knowledge nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DependsOn,
    Implements,
    Uses,
    SimilarTo,
    Extends,
}

/// A directed edge between two nodes. Stored as id pairs rather than
/// references; eviction removes edges through a reverse-adjacency index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    pub weight: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// A derived group of mutually similar nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptCluster {
    pub id: String,
    pub node_ids: Vec<String>,
    /// Mean of the member embeddings.
    pub centroid: Vec<f32>,
    /// Average pairwise similarity of the members (0.0–1.0).
    pub coherence: f64,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Pattern Library
// ═══════════════════════════════════════════════════════════════════════════

/// Performance characteristics carried by a code pattern. Complexity
/// classes are labels; `efficiency` is the numeric component merged by
/// weighted average when near-duplicate patterns fold together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternPerformance {
    pub time_complexity: String,
    pub space_complexity: String,
    /// Normalized efficiency estimate (0.0–1.0).
    pub efficiency: f64,
}

impl Default for PatternPerformance {
    fn default() -> Self {
        Self {
            time_complexity: "O(n)".to_string(),
            space_complexity: "O(1)".to_string(),
            efficiency: 0.5,
        }
    }
}

/// A reusable code pattern. Near-duplicates merge on insert instead of
/// accumulating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodePattern {
    pub id: String,
    pub name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub use_case: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Concrete occurrences folded into this pattern.
    #[serde(default)]
    pub examples: Vec<String>,
    pub usage_count: u64,
    pub relevance: f64,
    pub performance: PatternPerformance,
    pub created_at: DateTime<Utc>,
}

/// Which analysis family a detection rule belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Syntax,
    Semantic,
    Performance,
    Security,
}

/// One detection rule of an anti-pattern. `pattern` is a regex; rules
/// that fail to compile degrade to literal substring matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    pub kind: RuleKind,
    pub pattern: String,
    pub weight: f64,
}

/// A known-bad construct with detection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiPattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub detection_rules: Vec<DetectionRule>,
    /// Base confidence scaling all rule matches (0.0–1.0).
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// One anti-pattern detection in a piece of code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiPatternMatch {
    pub anti_pattern_id: String,
    pub name: String,
    pub rule_kind: RuleKind,
    pub confidence: f64,
    /// The first matching line, for display.
    pub excerpt: String,
}

/// A recommended practice surfaced alongside patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestPractice {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A fill-in-the-blanks code template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeTemplate {
    pub id: String,
    pub name: String,
    pub language: String,
    pub body: String,
    #[serde(default)]
    pub placeholders: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Usage History & Preferences
// ═══════════════════════════════════════════════════════════════════════════

/// Rolling frequency entry for one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandUsage {
    pub command: String,
    pub count: u64,
    pub last_used: DateTime<Utc>,
}

/// Rolling record of one collaborator session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub event_count: u64,
}

/// A single mutable preference record per user/session. Updated by
/// field-level merge: incoming `Some` fields replace, `None` fields are
/// left alone, and the custom map is extended, never replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferenceSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_convention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent_width: Option<u8>,
    /// How receptive the user is to suggestions (0.0–1.0). Nudged by the
    /// Coordinator's behavior adaptation.
    #[serde(default = "default_suggestion_bias")]
    pub suggestion_bias: f64,
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

fn default_suggestion_bias() -> f64 {
    0.5
}

impl Default for UserPreferenceSet {
    fn default() -> Self {
        Self {
            preferred_language: None,
            preferred_framework: None,
            naming_convention: None,
            verbosity: None,
            indent_width: None,
            suggestion_bias: 0.5,
            custom: HashMap::new(),
        }
    }
}

impl UserPreferenceSet {
    /// Field-level merge: no full overwrite, ever.
    pub fn merge(&mut self, partial: &UserPreferenceSet) {
        if let Some(ref v) = partial.preferred_language {
            self.preferred_language = Some(v.clone());
        }
        if let Some(ref v) = partial.preferred_framework {
            self.preferred_framework = Some(v.clone());
        }
        if let Some(ref v) = partial.naming_convention {
            self.naming_convention = Some(v.clone());
        }
        if let Some(ref v) = partial.verbosity {
            self.verbosity = Some(v.clone());
        }
        if let Some(v) = partial.indent_width {
            self.indent_width = Some(v);
        }
        for (k, v) in &partial.custom {
            self.custom.insert(k.clone(), v.clone());
        }
    }

    /// Nudge the suggestion bias, clamped to [0, 1].
    pub fn nudge_suggestion_bias(&mut self, delta: f64) {
        self.suggestion_bias = (self.suggestion_bias + delta).clamp(0.0, 1.0);
    }
}

/// Summary counts for the System 1 store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System1Stats {
    pub nodes: usize,
    pub edges: usize,
    pub patterns: usize,
    pub anti_patterns: usize,
    pub best_practices: usize,
    pub templates: usize,
    pub commands_tracked: usize,
    pub sessions_tracked: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node() -> KnowledgeNode {
        KnowledgeNode {
            id: "n1".into(),
            kind: NodeKind::Function,
            name: "parse_json".into(),
            content: "fn parse_json(...)".into(),
            embedding: vec![1.0, 0.0],
            confidence: 0.5,
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            access_count: 0,
            metadata: NodeMetadata::default(),
        }
    }

    #[test]
    fn usage_score_is_sublinear() {
        let mut node = make_node();
        node.access_count = 1;
        let one = node.usage_score();
        node.access_count = 100;
        let hundred = node.usage_score();
        assert!(hundred > one);
        assert!(hundred < one * 100.0);
    }

    #[test]
    fn record_access_reinforces() {
        let mut node = make_node();
        node.record_access(0.05);
        assert_eq!(node.access_count, 1);
        assert!((node.confidence - 0.55).abs() < 1e-9);

        // Confidence saturates at 1.0
        for _ in 0..100 {
            node.record_access(0.05);
        }
        assert!(node.confidence <= 1.0);
    }

    #[test]
    fn preference_merge_is_field_level() {
        let mut prefs = UserPreferenceSet {
            preferred_language: Some("rust".into()),
            verbosity: Some("terse".into()),
            ..Default::default()
        };
        let partial = UserPreferenceSet {
            verbosity: Some("chatty".into()),
            indent_width: Some(2),
            ..Default::default()
        };
        prefs.merge(&partial);

        // Replaced
        assert_eq!(prefs.verbosity.as_deref(), Some("chatty"));
        assert_eq!(prefs.indent_width, Some(2));
        // Untouched by the None field in the partial
        assert_eq!(prefs.preferred_language.as_deref(), Some("rust"));
    }

    #[test]
    fn preference_custom_map_extends() {
        let mut prefs = UserPreferenceSet::default();
        prefs.custom.insert("theme".into(), serde_json::json!("dark"));

        let mut partial = UserPreferenceSet::default();
        partial.custom.insert("font".into(), serde_json::json!("mono"));
        prefs.merge(&partial);

        assert_eq!(prefs.custom.len(), 2);
    }

    #[test]
    fn suggestion_bias_clamps() {
        let mut prefs = UserPreferenceSet::default();
        prefs.nudge_suggestion_bias(10.0);
        assert!((prefs.suggestion_bias - 1.0).abs() < f64::EPSILON);
        prefs.nudge_suggestion_bias(-10.0);
        assert!(prefs.suggestion_bias.abs() < f64::EPSILON);
    }
}
