// ── System 1: Fast Pattern-Matching Store ──────────────────────────────────
//
// The intuitive half of the engine: knowledge nodes with embeddings, the
// concept graph, the pattern library, command usage, and user preferences.
// Lookups are approximate and similarity-ranked; size is bounded with
// score-based eviction.
//
// Failure semantics: all lookups return empty results rather than raising
// on "not found". Capacity is the only raised error on this store, and it
// is designed to be unreachable in normal operation because eviction runs
// before insertion fails.
//
// Thread-safety: NOT internally synchronized. The engine wraps this store
// in a lock; structural mutation happens under the write side.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::system1_types::{
    AntiPattern, AntiPatternMatch, BestPractice, CodePattern, CodeTemplate, ConceptEdge, EdgeKind,
    KnowledgeNode, NodeKind, NodeMetadata, PatternPerformance, System1Stats, UserPreferenceSet,
};
use crate::atoms::types::{EngineConfig, MemoryEvent, MemoryEventKind, SearchWeights};
use crate::engine::system1::graph::{cosine_similarity, ConceptGraph};
use crate::engine::system1::patterns::PatternLibrary;
use crate::engine::system1::usage::UsageTracker;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;

// ═════════════════════════════════════════════════════════════════════════════
// Constants
// ═════════════════════════════════════════════════════════════════════════════

/// Confidence boost applied on each retrieval (spacing effect).
const RETRIEVAL_CONFIDENCE_BOOST: f64 = 0.05;

/// Half-life, in hours, of the recency factor used by eviction scoring.
const RECENCY_HALF_LIFE_HOURS: f64 = 168.0; // one week

/// Hours at which the age penalty in search scoring reaches one half.
const AGE_PENALTY_KNEE_HOURS: f64 = 24.0;

// ═════════════════════════════════════════════════════════════════════════════
// System 1 Store
// ═════════════════════════════════════════════════════════════════════════════

pub struct System1Store {
    graph: ConceptGraph,
    patterns: PatternLibrary,
    usage: UsageTracker,
    preferences: UserPreferenceSet,
    capacity: usize,
    embedding_dim: usize,
    search_weights: SearchWeights,
    merge_threshold: f64,
    coherence_threshold: f64,
    anti_pattern_floor: f64,
}

impl System1Store {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            graph: ConceptGraph::new(),
            patterns: PatternLibrary::new(),
            usage: UsageTracker::new(
                config.command_history_capacity,
                config.session_history_capacity,
            ),
            preferences: UserPreferenceSet::default(),
            capacity: config.system1_capacity,
            embedding_dim: config.embedding_dim,
            search_weights: config.search_weights,
            merge_threshold: config.pattern_merge_threshold,
            coherence_threshold: config.cluster_coherence_threshold,
            anti_pattern_floor: config.anti_pattern_confidence_floor,
        }
    }

    /// Re-read tunables after a hot config reload.
    pub fn apply_config(&mut self, config: &EngineConfig) {
        self.capacity = config.system1_capacity;
        self.embedding_dim = config.embedding_dim;
        self.search_weights = config.search_weights;
        self.merge_threshold = config.pattern_merge_threshold;
        self.coherence_threshold = config.cluster_coherence_threshold;
        self.anti_pattern_floor = config.anti_pattern_confidence_floor;
        self.usage
            .set_capacities(config.command_history_capacity, config.session_history_capacity);
    }

    // ── Knowledge nodes ─────────────────────────────────────────────────

    /// Create a knowledge node. Eviction runs first when the store is at
    /// capacity, so `CapacityExceeded` is reserved for the case where
    /// eviction cannot free space.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        name: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Option<NodeMetadata>,
    ) -> MemoryResult<KnowledgeNode> {
        if !embedding.is_empty() && embedding.len() != self.embedding_dim {
            return Err(MemoryError::validation(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.embedding_dim
            )));
        }

        if self.graph.node_count() >= self.capacity {
            self.cleanup_least_used_nodes();
        }
        if self.graph.node_count() >= self.capacity {
            warn!("[system1] Node insert rejected: eviction could not free space");
            return Err(MemoryError::CapacityExceeded { capacity: self.capacity });
        }

        let now = Utc::now();
        let node = KnowledgeNode {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
            content: content.into(),
            embedding,
            confidence: 0.5,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            metadata: metadata.unwrap_or_default(),
        };
        debug!("[system1] Stored node '{}' ({})", node.name, node.id);
        self.graph.insert_node(node.clone());
        Ok(node)
    }

    /// Similarity-ranked lookup. Score =
    /// `w1·cosine + w2·confidence + w3·usage − w4·age`, ties broken by
    /// lexicographic id. Every returned node is reinforced (access count,
    /// access timestamp, confidence boost): read implies reinforcement.
    pub fn search_nodes(
        &mut self,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Vec<KnowledgeNode> {
        let now = Utc::now();
        let w = self.search_weights;

        let mut scored: Vec<(String, f64)> = self
            .graph
            .nodes()
            .map(|node| {
                let similarity = if query_embedding.is_empty() {
                    keyword_overlap(query, &node.name, &node.content)
                } else {
                    cosine_similarity(&node.embedding, query_embedding)
                };
                let usage = {
                    let u = node.usage_score();
                    u / (u + 2.0)
                };
                let age_hours = node.age_hours(now);
                let age_penalty = age_hours / (age_hours + AGE_PENALTY_KNEE_HOURS);

                let score = w.similarity * similarity + w.confidence * node.confidence
                    + w.usage * usage
                    - w.age * age_penalty;
                (node.id.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        let mut results = Vec::with_capacity(scored.len());
        for (id, _) in scored {
            if let Some(node) = self.graph.get_mut(&id) {
                node.record_access(RETRIEVAL_CONFIDENCE_BOOST);
                results.push(node.clone());
            }
        }
        results
    }

    pub fn get_node(&self, id: &str) -> Option<KnowledgeNode> {
        self.graph.get(id).cloned()
    }

    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
        weight: f64,
        confidence: f64,
    ) -> MemoryResult<ConceptEdge> {
        self.graph.add_edge(source_id, target_id, kind, weight, confidence)
    }

    /// Bounded BFS over the concept graph, deduplicated by node id.
    /// Unknown ids yield an empty result.
    pub fn get_related_concepts(&self, node_id: &str, max_depth: usize) -> Vec<KnowledgeNode> {
        self.graph
            .related_ids(node_id, max_depth)
            .iter()
            .filter_map(|id| self.graph.get(id).cloned())
            .collect()
    }

    /// Nodes ranked by confidence, strongest first. Used by the
    /// Coordinator's knowledge transfer.
    pub fn top_nodes_by_confidence(&self, limit: usize) -> Vec<KnowledgeNode> {
        let mut all: Vec<&KnowledgeNode> = self.graph.nodes().collect();
        all.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        all.into_iter().take(limit).cloned().collect()
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Periodic eviction. Usage score per node =
    /// `confidence × recency factor × ln(1 + access_count)`; the
    /// lowest-scoring nodes are evicted until the store is under capacity,
    /// cascading edge cleanup through the graph.
    pub fn cleanup_least_used_nodes(&mut self) -> usize {
        if self.graph.node_count() < self.capacity {
            return 0;
        }

        let now = Utc::now();
        let mut scored: Vec<(String, f64)> = self
            .graph
            .nodes()
            .map(|node| {
                let recency =
                    (-(node.age_hours(now)) * std::f64::consts::LN_2 / RECENCY_HALF_LIFE_HOURS)
                        .exp();
                let score = node.confidence * recency * (1.0 + node.access_count as f64).ln();
                (node.id.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut evicted = 0;
        for (id, _) in scored {
            if self.graph.node_count() < self.capacity {
                break;
            }
            self.graph.remove_node(&id);
            evicted += 1;
        }

        if evicted > 0 {
            info!("[system1] Evicted {evicted} least-used nodes");
        }
        evicted
    }

    /// Merge coherent near-duplicate clusters into a single representative
    /// node: centroid embedding, summed access stats, max confidence.
    /// Returns the number of original nodes folded away.
    pub fn compress_memory(&mut self) -> usize {
        let clusters = self.graph.find_clusters(self.coherence_threshold);
        if clusters.is_empty() {
            return 0;
        }

        let mut folded = 0;
        for cluster in clusters {
            let members: Vec<KnowledgeNode> = cluster
                .node_ids
                .iter()
                .filter_map(|id| self.graph.get(id).cloned())
                .collect();
            if members.len() < 2 {
                continue;
            }

            let best = match members.iter().max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) {
                Some(node) => node,
                None => continue,
            };

            let representative = KnowledgeNode {
                id: uuid::Uuid::new_v4().to_string(),
                kind: best.kind,
                name: best.name.clone(),
                content: best.content.clone(),
                embedding: cluster.centroid.clone(),
                confidence: best.confidence,
                created_at: members.iter().map(|m| m.created_at).min().unwrap_or(best.created_at),
                last_accessed: members
                    .iter()
                    .map(|m| m.last_accessed)
                    .max()
                    .unwrap_or(best.last_accessed),
                access_count: members.iter().map(|m| m.access_count).sum(),
                metadata: best.metadata.clone(),
            };

            for member in &members {
                self.graph.remove_node(&member.id);
            }
            folded += members.len();
            self.graph.insert_node(representative);
        }

        if folded > 0 {
            info!("[system1] ✓ Compressed {folded} nodes into cluster representatives");
        }
        folded
    }

    /// Ebbinghaus-style confidence decay for nodes not accessed recently.
    /// Returns the number of nodes whose confidence changed.
    pub fn decay(&mut self, half_life_days: f64) -> usize {
        if half_life_days <= 0.0 {
            return 0;
        }
        let now = Utc::now();
        let lambda = std::f64::consts::LN_2 / half_life_days;

        let mut decayed = 0;
        for node in self.graph.nodes_mut() {
            let days = node.age_hours(now) / 24.0;
            let factor = (-lambda * days).exp();
            if factor < 0.999 {
                node.confidence *= factor;
                node.metadata.relevance *= factor;
                decayed += 1;
            }
        }
        if decayed > 0 {
            debug!("[system1] Applied decay to {decayed} nodes");
        }
        decayed
    }

    // ── Pattern library ─────────────────────────────────────────────────

    pub fn add_code_pattern(&mut self, pattern: CodePattern) -> (String, bool) {
        self.patterns.add_pattern(pattern, self.merge_threshold)
    }

    pub fn find_code_patterns(
        &self,
        language: Option<&str>,
        framework: Option<&str>,
        use_case: Option<&str>,
        limit: usize,
    ) -> Vec<CodePattern> {
        self.patterns.find_patterns(language, framework, use_case, limit)
    }

    pub fn add_anti_pattern(&mut self, anti: AntiPattern) {
        self.patterns.add_anti_pattern(anti);
    }

    pub fn detect_anti_patterns(&mut self, code: &str) -> Vec<AntiPatternMatch> {
        self.patterns.detect_anti_patterns(code, self.anti_pattern_floor)
    }

    pub fn add_best_practice(&mut self, practice: BestPractice) {
        self.patterns.add_best_practice(practice);
    }

    pub fn has_best_practice(&self, title: &str) -> bool {
        self.patterns.has_best_practice(title)
    }

    pub fn best_practices(&self) -> &[BestPractice] {
        self.patterns.best_practices()
    }

    pub fn add_template(&mut self, template: CodeTemplate) {
        self.patterns.add_template(template);
    }

    pub fn find_templates(&self, language: Option<&str>) -> Vec<CodeTemplate> {
        self.patterns.find_templates(language)
    }

    /// Nudge stored patterns' relevance toward an observed quality signal.
    /// Used by the Coordinator's quality→patterns transfer.
    pub fn adjust_pattern_relevance(&mut self, language: &str, target: f64) -> usize {
        let mut touched = 0;
        for pattern in self.patterns.patterns_mut() {
            if pattern.language == language {
                pattern.relevance += (target - pattern.relevance) * 0.25;
                touched += 1;
            }
        }
        touched
    }

    // ── Usage & preferences ─────────────────────────────────────────────

    pub fn record_session(&mut self, session_id: &str, user_id: &str) {
        self.usage.record_session(session_id, user_id);
    }

    pub fn update_command_history(&mut self, command: &str) {
        self.usage.record_command(command);
    }

    pub fn get_frequent_commands(&self, limit: usize) -> Vec<crate::atoms::system1_types::CommandUsage> {
        self.usage.frequent_commands(limit)
    }

    pub fn get_recent_commands(&self, limit: usize) -> Vec<String> {
        self.usage.recent_commands(limit)
    }

    /// Field-level preference merge; never a full overwrite.
    pub fn update_user_preferences(&mut self, partial: &UserPreferenceSet) {
        self.preferences.merge(partial);
    }

    pub fn preferences(&self) -> &UserPreferenceSet {
        &self.preferences
    }

    pub fn nudge_suggestion_bias(&mut self, delta: f64) {
        self.preferences.nudge_suggestion_bias(delta);
    }

    // ── Event ingestion ─────────────────────────────────────────────────

    /// Route one ingested event into the store. Unknown kinds are no-ops,
    /// not errors; malformed payloads degrade to a logged no-op.
    pub fn process_event(&mut self, event: &MemoryEvent) {
        self.usage.record_session(&event.session_id, &event.user_id);

        match event.kind {
            MemoryEventKind::CodeGeneration => self.extract_code_pattern(event),
            MemoryEventKind::PatternRecognition => {
                if let Some(pattern) = string_field(&event.data, "pattern")
                    .or_else(|| string_field(&event.data, "command"))
                {
                    self.usage.record_command(&pattern);
                }
            }
            MemoryEventKind::LearningUpdate => {
                match serde_json::from_value::<UserPreferenceSet>(
                    event.data.get("preferences").cloned().unwrap_or(serde_json::Value::Null),
                ) {
                    Ok(partial) => self.preferences.merge(&partial),
                    Err(e) => debug!("[system1] Ignoring malformed learning_update: {e}"),
                }
            }
            MemoryEventKind::CommandExecution => {
                if let Some(command) = string_field(&event.data, "command") {
                    self.usage.record_command(&command);
                }
            }
            _ => {} // unknown kinds are no-ops by design
        }
    }

    /// Pattern extraction from a code-generation event. Also the hot path
    /// used directly by `learn` to keep auto-complete quality current.
    pub fn extract_code_pattern(&mut self, event: &MemoryEvent) {
        let content = match string_field(&event.data, "code")
            .or_else(|| string_field(&event.data, "output"))
        {
            Some(c) if !c.is_empty() => c,
            _ => {
                debug!("[system1] code_generation event {} carried no code", event.id);
                return;
            }
        };

        let name = string_field(&event.data, "signature")
            .or_else(|| string_field(&event.data, "name"))
            .unwrap_or_else(|| first_line(&content));
        let language =
            string_field(&event.data, "language").unwrap_or_else(|| "unknown".to_string());
        let use_case =
            string_field(&event.data, "use_case").unwrap_or_else(|| "general".to_string());
        let embedding: Option<Vec<f32>> = event
            .data
            .get("embedding")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let pattern = CodePattern {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            language,
            framework: string_field(&event.data, "framework"),
            use_case,
            content: content.clone(),
            embedding,
            examples: vec![content],
            usage_count: 1,
            relevance: event.metadata.confidence,
            performance: PatternPerformance::default(),
            created_at: Utc::now(),
        };
        self.patterns.add_pattern(pattern, self.merge_threshold);
    }

    // ── Stats & reset ───────────────────────────────────────────────────

    pub fn stats(&self) -> System1Stats {
        System1Stats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            patterns: self.patterns.pattern_count(),
            anti_patterns: self.patterns.anti_pattern_count(),
            best_practices: self.patterns.best_practice_count(),
            templates: self.patterns.template_count(),
            commands_tracked: self.usage.command_count(),
            sessions_tracked: self.usage.session_count(),
        }
    }

    /// Drop everything; leaves the store in a valid empty state.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.patterns.clear();
        self.usage.clear();
        self.preferences = UserPreferenceSet::default();
        info!("[system1] Store cleared");
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

fn string_field(data: &serde_json::Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn first_line(content: &str) -> String {
    content.lines().next().unwrap_or("").trim().to_string()
}

/// Fallback text relevance when no query embedding is supplied:
/// word overlap between the query and the node's name plus content.
fn keyword_overlap(query: &str, name: &str, content: &str) -> f64 {
    let q = query.to_lowercase();
    let query_words: HashSet<&str> = q.split_whitespace().collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", name.to_lowercase(), content.to_lowercase());
    let target_words: HashSet<&str> = haystack.split_whitespace().collect();
    let hits = query_words.iter().filter(|w| target_words.contains(*w)).count();
    hits as f64 / query_words.len() as f64
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(capacity: usize, dim: usize) -> System1Store {
        let config = EngineConfig {
            system1_capacity: capacity,
            embedding_dim: dim,
            ..Default::default()
        };
        System1Store::new(&config)
    }

    fn unit_x(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[0] = 1.0;
        v
    }

    #[test]
    fn add_and_search_reinforces() {
        let mut store = make_store(100, 3);
        let node = store
            .add_node(NodeKind::Function, "parse_json", "fn parse_json()", unit_x(3), None)
            .unwrap();

        let results = store.search_nodes("parse", &unit_x(3), 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, node.id);
        // Read implies reinforcement
        assert_eq!(results[0].access_count, 1);
        assert!(results[0].confidence > node.confidence);
    }

    #[test]
    fn search_ranks_by_similarity() {
        let mut store = make_store(100, 3);
        store
            .add_node(NodeKind::Concept, "x-ish", "along x", vec![1.0, 0.0, 0.0], None)
            .unwrap();
        store
            .add_node(NodeKind::Concept, "y-ish", "along y", vec![0.0, 1.0, 0.0], None)
            .unwrap();

        let results = store.search_nodes("", &[1.0, 0.0, 0.0], 2);
        assert_eq!(results[0].name, "x-ish");
    }

    #[test]
    fn search_without_embedding_uses_text() {
        let mut store = make_store(100, 3);
        store
            .add_node(NodeKind::Concept, "tokio runtime", "async runtime", unit_x(3), None)
            .unwrap();
        store
            .add_node(NodeKind::Concept, "sqlite schema", "database tables", unit_x(3), None)
            .unwrap();

        let results = store.search_nodes("tokio runtime internals", &[], 1);
        assert_eq!(results[0].name, "tokio runtime");
    }

    #[test]
    fn eviction_bound_holds() {
        let mut store = make_store(5, 2);
        for i in 0..20 {
            store
                .add_node(NodeKind::Concept, format!("n{i}"), "c", vec![1.0, 0.0], None)
                .unwrap();
        }
        assert!(store.stats().nodes <= 5);
    }

    #[test]
    fn eviction_keeps_the_reinforced_node() {
        let mut store = make_store(3, 2);
        let keeper = store
            .add_node(NodeKind::Concept, "keeper", "c", vec![1.0, 0.0], None)
            .unwrap();
        // Reinforce it repeatedly
        for _ in 0..5 {
            store.search_nodes("", &[1.0, 0.0], 1);
        }
        for i in 0..6 {
            store
                .add_node(NodeKind::Concept, format!("filler{i}"), "c", vec![0.0, 1.0], None)
                .unwrap();
        }
        assert!(store.get_node(&keeper.id).is_some());
    }

    #[test]
    fn mismatched_embedding_dim_is_rejected() {
        let mut store = make_store(10, 4);
        let err = store.add_node(NodeKind::Concept, "bad", "c", vec![1.0], None);
        assert!(matches!(err, Err(MemoryError::Validation(_))));
    }

    #[test]
    fn related_concepts_resolves_nodes() {
        let mut store = make_store(10, 2);
        let a = store.add_node(NodeKind::Module, "a", "c", vec![1.0, 0.0], None).unwrap();
        let b = store.add_node(NodeKind::Module, "b", "c", vec![0.0, 1.0], None).unwrap();
        store.add_edge(&a.id, &b.id, EdgeKind::DependsOn, 1.0, 0.9).unwrap();

        let related = store.get_related_concepts(&a.id, 2);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, b.id);
        assert!(store.get_related_concepts("ghost", 2).is_empty());
    }

    #[test]
    fn compress_merges_coherent_cluster() {
        let mut store = make_store(100, 3);
        store.add_node(NodeKind::Concept, "a", "c", vec![1.0, 0.0, 0.0], None).unwrap();
        store.add_node(NodeKind::Concept, "b", "c", vec![0.99, 0.02, 0.0], None).unwrap();
        store.add_node(NodeKind::Concept, "far", "c", vec![0.0, 0.0, 1.0], None).unwrap();

        let folded = store.compress_memory();
        assert_eq!(folded, 2);
        // Two originals became one representative; the outlier survives
        assert_eq!(store.stats().nodes, 2);
    }

    #[test]
    fn compress_sums_access_stats() {
        let mut store = make_store(100, 2);
        store.add_node(NodeKind::Concept, "a", "c", vec![1.0, 0.0], None).unwrap();
        store.add_node(NodeKind::Concept, "b", "c", vec![1.0, 0.01], None).unwrap();
        // Touch both nodes
        store.search_nodes("", &[1.0, 0.0], 2);

        store.compress_memory();
        let remaining: Vec<KnowledgeNode> = store.search_nodes("", &[1.0, 0.0], 5);
        // 2 accesses from the search above, +1 from this search's reinforcement
        assert_eq!(remaining[0].access_count, 3);
    }

    #[test]
    fn code_generation_events_dedup_into_one_pattern() {
        let mut store = make_store(100, 3);
        for i in 0..3 {
            let event = MemoryEvent::new(
                MemoryEventKind::CodeGeneration,
                "u1",
                "s1",
                serde_json::json!({
                    "signature": "fn fetch(url: &str) -> Result<Body>",
                    "code": format!("fn fetch(url: &str) -> Result<Body> {{ /* v{i} */ }}"),
                    "language": "rust",
                    "use_case": "http",
                    "embedding": [1.0, (i as f32) * 0.02, 0.0],
                }),
            );
            store.process_event(&event);
        }

        let patterns = store.find_code_patterns(Some("rust"), None, Some("http"), 10);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].examples.len(), 3);
    }

    #[test]
    fn learning_update_merges_preferences() {
        let mut store = make_store(10, 2);
        let event = MemoryEvent::new(
            MemoryEventKind::LearningUpdate,
            "u1",
            "s1",
            serde_json::json!({
                "preferences": { "preferred_language": "rust", "suggestion_bias": 0.5 }
            }),
        );
        store.process_event(&event);
        assert_eq!(store.preferences().preferred_language.as_deref(), Some("rust"));
    }

    #[test]
    fn unknown_event_kind_is_noop() {
        let mut store = make_store(10, 2);
        let event =
            MemoryEvent::new(MemoryEventKind::Other, "u1", "s1", serde_json::json!({"x": 1}));
        store.process_event(&event);
        let stats = store.stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.patterns, 0);
    }

    #[test]
    fn command_events_feed_usage_tables() {
        let mut store = make_store(10, 2);
        for _ in 0..2 {
            let event = MemoryEvent::new(
                MemoryEventKind::CommandExecution,
                "u1",
                "s1",
                serde_json::json!({"command": "cargo test"}),
            );
            store.process_event(&event);
        }
        let frequent = store.get_frequent_commands(5);
        assert_eq!(frequent[0].command, "cargo test");
        assert_eq!(frequent[0].count, 2);
        assert_eq!(store.get_recent_commands(1), vec!["cargo test".to_string()]);
    }

    #[test]
    fn clear_leaves_valid_empty_state() {
        let mut store = make_store(10, 2);
        store.add_node(NodeKind::Concept, "a", "c", vec![1.0, 0.0], None).unwrap();
        store.update_command_history("ls");
        store.clear();

        let stats = store.stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.commands_tracked, 0);
        // Still usable after the reset
        assert!(store.add_node(NodeKind::Concept, "b", "c", vec![1.0, 0.0], None).is_ok());
    }
}
