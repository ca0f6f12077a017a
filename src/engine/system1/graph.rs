// ── System 1: Concept Graph ────────────────────────────────────────────────
//
// The node arena plus the relationship structure between knowledge nodes.
// Nodes and edges reference each other by generated id, never by direct
// reference, so the (cyclic) concept graph has no ownership cycles.
//
// Responsibilities:
//   - Node arena: insert / lookup / removal
//   - Edges with endpoint validation and a reverse-adjacency index so
//     eviction cascades edge cleanup in O(degree)
//   - Bounded breadth-first traversal for related-concept lookup
//   - Greedy single-linkage clustering over embeddings (feeds compression)
//
// Thread-safety: NOT internally synchronized. The engine wraps the owning
// System1Store in a lock.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::system1_types::{ConceptCluster, ConceptEdge, EdgeKind, KnowledgeNode};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};

// ═════════════════════════════════════════════════════════════════════════════
// Concept Graph
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct ConceptGraph {
    nodes: HashMap<String, KnowledgeNode>,
    edges: HashMap<String, ConceptEdge>,
    /// node id → outgoing edge ids
    outgoing: HashMap<String, Vec<String>>,
    /// node id → incoming edge ids
    incoming: HashMap<String, Vec<String>>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    pub fn insert_node(&mut self, node: KnowledgeNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut KnowledgeNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &KnowledgeNode> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut KnowledgeNode> {
        self.nodes.values_mut()
    }

    /// Remove a node and cascade-delete every edge touching it.
    /// Returns the node if it existed.
    pub fn remove_node(&mut self, id: &str) -> Option<KnowledgeNode> {
        let node = self.nodes.remove(id)?;

        let mut dangling: Vec<String> = Vec::new();
        if let Some(out) = self.outgoing.remove(id) {
            dangling.extend(out);
        }
        if let Some(inc) = self.incoming.remove(id) {
            dangling.extend(inc);
        }

        for edge_id in dangling {
            if let Some(edge) = self.edges.remove(&edge_id) {
                // Detach from the surviving endpoint's adjacency lists
                if let Some(list) = self.outgoing.get_mut(&edge.source_id) {
                    list.retain(|e| e != &edge_id);
                }
                if let Some(list) = self.incoming.get_mut(&edge.target_id) {
                    list.retain(|e| e != &edge_id);
                }
            }
        }

        Some(node)
    }

    // ── Edges ───────────────────────────────────────────────────────────

    /// Add an edge between two existing nodes. Both endpoints must be live;
    /// a dangling endpoint is a caller bug and is rejected.
    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
        weight: f64,
        confidence: f64,
    ) -> MemoryResult<ConceptEdge> {
        if !self.nodes.contains_key(source_id) {
            return Err(MemoryError::validation(format!(
                "edge source references unknown node {source_id}"
            )));
        }
        if !self.nodes.contains_key(target_id) {
            return Err(MemoryError::validation(format!(
                "edge target references unknown node {target_id}"
            )));
        }

        let edge = ConceptEdge {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            weight,
            confidence,
            created_at: Utc::now(),
        };

        self.outgoing
            .entry(source_id.to_string())
            .or_default()
            .push(edge.id.clone());
        self.incoming
            .entry(target_id.to_string())
            .or_default()
            .push(edge.id.clone());
        self.edges.insert(edge.id.clone(), edge.clone());

        Ok(edge)
    }

    /// Bounded breadth-first traversal up to `max_depth` hops, in both edge
    /// directions, deduplicated by node id. The start node is excluded.
    /// Unknown start ids yield an empty result, not an error.
    pub fn related_ids(&self, node_id: &str, max_depth: usize) -> Vec<String> {
        if !self.nodes.contains_key(node_id) || max_depth == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(node_id);
        let mut result: Vec<String> = Vec::new();
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::new();
        frontier.push_back((node_id, 0));

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbor in self.neighbors(current) {
                if visited.insert(neighbor) {
                    result.push(neighbor.to_string());
                    frontier.push_back((neighbor, depth + 1));
                }
            }
        }

        result
    }

    /// Direct neighbors across outgoing and incoming edges.
    fn neighbors(&self, node_id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(edge_ids) = self.outgoing.get(node_id) {
            for eid in edge_ids {
                if let Some(edge) = self.edges.get(eid) {
                    out.push(edge.target_id.as_str());
                }
            }
        }
        if let Some(edge_ids) = self.incoming.get(node_id) {
            for eid in edge_ids {
                if let Some(edge) = self.edges.get(eid) {
                    out.push(edge.source_id.as_str());
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }

    // ── Clustering ──────────────────────────────────────────────────────

    /// Greedy single-linkage clustering over node embeddings.
    ///
    /// Returns clusters of two or more members whose average pairwise
    /// similarity (coherence) is at or above `coherence_threshold`.
    /// Nodes without embeddings are skipped.
    pub fn find_clusters(&self, coherence_threshold: f64) -> Vec<ConceptCluster> {
        let mut candidates: Vec<&KnowledgeNode> = self
            .nodes
            .values()
            .filter(|n| !n.embedding.is_empty())
            .collect();
        // Deterministic ordering for deterministic clusters
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut assigned = vec![false; candidates.len()];
        let mut clusters: Vec<ConceptCluster> = Vec::new();

        for i in 0..candidates.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let mut members = vec![candidates[i]];

            for j in (i + 1)..candidates.len() {
                if assigned[j] {
                    continue;
                }
                let similar = members.iter().any(|m| {
                    cosine_similarity(&m.embedding, &candidates[j].embedding)
                        >= coherence_threshold
                });
                if similar {
                    assigned[j] = true;
                    members.push(candidates[j]);
                }
            }

            if members.len() < 2 {
                continue;
            }

            let coherence = pairwise_coherence(&members);
            if coherence < coherence_threshold {
                continue;
            }

            clusters.push(ConceptCluster {
                id: uuid::Uuid::new_v4().to_string(),
                node_ids: members.iter().map(|m| m.id.clone()).collect(),
                centroid: centroid(&members),
                coherence,
            });
        }

        clusters
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

/// Cosine similarity between two embedding vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();

    if mag_a < f64::EPSILON || mag_b < f64::EPSILON {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Mean of the members' embeddings.
fn centroid(members: &[&KnowledgeNode]) -> Vec<f32> {
    let dim = members[0].embedding.len();
    let mut sum = vec![0.0_f32; dim];
    for m in members {
        for (i, v) in m.embedding.iter().enumerate().take(dim) {
            sum[i] += v;
        }
    }
    let n = members.len() as f32;
    sum.iter().map(|v| v / n).collect()
}

/// Average pairwise cosine similarity within a cluster.
fn pairwise_coherence(members: &[&KnowledgeNode]) -> f64 {
    let n = members.len();
    if n < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            total += cosine_similarity(&members[i].embedding, &members[j].embedding);
            pairs += 1;
        }
    }
    total / pairs as f64
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
