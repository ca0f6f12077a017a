// ── System 2: Decision Trees ───────────────────────────────────────────────
//
// Evidence-weighted branching models, one tree per domain. Nodes live in an
// arena indexed by position (node 0 is the root), so the tree has no
// ownership cycles and ties can break on the lowest node id
// deterministically.
//
// Evaluation is a read-only walk: at each level the child with the highest
// `confidence × evidence_strength` wins; ties go to the lowest node id.
// Evidence accumulation has diminishing returns: confidence climbs from
// its initial value toward 1.0 but never jumps there on a single datum.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::system2_types::{
    DecisionNode, DecisionNodeKind, DecisionTree, Evidence, TreeEvaluation,
};
use chrono::Utc;
use log::debug;

// ═════════════════════════════════════════════════════════════════════════════
// Constants
// ═════════════════════════════════════════════════════════════════════════════

/// Saturation constant for evidence accumulation: summed strength s maps to
/// a gain of s / (s + EVIDENCE_SATURATION).
const EVIDENCE_SATURATION: f64 = 2.0;

// ═════════════════════════════════════════════════════════════════════════════
// Construction & Growth
// ═════════════════════════════════════════════════════════════════════════════

/// Create a tree for a domain with its root node.
pub fn new_tree(domain: &str, root_kind: DecisionNodeKind, root_label: &str) -> DecisionTree {
    DecisionTree {
        id: uuid::Uuid::new_v4().to_string(),
        domain: domain.to_string(),
        nodes: vec![DecisionNode {
            kind: root_kind,
            label: root_label.to_string(),
            confidence: 0.5,
            initial_confidence: 0.5,
            evidence: Vec::new(),
            alternatives: Vec::new(),
            children: Vec::new(),
        }],
        created_at: Utc::now(),
    }
}

/// Grow the tree under an existing parent. Returns the new node's id.
pub fn add_node(
    tree: &mut DecisionTree,
    parent: usize,
    kind: DecisionNodeKind,
    label: &str,
    confidence: f64,
) -> MemoryResult<usize> {
    if parent >= tree.nodes.len() {
        return Err(MemoryError::not_found("decision node", parent.to_string()));
    }

    let id = tree.nodes.len();
    tree.nodes.push(DecisionNode {
        kind,
        label: label.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        initial_confidence: confidence.clamp(0.0, 1.0),
        evidence: Vec::new(),
        alternatives: Vec::new(),
        children: Vec::new(),
    });
    tree.nodes[parent].children.push(id);
    Ok(id)
}

/// Attach evidence to a node and recompute its confidence as an
/// evidence-weighted aggregate. More and stronger evidence raises
/// confidence with diminishing returns. Returns the new confidence.
pub fn add_evidence(
    tree: &mut DecisionTree,
    node_id: usize,
    evidence: Evidence,
) -> MemoryResult<f64> {
    let node = tree
        .nodes
        .get_mut(node_id)
        .ok_or_else(|| MemoryError::not_found("decision node", node_id.to_string()))?;

    node.evidence.push(evidence);

    let total_strength: f64 = node.evidence.iter().map(|e| e.strength).sum();
    let gain = total_strength / (total_strength + EVIDENCE_SATURATION);
    node.confidence =
        (node.initial_confidence + (1.0 - node.initial_confidence) * gain).clamp(0.0, 1.0);

    Ok(node.confidence)
}

// ═════════════════════════════════════════════════════════════════════════════
// Evaluation
// ═════════════════════════════════════════════════════════════════════════════

/// Walk from the root choosing, at each level, the child with the highest
/// `confidence × evidence_strength` (strict comparison in ascending id
/// order, so ties resolve to the lowest node id). The walk ends at a leaf;
/// the evaluation's confidence is the weakest link along the chosen path.
pub fn evaluate(tree: &DecisionTree, context: &str) -> TreeEvaluation {
    if tree.nodes.is_empty() {
        return TreeEvaluation {
            tree_id: tree.id.clone(),
            path: Vec::new(),
            outcome: None,
            confidence: 0.0,
        };
    }

    let mut path = vec![0usize];
    let mut current = 0usize;
    let mut weakest = tree.nodes[0].confidence;

    loop {
        let node = &tree.nodes[current];
        if node.children.is_empty() {
            break;
        }

        let mut best: Option<(usize, f64)> = None;
        for &child_id in &node.children {
            let child = match tree.nodes.get(child_id) {
                Some(c) => c,
                None => continue,
            };
            let score = child.confidence * child.evidence_strength();
            let better = best.as_ref().is_none_or(|(_, s)| score > *s);
            if better {
                best = Some((child_id, score));
            }
        }

        match best {
            Some((child_id, _)) => {
                weakest = weakest.min(tree.nodes[child_id].confidence);
                path.push(child_id);
                current = child_id;
            }
            None => break,
        }
    }

    let last = &tree.nodes[current];
    let outcome = (last.kind == DecisionNodeKind::Outcome).then(|| last.label.clone());

    debug!(
        "[system2] Evaluated tree '{}' for context '{}': {} hops → {:?}",
        tree.domain,
        context,
        path.len() - 1,
        outcome,
    );

    TreeEvaluation { tree_id: tree.id.clone(), path, outcome, confidence: weakest }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
