// ── System 1: Pattern Library ──────────────────────────────────────────────
//
// Code patterns, anti-patterns, best practices, and templates.
//
// Responsibilities:
//   - Merge-on-insert: a new pattern whose similarity to an existing one
//     reaches the merge threshold folds into it (usage-weighted) instead of
//     duplicating
//   - Exact-field filtered, relevance-sorted pattern lookup
//   - Rule-based anti-pattern detection (regex with substring fallback)
//
// Thread-safety: NOT internally synchronized; owned by System1Store.

use crate::atoms::system1_types::{
    AntiPattern, AntiPatternMatch, BestPractice, CodePattern, CodeTemplate, RuleKind,
};
use crate::engine::system1::graph::cosine_similarity;
use log::{debug, info};
use regex::Regex;
use std::collections::{HashMap, HashSet};

// ═════════════════════════════════════════════════════════════════════════════
// Pattern Library
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, CodePattern>,
    anti_patterns: HashMap<String, AntiPattern>,
    best_practices: Vec<BestPractice>,
    templates: HashMap<String, CodeTemplate>,
    /// Lazily compiled detection-rule regexes; `None` marks a pattern that
    /// failed to compile and fell back to substring matching.
    compiled: HashMap<String, Option<Regex>>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Code patterns ───────────────────────────────────────────────────

    /// Insert a pattern, merging into an existing near-duplicate when the
    /// similarity reaches `merge_threshold`. Returns the id of the pattern
    /// that now represents the insert and whether a merge happened.
    pub fn add_pattern(&mut self, pattern: CodePattern, merge_threshold: f64) -> (String, bool) {
        let merge_target = self
            .patterns
            .values()
            .filter(|existing| existing.language == pattern.language)
            .map(|existing| (existing.id.clone(), pattern_similarity(existing, &pattern)))
            .filter(|(_, sim)| *sim >= merge_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((target_id, sim)) = merge_target {
            if let Some(existing) = self.patterns.get_mut(&target_id) {
                merge_into(existing, &pattern);
                info!(
                    "[system1] Merged pattern '{}' into '{}' (similarity {:.2})",
                    pattern.name, existing.name, sim
                );
                return (target_id, true);
            }
        }

        let id = pattern.id.clone();
        debug!("[system1] Stored new pattern '{}' ({})", pattern.name, id);
        self.patterns.insert(id.clone(), pattern);
        (id, false)
    }

    /// Exact-field filter then relevance sort. Absent filters match
    /// everything; ties break by id for determinism.
    pub fn find_patterns(
        &self,
        language: Option<&str>,
        framework: Option<&str>,
        use_case: Option<&str>,
        limit: usize,
    ) -> Vec<CodePattern> {
        let mut hits: Vec<&CodePattern> = self
            .patterns
            .values()
            .filter(|p| language.is_none_or(|l| p.language == l))
            .filter(|p| framework.is_none_or(|f| p.framework.as_deref() == Some(f)))
            .filter(|p| use_case.is_none_or(|u| p.use_case == u))
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.usage_count.cmp(&a.usage_count))
                .then_with(|| a.id.cmp(&b.id))
        });

        hits.into_iter().take(limit).cloned().collect()
    }

    pub fn get_pattern(&self, id: &str) -> Option<&CodePattern> {
        self.patterns.get(id)
    }

    pub fn patterns_mut(&mut self) -> impl Iterator<Item = &mut CodePattern> {
        self.patterns.values_mut()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    // ── Anti-patterns ───────────────────────────────────────────────────

    pub fn add_anti_pattern(&mut self, anti: AntiPattern) {
        self.anti_patterns.insert(anti.id.clone(), anti);
    }

    pub fn anti_pattern_count(&self) -> usize {
        self.anti_patterns.len()
    }

    /// Apply every anti-pattern's detection rules to `code` and return
    /// matches at or above `confidence_floor`. Match confidence is the
    /// matched-weight fraction scaled by the anti-pattern's base confidence.
    pub fn detect_anti_patterns(
        &mut self,
        code: &str,
        confidence_floor: f64,
    ) -> Vec<AntiPatternMatch> {
        let mut matches: Vec<AntiPatternMatch> = Vec::new();

        for anti in self.anti_patterns.values() {
            let total_weight: f64 = anti.detection_rules.iter().map(|r| r.weight).sum();
            if total_weight <= f64::EPSILON {
                continue;
            }

            let mut matched_weight = 0.0;
            let mut dominant: Option<(RuleKind, f64, String)> = None;

            for rule in &anti.detection_rules {
                let hit_line = match rule_matches(&mut self.compiled, &rule.pattern, code) {
                    Some(line) => line,
                    None => continue,
                };
                matched_weight += rule.weight;
                let stronger = dominant.as_ref().is_none_or(|(_, w, _)| rule.weight > *w);
                if stronger {
                    dominant = Some((rule.kind, rule.weight, hit_line));
                }
            }

            if let Some((kind, _, excerpt)) = dominant {
                let confidence = (matched_weight / total_weight) * anti.confidence;
                if confidence >= confidence_floor {
                    matches.push(AntiPatternMatch {
                        anti_pattern_id: anti.id.clone(),
                        name: anti.name.clone(),
                        rule_kind: kind,
                        confidence,
                        excerpt,
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.anti_pattern_id.cmp(&b.anti_pattern_id))
        });
        matches
    }

    // ── Best practices & templates ──────────────────────────────────────

    pub fn add_best_practice(&mut self, practice: BestPractice) {
        self.best_practices.push(practice);
    }

    /// Whether a best practice with this title was already recorded.
    pub fn has_best_practice(&self, title: &str) -> bool {
        self.best_practices.iter().any(|p| p.title == title)
    }

    pub fn best_practices(&self) -> &[BestPractice] {
        &self.best_practices
    }

    pub fn add_template(&mut self, template: CodeTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn find_templates(&self, language: Option<&str>) -> Vec<CodeTemplate> {
        let mut out: Vec<CodeTemplate> = self
            .templates
            .values()
            .filter(|t| language.is_none_or(|l| t.language == l))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn best_practice_count(&self) -> usize {
        self.best_practices.len()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.anti_patterns.clear();
        self.best_practices.clear();
        self.templates.clear();
        self.compiled.clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

/// Cosine similarity when both patterns carry embeddings, word-level
/// Jaccard overlap of the content otherwise.
fn pattern_similarity(a: &CodePattern, b: &CodePattern) -> f64 {
    match (&a.embedding, &b.embedding) {
        (Some(ea), Some(eb)) => cosine_similarity(ea, eb),
        _ => structural_overlap(&a.content, &b.content),
    }
}

/// Word-level Jaccard similarity between two code snippets.
fn structural_overlap(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Fold `incoming` into `existing`, weighting numeric fields by prior
/// usage counts and taking the union of examples.
fn merge_into(existing: &mut CodePattern, incoming: &CodePattern) {
    let w_existing = existing.usage_count.max(1) as f64;
    let w_incoming = incoming.usage_count.max(1) as f64;
    let total = w_existing + w_incoming;

    existing.performance.efficiency = (existing.performance.efficiency * w_existing
        + incoming.performance.efficiency * w_incoming)
        / total;
    existing.relevance =
        (existing.relevance * w_existing + incoming.relevance * w_incoming) / total;

    if let (Some(ea), Some(eb)) = (&mut existing.embedding, &incoming.embedding) {
        if ea.len() == eb.len() {
            for (x, y) in ea.iter_mut().zip(eb.iter()) {
                *x = ((*x as f64 * w_existing + *y as f64 * w_incoming) / total) as f32;
            }
        }
    }

    for example in &incoming.examples {
        if !existing.examples.contains(example) {
            existing.examples.push(example.clone());
        }
    }

    existing.usage_count += incoming.usage_count.max(1);
}

/// Check one detection rule against the code, returning the first matching
/// line. Rules that fail to compile as regex degrade to substring matching.
fn rule_matches(
    compiled: &mut HashMap<String, Option<Regex>>,
    pattern: &str,
    code: &str,
) -> Option<String> {
    let regex = compiled
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).ok());

    for line in code.lines() {
        let hit = match regex {
            Some(re) => re.is_match(line),
            None => line.contains(pattern),
        };
        if hit {
            return Some(line.trim().to_string());
        }
    }
    None
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
