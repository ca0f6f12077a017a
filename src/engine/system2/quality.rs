// ── System 2: Quality Scoring ──────────────────────────────────────────────
//
// Heuristic quality assessment for code and for sealed reasoning traces.
// All scoring is deterministic and signal-based; no LLM, no full static
// analyzer. The scorer sits behind a trait so the heuristics can be
// replaced or calibrated without touching store logic; the numeric weights
// are tunable defaults, not empirically validated constants.

use crate::atoms::system2_types::{CodeQualityMetrics, ReasoningTrace, TraceQuality};

// ═════════════════════════════════════════════════════════════════════════════
// Scorer Trait
// ═════════════════════════════════════════════════════════════════════════════

/// Pluggable quality scoring. System2Store owns a boxed scorer and never
/// looks behind this interface.
pub trait QualityScorer: Send + Sync {
    /// Composite static assessment of a code snippet.
    fn assess_code(&self, code: &str, language: &str, context: Option<&str>) -> CodeQualityMetrics;

    /// Per-dimension quality of a trace, computed at seal time.
    fn assess_trace(&self, trace: &ReasoningTrace) -> TraceQuality;
}

/// Weights for the trace-quality composite.
#[derive(Debug, Clone, Copy)]
pub struct TraceQualityWeights {
    pub coherence: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub efficiency: f64,
    pub creativity: f64,
}

impl Default for TraceQualityWeights {
    fn default() -> Self {
        Self {
            coherence: 0.3,
            completeness: 0.25,
            accuracy: 0.2,
            efficiency: 0.15,
            creativity: 0.1,
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Heuristic Scorer
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    pub weights: TraceQualityWeights,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QualityScorer for HeuristicScorer {
    fn assess_code(
        &self,
        code: &str,
        _language: &str,
        _context: Option<&str>,
    ) -> CodeQualityMetrics {
        let lines: Vec<&str> = code.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            // Nothing to measure: degrade to a low-confidence result
            return CodeQualityMetrics {
                maintainability: 0.3,
                readability: 0.3,
                testability: 0.3,
                performance: 0.3,
                security: 0.3,
                bug_density: 0.0,
                complexity: 0.0,
            };
        }
        let line_count = lines.len() as f64;

        // Cyclomatic approximation: branch keywords per line
        let branches = count_occurrences(
            code,
            &["if ", "else", "for ", "while ", "match ", "case ", "&&", "||", "?"],
        ) as f64;
        let branch_density = branches / line_count;
        let complexity = branch_density / (branch_density + 0.6);

        // Line-length and function-length signals
        let long_lines = lines.iter().filter(|l| l.len() > 100).count() as f64;
        let long_line_ratio = long_lines / line_count;
        let fn_count = count_occurrences(code, &["fn ", "def ", "function "]).max(1) as f64;
        let avg_fn_len = line_count / fn_count;

        // Naming heuristic: identifiers in a consistent convention
        let naming = naming_consistency(code);

        let maintainability =
            (1.0 - complexity * 0.5 - (avg_fn_len / 120.0).min(1.0) * 0.5).clamp(0.0, 1.0);
        let readability = ((1.0 - long_line_ratio) * 0.6 + naming * 0.4).clamp(0.0, 1.0);
        let testability =
            ((1.0 - complexity) * 0.7 + if code.contains("assert") { 0.3 } else { 0.1 })
                .clamp(0.0, 1.0);

        let loops = count_occurrences(code, &["for ", "while ", "loop "]) as f64;
        let loop_density = loops / line_count;
        let performance = (1.0 - loop_density / (loop_density + 0.3)).clamp(0.0, 1.0);

        let security_hits = count_occurrences(
            code,
            &["unsafe", "eval(", "exec(", "system(", "password =", "secret ="],
        ) as f64;
        let security = (1.0 - security_hits * 0.25).clamp(0.0, 1.0);

        let bug_markers = count_occurrences(code, &["TODO", "FIXME", "HACK", "XXX"]) as f64;
        let bug_density = (bug_markers / (line_count / 25.0).max(1.0)).clamp(0.0, 1.0);

        CodeQualityMetrics {
            maintainability,
            readability,
            testability,
            performance,
            security,
            bug_density,
            complexity,
        }
    }

    fn assess_trace(&self, trace: &ReasoningTrace) -> TraceQuality {
        let step_count = trace.steps.len();

        // Coherence: how much of the chain builds on earlier steps
        let coherence = if step_count <= 1 {
            0.5
        } else {
            let linked = trace.steps.iter().filter(|s| !s.dependencies.is_empty()).count() as f64;
            0.5 + 0.5 * (linked / (step_count as f64 - 1.0)).min(1.0)
        };

        // Completeness: conclusion + step coverage of the stated goals
        let goal_count = trace.context.goals.len().max(1) as f64;
        let completeness = (if trace.conclusion.is_some() { 0.4 } else { 0.0 })
            + 0.4 * (step_count as f64 / goal_count).min(1.0)
            + if trace.context.constraints.is_empty() && trace.context.assumptions.is_empty() {
                0.0
            } else {
                0.2
            };

        // Accuracy: agreement between the step-level and final confidence
        let accuracy = if step_count == 0 {
            trace.confidence * 0.5
        } else {
            let avg_step: f64 =
                trace.steps.iter().map(|s| s.confidence).sum::<f64>() / step_count as f64;
            (1.0 - (avg_step - trace.confidence).abs()).clamp(0.0, 1.0)
        };

        // Efficiency: shorter chains score higher
        let efficiency = 1.0 / (1.0 + step_count as f64 / 8.0);

        // Creativity: alternatives considered, with diminishing returns
        let alt = trace.alternatives.len() as f64;
        let creativity = alt / (alt + 2.0);

        let w = self.weights;
        let total = w.coherence + w.completeness + w.accuracy + w.efficiency + w.creativity;
        let overall = (w.coherence * coherence
            + w.completeness * completeness
            + w.accuracy * accuracy
            + w.efficiency * efficiency
            + w.creativity * creativity)
            / total;

        TraceQuality {
            coherence: coherence.clamp(0.0, 1.0),
            completeness: completeness.clamp(0.0, 1.0),
            accuracy,
            efficiency,
            creativity,
            overall: overall.clamp(0.0, 1.0),
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

fn count_occurrences(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().map(|n| haystack.matches(n).count()).sum()
}

/// Fraction of identifiers following a single naming convention
/// (snake_case or camelCase), sampled from word-ish tokens.
fn naming_consistency(code: &str) -> f64 {
    let identifiers: Vec<&str> = code
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() > 2 && t.chars().next().is_some_and(|c| c.is_alphabetic()))
        .collect();
    if identifiers.is_empty() {
        return 0.5;
    }

    let snake = identifiers
        .iter()
        .filter(|t| t.chars().all(|c| c.is_lowercase() || c.is_numeric() || c == '_'))
        .count() as f64;
    let camel = identifiers
        .iter()
        .filter(|t| {
            !t.contains('_') && t.chars().next().is_some_and(|c| c.is_lowercase())
                && t.chars().any(|c| c.is_uppercase())
        })
        .count() as f64;

    (snake.max(camel) / identifiers.len() as f64).clamp(0.0, 1.0)
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::system2_types::{
        AlternativeReasoning, ReasoningStep, TraceContext, TraceMetadata, TraceState,
    };
    use chrono::Utc;

    fn make_trace(steps: usize, alternatives: usize, conclusion: bool) -> ReasoningTrace {
        ReasoningTrace {
            id: "t1".into(),
            timestamp: Utc::now(),
            context: TraceContext {
                problem: "pick a serializer".into(),
                goals: vec!["fast".into(), "stable".into()],
                constraints: vec!["no unsafe".into()],
                assumptions: Vec::new(),
            },
            steps: (0..steps)
                .map(|i| ReasoningStep {
                    index: i,
                    description: format!("step {i}"),
                    confidence: 0.7,
                    duration_ms: 10,
                    dependencies: if i == 0 { Vec::new() } else { vec![i - 1] },
                    added_at: Utc::now(),
                })
                .collect(),
            conclusion: conclusion.then(|| "use serde".to_string()),
            confidence: 0.7,
            alternatives: (0..alternatives)
                .map(|i| AlternativeReasoning {
                    description: format!("alt {i}"),
                    confidence: 0.4,
                    rejected_because: None,
                })
                .collect(),
            state: TraceState::Sealed,
            metadata: TraceMetadata::default(),
        }
    }

    #[test]
    fn empty_code_degrades_to_low_confidence() {
        let scorer = HeuristicScorer::new();
        let metrics = scorer.assess_code("", "rust", None);
        assert!((metrics.maintainability - 0.3).abs() < f64::EPSILON);
        assert_eq!(metrics.bug_density, 0.0);
    }

    #[test]
    fn branchy_code_scores_higher_complexity() {
        let scorer = HeuristicScorer::new();
        let simple = scorer.assess_code("let x = 1;\nlet y = 2;\n", "rust", None);
        let branchy = scorer.assess_code(
            "if a { b } else if c { d }\nwhile e { if f && g || h { i } }\n",
            "rust",
            None,
        );
        assert!(branchy.complexity > simple.complexity);
        assert!(branchy.maintainability < simple.maintainability);
    }

    #[test]
    fn security_markers_lower_security_score() {
        let scorer = HeuristicScorer::new();
        let clean = scorer.assess_code("fn add(a: u32, b: u32) -> u32 { a + b }", "rust", None);
        let sketchy = scorer.assess_code("unsafe { eval(input) }", "rust", None);
        assert!(sketchy.security < clean.security);
    }

    #[test]
    fn todo_markers_raise_bug_density() {
        let scorer = HeuristicScorer::new();
        let marked = scorer.assess_code("// TODO fix\n// FIXME later\nlet x = 1;", "rust", None);
        assert!(marked.bug_density > 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = HeuristicScorer::new();
        let code = "fn compute(n: u64) -> u64 { if n > 1 { n * 2 } else { n } }";
        let a = scorer.assess_code(code, "rust", None);
        let b = scorer.assess_code(code, "rust", None);
        assert!((a.overall() - b.overall()).abs() < f64::EPSILON);
    }

    #[test]
    fn linked_steps_raise_coherence() {
        let scorer = HeuristicScorer::new();
        let linked = scorer.assess_trace(&make_trace(4, 0, true));

        let mut unlinked_trace = make_trace(4, 0, true);
        for step in &mut unlinked_trace.steps {
            step.dependencies.clear();
        }
        let unlinked = scorer.assess_trace(&unlinked_trace);
        assert!(linked.coherence > unlinked.coherence);
    }

    #[test]
    fn alternatives_raise_creativity_with_diminishing_returns() {
        let scorer = HeuristicScorer::new();
        let none = scorer.assess_trace(&make_trace(3, 0, true));
        let two = scorer.assess_trace(&make_trace(3, 2, true));
        let ten = scorer.assess_trace(&make_trace(3, 10, true));
        assert!(two.creativity > none.creativity);
        assert!(ten.creativity > two.creativity);
        assert!(ten.creativity - two.creativity < two.creativity - none.creativity);
    }

    #[test]
    fn missing_conclusion_lowers_completeness() {
        let scorer = HeuristicScorer::new();
        let concluded = scorer.assess_trace(&make_trace(3, 0, true));
        let dangling = scorer.assess_trace(&make_trace(3, 0, false));
        assert!(concluded.completeness > dangling.completeness);
    }

    #[test]
    fn overall_is_weighted_mean_in_range() {
        let scorer = HeuristicScorer::new();
        let q = scorer.assess_trace(&make_trace(5, 2, true));
        assert!(q.overall > 0.0 && q.overall <= 1.0);
    }
}
