// ── System 2: Deliberate, Audit-Oriented Memory ────────────────────────────
//
// The analytical half of the dual-layer engine. Sub-modules:
//   - quality: pluggable heuristic scoring for code and traces
//   - decisions: evidence-weighted decision trees
//   - reflection: append-only reflection log + enhancement ledger
//   - store: the System2Store façade over the above

pub mod decisions;
pub mod quality;
pub mod reflection;
pub mod store;

pub use quality::{HeuristicScorer, QualityScorer};
pub use store::System2Store;
