// ── System 1: Fast, Pattern-Matching Memory ────────────────────────────────
//
// The intuitive half of the dual-layer engine. Sub-modules:
//   - graph: node arena + concept edges + clustering
//   - patterns: pattern library with merge-on-insert and anti-pattern rules
//   - usage: rolling command/session tables
//   - store: the System1Store façade over the above

pub mod graph;
pub mod patterns;
pub mod store;
pub mod usage;

pub use store::System1Store;
