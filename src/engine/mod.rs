// ── Dualmind Engine ────────────────────────────────────────────────────────
//
// Business logic for the dual-layer memory engine.
//
// Architecture:
//   System1Store (fast, approximate) ←→ Coordinator ←→ System2Store (deliberate)
//                      ↑
//        DualMemoryEngine (router façade: query/store/learn/recall)
//                      ↑
//        scheduler (drain + sync + optimize background loops)
//
// Sub-modules:
//   - system1: knowledge nodes, concept graph, patterns, usage, preferences
//   - system2: reasoning traces, decision trees, enhancements, reflection
//   - queue: bounded ingestion queue between store() and the drain
//   - cache: TTL response cache
//   - strategy: per-query store selection and result merging
//   - router: the engine façade external collaborators use
//   - coordinator: cross-store sync, optimization, conflict resolution
//   - scheduler: background task loops with shutdown channels

pub mod cache;
pub mod coordinator;
pub mod queue;
pub mod router;
pub mod scheduler;
pub mod strategy;
pub mod system1;
pub mod system2;

// Re-exports for convenience
pub use coordinator::Coordinator;
pub use router::DualMemoryEngine;
pub use scheduler::EngineHandle;
pub use system1::System1Store;
pub use system2::{HeuristicScorer, QualityScorer, System2Store};
