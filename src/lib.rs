// ── Dualmind: Dual-Layer Memory Engine ─────────────────────────────────────
//
// An embedded, in-process knowledge store backing an AI coding assistant
// with two cooperating subsystems: a fast, pattern-matching "System 1"
// store and a deliberate, reasoning-trace "System 2" store (terminology
// borrowed from dual-process cognitive theory). A Coordinator keeps them
// consistent; the DualMemoryEngine façade decides, per request, which
// subsystem(s) to consult.
//
// Collaborators emit `MemoryEvent`s into the engine (fire-and-forget) and
// issue `MemoryQuery`s against it (synchronous). Everything else (event
// routing, eviction, cross-layer sync, conflict resolution, cache and
// metric bookkeeping) happens inside.
//
//   use dualmind::{DualMemoryEngine, EngineConfig, MemoryQuery, MemoryQueryType};
//
//   let engine = DualMemoryEngine::new(EngineConfig::default());
//   let handle = engine.start(); // background drain + maintenance
//   let response = engine.query(&MemoryQuery::new(
//       MemoryQueryType::Knowledge,
//       "how do we parse frames?",
//   ))?;
//
// Embeddings are opaque `Vec<f32>` supplied by the caller; the engine
// never talks to an embedding model or an LLM provider.

pub mod atoms;
pub mod engine;

// Re-exports: the surface external collaborators actually use
pub use atoms::error::{MemoryError, MemoryResult};
pub use atoms::types::{
    ConflictStrategy, EngineConfig, EngineMetrics, EngineStatistics, MemoryEvent, MemoryEventKind,
    MemoryHit, MemoryQuery, MemoryQueryType, MemoryResponse, Priority, ResponseSource,
};
pub use engine::{
    Coordinator, DualMemoryEngine, EngineHandle, HeuristicScorer, QualityScorer, System1Store,
    System2Store,
};
