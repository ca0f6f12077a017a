// ── Dualmind Atoms ─────────────────────────────────────────────────────────
// Pure data types shared across the engine. No logic, no I/O.

pub mod error;
pub mod system1_types;
pub mod system2_types;
pub mod types;
