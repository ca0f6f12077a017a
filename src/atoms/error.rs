// ── Dualmind Atoms: Error Types ────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants map the memory-engine taxonomy: NotFound, InvalidState,
//     CapacityExceeded, Validation.
//   • Read-path lookups never raise for "no result"; they return empty
//     collections or low-confidence responses. These variants are for
//     write-path caller bugs and genuinely exceptional conditions.
//   • Background maintenance catches errors per item; nothing here is
//     allowed to crash a maintenance loop.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryError {
    /// A referenced trace, tree, node, or enhancement id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A mutation was attempted on a sealed or terminal entity.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An insert still exceeded the hard ceiling after eviction ran.
    /// Eviction runs before inserts fail, so this is expected to be
    /// unreachable in normal operation.
    #[error("Capacity exceeded: {capacity} entries")]
    CapacityExceeded { capacity: usize },

    /// A malformed event or query was rejected at the boundary.
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl MemoryError {
    /// Create a not-found error for a named entity kind.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

// ── Migration bridge: String → MemoryError ─────────────────────────────────

impl From<String> for MemoryError {
    fn from(s: String) -> Self {
        MemoryError::Other(s)
    }
}

impl From<&str> for MemoryError {
    fn from(s: &str) -> Self {
        MemoryError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
pub type MemoryResult<T> = Result<T, MemoryError>;

// ── Conversion: MemoryError → String ───────────────────────────────────────
// Lets host-application command boundaries (`Result<T, String>`) call
// `.map_err(MemoryError::into)` directly.

impl From<MemoryError> for String {
    fn from(e: MemoryError) -> Self {
        e.to_string()
    }
}
