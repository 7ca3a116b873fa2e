//! Error and warning types for KATO operations.
//!
//! KATO distinguishes between conditions that must abort an operation
//! (`KatoError`, surfaced to the caller) and conditions that degrade
//! gracefully (`Warning`, collected and logged but never fatal).
use thiserror::Error;

/// The main error type for KATO operations.
///
/// All fallible operations return `Result<T, KatoError>`. Recoverable
/// conditions (invalid enum config, vector search timeouts, numeric
/// edge cases) are represented as [`Warning`]s instead and never reach
/// this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KatoError {
    /// The request was malformed in a way the caller must fix.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of what was wrong.
        reason: String,
    },

    /// A session or pattern lookup found nothing at the given key.
    #[error("not found: {what} '{id}'")]
    NotFound {
        /// What kind of thing was missing ("session", "pattern", ...).
        what: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A vector collection's dimension is fixed on first insert; this
    /// vector doesn't match it.
    #[error("dimension mismatch for tenant '{node_id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Tenant whose collection dimension is fixed.
        node_id: String,
        /// The dimension fixed on first insert.
        expected: usize,
        /// The dimension of the vector that was rejected.
        actual: usize,
    },

    /// The pattern store or session store failed after retries.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// Description of the underlying failure.
        reason: String,
    },

    /// Serialization/deserialization of persisted state failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for KATO operations.
pub type KatoResult<T> = Result<T, KatoError>;

/// Non-fatal, recoverable conditions. Callers may ignore these safely;
/// they are also always emitted via `tracing::warn!` at the point they
/// occur so a host that discards the return value still observes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// An enum-valued config field held an unrecognized value and was
    /// normalized to its default.
    ConfigNormalized {
        /// The config field that was normalized.
        field: String,
        /// The default value it was normalized to.
        used_default: String,
    },
    /// Vector search degraded to "new symbol only" because the backend
    /// timed out or was unavailable.
    VectorBackendDegraded {
        /// Tenant whose vector search degraded.
        node_id: String,
    },
    /// An internal numeric edge case (division by zero, negative
    /// fragmentation) was guarded and treated as zero.
    DivisionGuard {
        /// Where the guard fired, for diagnostics.
        where_: String,
    },
}

impl Warning {
    /// Emit this warning through `tracing` at the point it occurs.
    pub fn log(&self) {
        match self {
            Warning::ConfigNormalized { field, used_default } => {
                tracing::warn!(field = %field, used_default = %used_default, "config value normalized to default");
            }
            Warning::VectorBackendDegraded { node_id } => {
                tracing::warn!(node_id = %node_id, "vector backend degraded, returning new symbol only");
            }
            Warning::DivisionGuard { where_ } => {
                tracing::warn!(location = %where_, "division guard triggered, treating as zero");
            }
        }
    }
}
