//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type shared by every store and by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Neither a snapshot nor any event exists for the aggregate.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the writer computed its events against.
        expected: i64,
        /// The version actually stored at commit time.
        actual: i64,
    },

    /// An event or snapshot payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A projection handler failed while applying an event. The event itself
    /// is already committed.
    #[error("projection {projection} failed on event {event_id}: {reason}")]
    ProjectionFailure {
        /// Name of the failing projection.
        projection: String,
        /// The event that could not be applied.
        event_id: Uuid,
        /// Handler-provided reason.
        reason: String,
    },

    /// Transient failure of the underlying storage.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The caller-supplied deadline elapsed before the operation finished.
    #[error("{operation} timed out")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
    },

    /// A domain rule rejected a command.
    #[error("validation error: {0}")]
    Validation(String),
}

impl DomainError {
    /// Returns `true` for the optimistic concurrency conflict, the only error
    /// ordinary application logic is expected to recover from.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Returns `true` for errors worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::Timeout { .. } | Self::ProjectionFailure { .. }
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
