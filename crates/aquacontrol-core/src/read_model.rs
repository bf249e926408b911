//! Read model storage abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// One denormalized row of a projection, keyed by `(projection, aggregate_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadModelRow {
    /// Name of the projection owning the row.
    pub projection: String,
    /// Aggregate the row is derived from.
    pub aggregate_id: Uuid,
    /// Version of the last event applied to the row.
    pub version: i64,
    /// Serialized row state.
    pub state: serde_json::Value,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Query-optimized storage for projection rows.
///
/// Only the projection dispatcher writes here; the query layer reads.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    /// Loads a single row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn load(
        &self,
        projection: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ReadModelRow>, DomainError>;

    /// Writes `row` only if no row exists or the stored row has a lower
    /// version. Returns whether the row was written.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn upsert_if_newer(&self, row: ReadModelRow) -> Result<bool, DomainError>;

    /// Lists every row of a projection ordered by aggregate id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn list(&self, projection: &str) -> Result<Vec<ReadModelRow>, DomainError>;

    /// Deletes every row of a projection, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn clear(&self, projection: &str) -> Result<u64, DomainError>;
}
