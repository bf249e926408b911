//! Snapshot abstraction.
//!
//! Snapshots are a disposable cache of aggregate state. Deleting every
//! snapshot changes replay cost and nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Serialized aggregate state as of `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The aggregate the state belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type name, checked before deserializing.
    pub aggregate_type: String,
    /// Serialized aggregate.
    pub payload: serde_json::Value,
    /// Version of the last event reflected in `payload`.
    pub version: i64,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Point-in-time aggregate state keyed by aggregate identity.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upserts a snapshot. A snapshot older than the one already stored is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn save(&self, snapshot: Snapshot) -> Result<(), DomainError>;

    /// Loads the snapshot for an aggregate, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn load(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError>;

    /// Removes the snapshot for an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn delete(&self, aggregate_id: Uuid) -> Result<(), DomainError>;
}

/// When the repository takes a snapshot after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Never snapshot.
    Never,
    /// Snapshot whenever a save crosses a multiple of this many events.
    EveryNEvents(u32),
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::EveryNEvents(10)
    }
}

impl SnapshotPolicy {
    /// Returns `true` if moving an aggregate from `previous_version` to
    /// `new_version` crosses a snapshot boundary.
    #[must_use]
    pub fn should_snapshot(self, previous_version: i64, new_version: i64) -> bool {
        match self {
            Self::Never | Self::EveryNEvents(0) => false,
            Self::EveryNEvents(n) => {
                let n = i64::from(n);
                new_version / n > previous_version / n
            }
        }
    }

    /// Returns `true` if a snapshot at `snapshot_version` lags
    /// `current_version` by at least one interval.
    #[must_use]
    pub fn is_stale(self, snapshot_version: i64, current_version: i64) -> bool {
        match self {
            Self::Never | Self::EveryNEvents(0) => false,
            Self::EveryNEvents(n) => current_version - snapshot_version >= i64::from(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_snapshots_every_ten_events() {
        assert_eq!(SnapshotPolicy::default(), SnapshotPolicy::EveryNEvents(10));
    }

    #[test]
    fn test_should_snapshot_when_crossing_boundary() {
        let policy = SnapshotPolicy::EveryNEvents(10);

        assert!(policy.should_snapshot(9, 10));
        assert!(policy.should_snapshot(8, 12));
        assert!(policy.should_snapshot(5, 25));
        assert!(!policy.should_snapshot(10, 11));
        assert!(!policy.should_snapshot(0, 9));
    }

    #[test]
    fn test_never_policy_does_not_snapshot() {
        assert!(!SnapshotPolicy::Never.should_snapshot(0, 1_000));
        assert!(!SnapshotPolicy::EveryNEvents(0).should_snapshot(0, 1_000));
    }

    #[test]
    fn test_is_stale_compares_lag_with_interval() {
        let policy = SnapshotPolicy::EveryNEvents(5);

        assert!(policy.is_stale(0, 5));
        assert!(policy.is_stale(10, 17));
        assert!(!policy.is_stale(10, 14));
        assert!(!SnapshotPolicy::Never.is_stale(0, 100));
    }
}
