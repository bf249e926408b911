//! Repository configuration.

use std::time::Duration;

use aquacontrol_core::snapshot::SnapshotPolicy;

/// Tunables for an [`AggregateRepository`](crate::AggregateRepository).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// When to snapshot after a successful save.
    pub snapshot_policy: SnapshotPolicy,
    /// Deadline applied by `load` and `save` when the caller does not pass
    /// one.
    pub operation_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            snapshot_policy: SnapshotPolicy::default(),
            operation_timeout: Duration::from_secs(5),
        }
    }
}
