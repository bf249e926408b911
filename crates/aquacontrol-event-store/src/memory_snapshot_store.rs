//! In-memory implementation of the `SnapshotStore` trait.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::snapshot::{Snapshot, SnapshotStore};

/// Snapshot store keeping the latest snapshot per aggregate in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<Uuid, Snapshot>>,
}

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::StorageUnavailable("in-memory snapshot store lock poisoned".into())
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregates with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        Ok(self.snapshots.lock().map_err(poisoned)?.len())
    }

    /// Returns `true` if no snapshot is stored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        let mut snapshots = self.snapshots.lock().map_err(poisoned)?;
        let is_newer = snapshots
            .get(&snapshot.aggregate_id)
            .is_none_or(|existing| existing.version <= snapshot.version);
        if is_newer {
            snapshots.insert(snapshot.aggregate_id, snapshot);
        }
        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError> {
        Ok(self
            .snapshots
            .lock()
            .map_err(poisoned)?
            .get(&aggregate_id)
            .cloned())
    }

    async fn delete(&self, aggregate_id: Uuid) -> Result<(), DomainError> {
        self.snapshots.lock().map_err(poisoned)?.remove(&aggregate_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn snapshot(aggregate_id: Uuid, version: i64) -> Snapshot {
        Snapshot {
            aggregate_id,
            aggregate_type: "tank".to_owned(),
            payload: json!({ "version": version }),
            version,
            taken_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_returns_none() {
        let store = InMemorySnapshotStore::new();

        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_newer_snapshot_replaces_older() {
        let store = InMemorySnapshotStore::new();
        let id = Uuid::new_v4();

        store.save(snapshot(id, 10)).await.unwrap();
        store.save(snapshot(id, 20)).await.unwrap();

        assert_eq!(store.load(id).await.unwrap().unwrap().version, 20);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_older_snapshot_is_ignored() {
        let store = InMemorySnapshotStore::new();
        let id = Uuid::new_v4();

        store.save(snapshot(id, 20)).await.unwrap();
        store.save(snapshot(id, 10)).await.unwrap();

        assert_eq!(store.load(id).await.unwrap().unwrap().version, 20);
    }

    #[tokio::test]
    async fn test_delete_removes_snapshot() {
        let store = InMemorySnapshotStore::new();
        let id = Uuid::new_v4();
        store.save(snapshot(id, 10)).await.unwrap();

        store.delete(id).await.unwrap();

        assert!(store.load(id).await.unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }
}
