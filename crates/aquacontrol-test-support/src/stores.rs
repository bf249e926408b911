//! Test stores — failing and recording store implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::{AppendResult, EventStore, NewEvent, StoredEvent};
use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};
use aquacontrol_core::snapshot::{Snapshot, SnapshotStore};
use aquacontrol_event_store::{InMemoryReadModelStore, InMemorySnapshotStore};
use async_trait::async_trait;
use uuid::Uuid;

fn unavailable() -> DomainError {
    DomainError::StorageUnavailable("connection refused".into())
}

/// An event store that always returns a storage error.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _aggregate_id: Uuid,
        _events: Vec<NewEvent>,
        _expected_version: i64,
    ) -> Result<AppendResult, DomainError> {
        Err(unavailable())
    }

    async fn read(
        &self,
        _aggregate_id: Uuid,
        _from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(unavailable())
    }

    async fn current_version(&self, _aggregate_id: Uuid) -> Result<i64, DomainError> {
        Err(unavailable())
    }

    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        Err(unavailable())
    }
}

/// A snapshot store that always returns a storage error. Useful for showing
/// that snapshot trouble never blocks loads or saves.
#[derive(Debug)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn save(&self, _snapshot: Snapshot) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn load(&self, _aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError> {
        Err(unavailable())
    }

    async fn delete(&self, _aggregate_id: Uuid) -> Result<(), DomainError> {
        Err(unavailable())
    }
}

/// A snapshot store whose `save` never completes. Loads find nothing.
#[derive(Debug)]
pub struct HangingSnapshotStore;

#[async_trait]
impl SnapshotStore for HangingSnapshotStore {
    async fn save(&self, _snapshot: Snapshot) -> Result<(), DomainError> {
        std::future::pending().await
    }

    async fn load(&self, _aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError> {
        Ok(None)
    }

    async fn delete(&self, _aggregate_id: Uuid) -> Result<(), DomainError> {
        Ok(())
    }
}

/// An in-memory snapshot store that also records every `save` call, including
/// ones the store ignores because a newer snapshot is already held.
#[derive(Debug, Default)]
pub struct RecordingSnapshotStore {
    inner: InMemorySnapshotStore,
    saved: Mutex<Vec<Snapshot>>,
}

impl RecordingSnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every snapshot passed to `save`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved(&self) -> Vec<Snapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotStore for RecordingSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        self.saved.lock().unwrap().push(snapshot.clone());
        self.inner.save(snapshot).await
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError> {
        self.inner.load(aggregate_id).await
    }

    async fn delete(&self, aggregate_id: Uuid) -> Result<(), DomainError> {
        self.inner.delete(aggregate_id).await
    }
}

/// An in-memory read model store whose first `failures` upserts return a
/// storage error. Reads always succeed.
#[derive(Debug)]
pub struct FailingReadModelStore {
    inner: InMemoryReadModelStore,
    remaining_failures: AtomicU32,
    upsert_attempts: AtomicU32,
}

impl FailingReadModelStore {
    /// Fails the first `failures` upserts, then behaves like an in-memory
    /// store.
    #[must_use]
    pub fn failing_first(failures: u32) -> Self {
        Self {
            inner: InMemoryReadModelStore::new(),
            remaining_failures: AtomicU32::new(failures),
            upsert_attempts: AtomicU32::new(0),
        }
    }

    /// Fails every upsert.
    #[must_use]
    pub fn always() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// Returns how many upserts were attempted, failed ones included.
    #[must_use]
    pub fn upsert_attempts(&self) -> u32 {
        self.upsert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadModelStore for FailingReadModelStore {
    async fn load(
        &self,
        projection: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ReadModelRow>, DomainError> {
        self.inner.load(projection, aggregate_id).await
    }

    async fn upsert_if_newer(&self, row: ReadModelRow) -> Result<bool, DomainError> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(unavailable());
        }
        self.inner.upsert_if_newer(row).await
    }

    async fn list(&self, projection: &str) -> Result<Vec<ReadModelRow>, DomainError> {
        self.inner.list(projection).await
    }

    async fn clear(&self, projection: &str) -> Result<u64, DomainError> {
        self.inner.clear(projection).await
    }
}
