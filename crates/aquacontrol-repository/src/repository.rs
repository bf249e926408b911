//! Aggregate repository: snapshot-aware loads and optimistic saves.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aquacontrol_core::aggregate::{AggregateRoot, Versioned};
use aquacontrol_core::clock::Clock;
use aquacontrol_core::error::DomainError;
use aquacontrol_core::event::{EventMetadata, EventRegistry};
use aquacontrol_core::event_store::{EventStore, NewEvent};
use aquacontrol_core::sink::EventSink;
use aquacontrol_core::snapshot::{Snapshot, SnapshotStore};
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RepositoryConfig;

/// Loads and saves aggregates of type `A`.
///
/// The repository never retries a [`DomainError::ConcurrencyConflict`]; it
/// counts it and hands it back so the caller can reload and re-decide.
pub struct AggregateRepository<A: AggregateRoot> {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    sink: Arc<dyn EventSink>,
    registry: Arc<EventRegistry<A::Event>>,
    clock: Arc<dyn Clock>,
    config: RepositoryConfig,
    conflicts: AtomicU64,
}

impl<A: AggregateRoot> fmt::Debug for AggregateRepository<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .field("config", &self.config)
            .field("conflicts", &self.conflict_count())
            .finish_non_exhaustive()
    }
}

impl<A: AggregateRoot> AggregateRepository<A> {
    /// Creates a repository with the default [`RepositoryConfig`].
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        sink: Arc<dyn EventSink>,
        registry: Arc<EventRegistry<A::Event>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            snapshots,
            sink,
            registry,
            clock,
            config: RepositoryConfig::default(),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Number of concurrency conflicts observed by `save` since creation.
    #[must_use]
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    pub(crate) fn event_store(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub(crate) fn snapshot_store(&self) -> &dyn SnapshotStore {
        self.snapshots.as_ref()
    }

    /// Loads an aggregate within the configured operation timeout.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if neither a snapshot nor any
    /// event exists, `DomainError::Serialization` if a stored event cannot be
    /// decoded, `DomainError::Timeout` if the deadline elapses, and store
    /// errors otherwise.
    pub async fn load(&self, aggregate_id: Uuid) -> Result<Versioned<A>, DomainError> {
        self.load_within(aggregate_id, self.config.operation_timeout)
            .await
    }

    /// Loads an aggregate, giving up after `deadline`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn load_within(
        &self,
        aggregate_id: Uuid,
        deadline: Duration,
    ) -> Result<Versioned<A>, DomainError> {
        timeout(deadline, self.replay(aggregate_id))
            .await
            .map_err(|_| DomainError::Timeout { operation: "load" })?
    }

    /// Appends `events` produced against `aggregate` and returns the
    /// aggregate with those events applied.
    ///
    /// On success a snapshot is taken if the policy boundary was crossed and
    /// the stored events are published to the sink. Both steps share what is
    /// left of the deadline. Neither can fail the save: the events are
    /// already committed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer appended
    /// since `aggregate` was loaded, `DomainError::Serialization` if an event
    /// cannot be encoded, `DomainError::Timeout` if the configured deadline
    /// elapses (the append may or may not have committed; reload to find
    /// out), and store errors otherwise.
    pub async fn save(
        &self,
        aggregate: &Versioned<A>,
        events: Vec<A::Event>,
        correlation_id: Uuid,
    ) -> Result<Versioned<A>, DomainError> {
        self.save_within(
            aggregate,
            events,
            correlation_id,
            self.config.operation_timeout,
        )
        .await
    }

    /// Like [`save`](Self::save) with a caller-supplied deadline.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub async fn save_within(
        &self,
        aggregate: &Versioned<A>,
        events: Vec<A::Event>,
        correlation_id: Uuid,
        deadline: Duration,
    ) -> Result<Versioned<A>, DomainError> {
        let started = Instant::now();
        let aggregate_id = aggregate.aggregate_id();
        let metadata = EventMetadata::for_command(correlation_id, self.clock.now());
        let new_events = events
            .iter()
            .map(|event| NewEvent::from_domain(event, metadata.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let append = self
            .events
            .append(aggregate_id, new_events, aggregate.version());
        let appended = match timeout(deadline, append).await {
            Err(_) => return Err(DomainError::Timeout { operation: "save" }),
            Ok(Err(err)) => {
                if err.is_conflict() {
                    let total = self.conflicts.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(
                        aggregate_type = A::AGGREGATE_TYPE,
                        aggregate_id = %aggregate_id,
                        conflicts_total = total,
                        error = %err,
                        "optimistic concurrency conflict"
                    );
                }
                return Err(err);
            }
            Ok(Ok(appended)) => appended,
        };

        let mut updated = aggregate.clone();
        for event in &events {
            updated.apply(event);
        }

        if self
            .config
            .snapshot_policy
            .should_snapshot(aggregate.version(), updated.version())
        {
            let remaining = deadline.saturating_sub(started.elapsed());
            match timeout(remaining, self.write_snapshot(&updated)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    aggregate_id = %aggregate_id,
                    version = updated.version(),
                    error = %err,
                    "snapshot save failed"
                ),
                Err(_) => warn!(
                    aggregate_id = %aggregate_id,
                    version = updated.version(),
                    "snapshot save abandoned at deadline"
                ),
            }
        }

        if !appended.events.is_empty() {
            let remaining = deadline.saturating_sub(started.elapsed());
            match timeout(remaining, self.sink.publish(&appended.events)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    aggregate_id = %aggregate_id,
                    version = appended.version,
                    error = %err,
                    "publishing committed events failed"
                ),
                Err(_) => warn!(
                    aggregate_id = %aggregate_id,
                    version = appended.version,
                    "publishing committed events abandoned at deadline"
                ),
            }
        }

        Ok(updated)
    }

    pub(crate) async fn replay(&self, aggregate_id: Uuid) -> Result<Versioned<A>, DomainError> {
        let base = self.usable_snapshot(aggregate_id).await;
        let from_snapshot = base.is_some();
        let mut aggregate = base.unwrap_or_else(|| Versioned::new(aggregate_id));

        let events = self.events.read(aggregate_id, aggregate.version()).await?;
        if !from_snapshot && events.is_empty() {
            return Err(DomainError::AggregateNotFound(aggregate_id));
        }

        for stored in &events {
            let event = stored.decode(&self.registry)?;
            aggregate.apply(&event);
        }

        debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate_id,
            from_snapshot,
            replayed = events.len(),
            version = aggregate.version(),
            "loaded aggregate"
        );
        Ok(aggregate)
    }

    /// Returns the stored snapshot as a starting point, or `None` if there is
    /// none or it cannot be used. A broken snapshot costs a full replay,
    /// never a failed load.
    async fn usable_snapshot(&self, aggregate_id: Uuid) -> Option<Versioned<A>> {
        let snapshot = match self.snapshots.load(aggregate_id).await {
            Ok(snapshot) => snapshot?,
            Err(err) => {
                warn!(aggregate_id = %aggregate_id, error = %err, "snapshot load failed");
                return None;
            }
        };
        if snapshot.aggregate_type != A::AGGREGATE_TYPE {
            warn!(
                aggregate_id = %aggregate_id,
                found = %snapshot.aggregate_type,
                expected = A::AGGREGATE_TYPE,
                "ignoring snapshot of another aggregate type"
            );
            return None;
        }
        match serde_json::from_value::<A>(snapshot.payload) {
            Ok(state) => Some(Versioned::from_parts(state, snapshot.version)),
            Err(err) => {
                warn!(
                    aggregate_id = %aggregate_id,
                    version = snapshot.version,
                    error = %err,
                    "snapshot decode failed"
                );
                None
            }
        }
    }

    pub(crate) async fn write_snapshot(&self, aggregate: &Versioned<A>) -> Result<(), DomainError> {
        let snapshot = Snapshot {
            aggregate_id: aggregate.aggregate_id(),
            aggregate_type: A::AGGREGATE_TYPE.to_owned(),
            payload: serde_json::to_value(aggregate.aggregate())?,
            version: aggregate.version(),
            taken_at: self.clock.now(),
        };
        self.snapshots.save(snapshot).await?;
        debug!(
            aggregate_id = %aggregate.aggregate_id(),
            version = aggregate.version(),
            "snapshot saved"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aquacontrol_core::aggregate::{AggregateRoot, Versioned};
    use aquacontrol_core::error::DomainError;
    use aquacontrol_core::event::{DomainEvent, EventRegistry};
    use aquacontrol_core::event_store::{AppendResult, EventStore, NewEvent, StoredEvent};
    use aquacontrol_core::snapshot::{Snapshot, SnapshotPolicy, SnapshotStore};
    use aquacontrol_event_store::{InMemoryEventStore, InMemorySnapshotStore};
    use aquacontrol_test_support::{
        FailingEventSink, FailingSnapshotStore, FixedClock, HangingEventSink,
        HangingSnapshotStore, RecordingEventSink, RecordingSnapshotStore,
    };
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::AggregateRepository;
    use crate::config::RepositoryConfig;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Installed {
        pub label: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Measured {
        pub value: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum MeterEvent {
        Installed(Installed),
        Measured(Measured),
    }

    impl DomainEvent for MeterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Installed(_) => "meter.installed",
                Self::Measured(_) => "meter.measured",
            }
        }

        fn schema_version(&self) -> i32 {
            1
        }

        fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
            Ok(match self {
                Self::Installed(payload) => serde_json::to_value(payload)?,
                Self::Measured(payload) => serde_json::to_value(payload)?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Meter {
        pub id: Uuid,
        pub label: String,
        pub total: i64,
        pub readings: u32,
    }

    impl AggregateRoot for Meter {
        type Event = MeterEvent;
        const AGGREGATE_TYPE: &'static str = "meter";

        fn empty(id: Uuid) -> Self {
            Self {
                id,
                label: String::new(),
                total: 0,
                readings: 0,
            }
        }

        fn aggregate_id(&self) -> Uuid {
            self.id
        }

        fn apply(&mut self, event: &Self::Event) {
            match event {
                MeterEvent::Installed(payload) => self.label.clone_from(&payload.label),
                MeterEvent::Measured(payload) => {
                    self.total += payload.value;
                    self.readings += 1;
                }
            }
        }
    }

    pub(crate) fn meter_registry() -> Arc<EventRegistry<MeterEvent>> {
        Arc::new(
            EventRegistry::new()
                .register("meter.installed", 1, MeterEvent::Installed)
                .register("meter.measured", 1, MeterEvent::Measured),
        )
    }

    pub(crate) fn installed(label: &str) -> MeterEvent {
        MeterEvent::Installed(Installed {
            label: label.to_owned(),
        })
    }

    pub(crate) fn measured(value: i64) -> MeterEvent {
        MeterEvent::Measured(Measured { value })
    }

    pub(crate) fn repository(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        policy: SnapshotPolicy,
    ) -> AggregateRepository<Meter> {
        AggregateRepository::new(
            events,
            snapshots,
            Arc::new(RecordingEventSink::new()),
            meter_registry(),
            Arc::new(FixedClock::default()),
        )
        .with_config(RepositoryConfig {
            snapshot_policy: policy,
            ..RepositoryConfig::default()
        })
    }

    #[derive(Debug, Default)]
    struct SlowEventStore {
        inner: InMemoryEventStore,
    }

    #[async_trait]
    impl EventStore for SlowEventStore {
        async fn append(
            &self,
            aggregate_id: Uuid,
            events: Vec<NewEvent>,
            expected_version: i64,
        ) -> Result<AppendResult, DomainError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.inner.append(aggregate_id, events, expected_version).await
        }

        async fn read(
            &self,
            aggregate_id: Uuid,
            from_version: i64,
        ) -> Result<Vec<StoredEvent>, DomainError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.inner.read(aggregate_id, from_version).await
        }

        async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
            self.inner.current_version(aggregate_id).await
        }

        async fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
            self.inner.aggregate_ids().await
        }
    }

    #[tokio::test]
    async fn test_load_unknown_aggregate_is_not_found() {
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            SnapshotPolicy::default(),
        );
        let id = Uuid::new_v4();

        let result = repo.load(id).await;

        match result {
            Err(DomainError::AggregateNotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save_new_aggregate_then_load_returns_state_and_version() {
        // Arrange
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            SnapshotPolicy::default(),
        );
        let id = Uuid::new_v4();

        // Act
        let saved = repo
            .save(
                &Versioned::new(id),
                vec![installed("inlet"), measured(4)],
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        let loaded = repo.load(id).await.unwrap();

        // Assert
        assert_eq!(saved.version(), 2);
        assert_eq!(loaded, saved);
        assert_eq!(loaded.aggregate().label, "inlet");
        assert_eq!(loaded.aggregate().total, 4);
    }

    #[tokio::test]
    async fn test_created_with_default_values_is_distinct_from_missing() {
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            SnapshotPolicy::default(),
        );
        let id = Uuid::new_v4();
        repo.save(&Versioned::new(id), vec![installed("")], Uuid::new_v4())
            .await
            .unwrap();

        let loaded = repo.load(id).await.unwrap();

        assert!(loaded.exists());
        assert_eq!(loaded.aggregate(), &Meter::empty(id));
    }

    #[tokio::test]
    async fn test_save_against_stale_version_conflicts_and_is_counted() {
        // Arrange
        let sink = Arc::new(RecordingEventSink::new());
        let repo = AggregateRepository::<Meter>::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            sink.clone(),
            meter_registry(),
            Arc::new(FixedClock::default()),
        );
        let id = Uuid::new_v4();
        let created = repo
            .save(&Versioned::new(id), vec![installed("outlet")], Uuid::new_v4())
            .await
            .unwrap();
        repo.save(&created, vec![measured(1)], Uuid::new_v4())
            .await
            .unwrap();

        // Act
        let result = repo.save(&created, vec![measured(2)], Uuid::new_v4()).await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(repo.conflict_count(), 1);
        assert_eq!(sink.events().len(), 2);
        assert_eq!(repo.load(id).await.unwrap().aggregate().total, 1);
    }

    #[tokio::test]
    async fn test_committed_events_are_published_with_metadata() {
        // Arrange
        let sink = Arc::new(RecordingEventSink::new());
        let clock = FixedClock::default();
        let repo = AggregateRepository::<Meter>::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            sink.clone(),
            meter_registry(),
            Arc::new(clock),
        );
        let id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        // Act
        repo.save(
            &Versioned::new(id),
            vec![installed("sump"), measured(9)],
            correlation_id,
        )
        .await
        .unwrap();

        // Assert
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let published = &batches[0];
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event_type, "meter.installed");
        assert_eq!(published[0].version, 1);
        assert_eq!(published[1].event_type, "meter.measured");
        assert_eq!(published[1].version, 2);
        assert_eq!(published[1].metadata.correlation_id, correlation_id);
        assert_eq!(published[1].metadata.occurred_at, clock.0);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_committed_save() {
        let events = Arc::new(InMemoryEventStore::new());
        let repo = AggregateRepository::<Meter>::new(
            events.clone(),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(FailingEventSink),
            meter_registry(),
            Arc::new(FixedClock::default()),
        );
        let id = Uuid::new_v4();

        let saved = repo
            .save(&Versioned::new(id), vec![installed("drain")], Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(saved.version(), 1);
        assert_eq!(events.current_version(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_taken_when_save_crosses_interval() {
        // Arrange
        let snapshots = Arc::new(RecordingSnapshotStore::new());
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            snapshots.clone(),
            SnapshotPolicy::EveryNEvents(3),
        );
        let id = Uuid::new_v4();

        // Act
        let v2 = repo
            .save(
                &Versioned::new(id),
                vec![installed("a"), measured(1)],
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        let v4 = repo
            .save(&v2, vec![measured(2), measured(3)], Uuid::new_v4())
            .await
            .unwrap();
        repo.save(&v4, vec![measured(4)], Uuid::new_v4())
            .await
            .unwrap();

        // Assert
        let saved = snapshots.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].version, 4);
        assert_eq!(saved[0].aggregate_type, "meter");
        let state: Meter = serde_json::from_value(saved[0].payload.clone()).unwrap();
        assert_eq!(state.total, 6);
    }

    #[tokio::test]
    async fn test_never_policy_takes_no_snapshot() {
        let snapshots = Arc::new(RecordingSnapshotStore::new());
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            snapshots.clone(),
            SnapshotPolicy::Never,
        );
        let events: Vec<_> = (0..25).map(measured).collect();

        repo.save(&Versioned::new(Uuid::new_v4()), events, Uuid::new_v4())
            .await
            .unwrap();

        assert!(snapshots.saved().is_empty());
    }

    #[tokio::test]
    async fn test_load_from_snapshot_equals_full_replay() {
        // Arrange
        let events = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let repo = repository(events.clone(), snapshots.clone(), SnapshotPolicy::EveryNEvents(4));
        let id = Uuid::new_v4();
        let mut current = repo
            .save(&Versioned::new(id), vec![installed("main")], Uuid::new_v4())
            .await
            .unwrap();
        for value in 1..=22 {
            current = repo
                .save(&current, vec![measured(value)], Uuid::new_v4())
                .await
                .unwrap();
        }
        assert_eq!(snapshots.load(id).await.unwrap().unwrap().version, 20);

        // Act
        let from_snapshot = repo.load(id).await.unwrap();
        snapshots.delete(id).await.unwrap();
        let from_scratch = repo.load(id).await.unwrap();

        // Assert
        assert_eq!(from_snapshot, from_scratch);
        assert_eq!(from_scratch.version(), 23);
        assert_eq!(from_scratch.aggregate().readings, 22);
    }

    #[tokio::test]
    async fn test_undecodable_snapshot_falls_back_to_full_replay() {
        // Arrange
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            snapshots.clone(),
            SnapshotPolicy::Never,
        );
        let id = Uuid::new_v4();
        repo.save(
            &Versioned::new(id),
            vec![installed("x"), measured(5)],
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        snapshots
            .save(Snapshot {
                aggregate_id: id,
                aggregate_type: "meter".to_owned(),
                payload: serde_json::json!({ "unexpected": true }),
                version: 2,
                taken_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        // Act
        let loaded = repo.load(id).await.unwrap();

        // Assert
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.aggregate().total, 5);
    }

    #[tokio::test]
    async fn test_snapshot_store_outage_blocks_neither_load_nor_save() {
        let repo = repository(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(FailingSnapshotStore),
            SnapshotPolicy::EveryNEvents(1),
        );
        let id = Uuid::new_v4();

        let saved = repo
            .save(
                &Versioned::new(id),
                vec![installed("x"), measured(2)],
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        let loaded = repo.load(id).await.unwrap();

        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_load_and_save_return_timeout_past_deadline() {
        let repo = repository(
            Arc::new(SlowEventStore::default()),
            Arc::new(InMemorySnapshotStore::new()),
            SnapshotPolicy::default(),
        );
        let id = Uuid::new_v4();

        let load = repo.load_within(id, Duration::from_millis(10)).await;
        let save = repo
            .save_within(
                &Versioned::new(id),
                vec![installed("late")],
                Uuid::new_v4(),
                Duration::from_millis(10),
            )
            .await;

        assert!(matches!(load, Err(DomainError::Timeout { operation: "load" })));
        assert!(matches!(save, Err(DomainError::Timeout { operation: "save" })));
    }

    #[tokio::test]
    async fn test_hanging_snapshot_store_cannot_stall_save_past_deadline() {
        // Arrange
        let events = Arc::new(InMemoryEventStore::new());
        let repo = repository(
            events.clone(),
            Arc::new(HangingSnapshotStore),
            SnapshotPolicy::EveryNEvents(1),
        );
        let id = Uuid::new_v4();
        let started = std::time::Instant::now();

        // Act
        let saved = repo
            .save_within(
                &Versioned::new(id),
                vec![installed("slow"), measured(3)],
                Uuid::new_v4(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();

        // Assert
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(saved.version(), 2);
        assert_eq!(events.current_version(id).await.unwrap(), 2);
        assert_eq!(repo.load(id).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_hanging_sink_cannot_stall_save_past_deadline() {
        let events = Arc::new(InMemoryEventStore::new());
        let repo = AggregateRepository::<Meter>::new(
            events.clone(),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(HangingEventSink),
            meter_registry(),
            Arc::new(FixedClock::default()),
        );
        let id = Uuid::new_v4();
        let started = std::time::Instant::now();

        let saved = repo
            .save_within(
                &Versioned::new(id),
                vec![installed("slow")],
                Uuid::new_v4(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(saved.version(), 1);
        assert_eq!(events.current_version(id).await.unwrap(), 1);
    }
}
