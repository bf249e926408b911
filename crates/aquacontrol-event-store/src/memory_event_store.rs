//! In-memory implementation of the `EventStore` trait.
//!
//! Each aggregate stream has its own mutex; the outer map lock is only held
//! long enough to find or create a stream, so writers of different
//! aggregates never wait on each other's version checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::{AppendResult, EventStore, NewEvent, StoredEvent};

type Stream = Arc<Mutex<Vec<StoredEvent>>>;

#[derive(Debug, Default)]
struct Streams {
    by_id: HashMap<Uuid, Stream>,
    first_appended: Vec<Uuid>,
}

/// Event store holding every stream in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::StorageUnavailable("in-memory event store lock poisoned".into())
}

#[allow(clippy::cast_possible_wrap)]
fn stream_version(log: &[StoredEvent]) -> i64 {
    log.len() as i64
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_stream(&self, aggregate_id: Uuid) -> Result<Option<Stream>, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.by_id.get(&aggregate_id).cloned())
    }

    fn stream_for_write(&self, aggregate_id: Uuid) -> Result<Stream, DomainError> {
        if let Some(stream) = self.existing_stream(aggregate_id)? {
            return Ok(stream);
        }
        let mut streams = self.streams.write().map_err(poisoned)?;
        let Streams {
            by_id,
            first_appended,
        } = &mut *streams;
        let stream = by_id.entry(aggregate_id).or_insert_with(|| {
            first_appended.push(aggregate_id);
            Arc::default()
        });
        Ok(Arc::clone(stream))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<AppendResult, DomainError> {
        let stream = self.stream_for_write(aggregate_id)?;
        let mut log = stream.lock().map_err(poisoned)?;

        let actual = stream_version(&log);
        if actual != expected_version {
            debug!(
                aggregate_id = %aggregate_id,
                expected = expected_version,
                actual,
                "rejected append on stale expected version"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(expected_version + 1..)
            .map(|(event, version)| event.into_stored(aggregate_id, version))
            .collect();
        log.extend(stored.iter().cloned());
        let version = stream_version(&log);
        drop(log);

        if !stored.is_empty() {
            info!(
                aggregate_id = %aggregate_id,
                new_version = version,
                event_count = stored.len(),
                "appended events"
            );
        }

        Ok(AppendResult {
            version,
            events: stored,
        })
    }

    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let Some(stream) = self.existing_stream(aggregate_id)? else {
            return Ok(Vec::new());
        };
        let log = stream.lock().map_err(poisoned)?;
        Ok(log
            .iter()
            .filter(|event| event.version > from_version)
            .cloned()
            .collect())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        let Some(stream) = self.existing_stream(aggregate_id)? else {
            return Ok(0);
        };
        let log = stream.lock().map_err(poisoned)?;
        Ok(stream_version(&log))
    }

    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        let mut ids = Vec::with_capacity(streams.first_appended.len());
        for id in &streams.first_appended {
            let non_empty = streams
                .by_id
                .get(id)
                .map(|stream| stream.lock().map(|log| !log.is_empty()))
                .transpose()
                .map_err(poisoned)?
                .unwrap_or(false);
            if non_empty {
                ids.push(*id);
            }
        }
        Ok(ids)
    }
}
