//! Routes committed events to projections and writes their rows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aquacontrol_core::clock::Clock;
use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::{EventStore, StoredEvent};
use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};
use aquacontrol_core::retry::RetryConfig;
use aquacontrol_core::sink::EventSink;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::backoff::jittered;
use crate::dead_letter::{DeadLetter, DeadLetterQueue};
use crate::projection::{ErasedProjection, Projection};

/// What happened to one event for one projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The row now reflects the event. `caught_up` counts earlier events that
    /// had not reached the row yet and were read back from the event store
    /// and applied first.
    Applied {
        /// Earlier events applied before this one.
        caught_up: usize,
    },
    /// The row already reflected the event.
    Duplicate,
    /// Every attempt failed; the event is in the dead letter queue.
    DeadLettered,
}

/// Per-projection result of dispatching one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// One entry per projection the event was routed to.
    pub deliveries: Vec<(&'static str, Delivery)>,
}

impl DispatchOutcome {
    /// Number of projections whose row changed.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(|d| matches!(d, Delivery::Applied { .. }))
    }

    /// Number of projections that had already seen the event.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.count(|d| matches!(d, Delivery::Duplicate))
    }

    /// Number of projections that dead-lettered the event.
    #[must_use]
    pub fn dead_lettered(&self) -> usize {
        self.count(|d| matches!(d, Delivery::DeadLettered))
    }

    fn count(&self, predicate: impl Fn(&Delivery) -> bool) -> usize {
        self.deliveries.iter().filter(|(_, d)| predicate(d)).count()
    }
}

/// Applies committed events to registered projections.
///
/// A row's `version` is the version of the last event folded into it. An
/// event is applied only when it is newer than the row, and the write is
/// conditional on the stored version, so redelivery and concurrent delivery
/// never regress or double-apply a row. When an event arrives ahead of
/// events the row has not seen, those are read from the event store and
/// folded in first.
pub struct ProjectionDispatcher {
    read_models: Arc<dyn ReadModelStore>,
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    projections: Vec<Arc<dyn ErasedProjection>>,
    routes: HashMap<&'static str, Vec<usize>>,
    retry: RetryConfig,
    dead_letters: Arc<DeadLetterQueue>,
}

impl fmt::Debug for ProjectionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionDispatcher")
            .field("projections", &self.projection_names())
            .field("retry", &self.retry)
            .field("dead_letters", &self.dead_letters.len())
            .finish_non_exhaustive()
    }
}

impl ProjectionDispatcher {
    /// Creates a dispatcher with no projections and the default retry policy.
    #[must_use]
    pub fn new(
        read_models: Arc<dyn ReadModelStore>,
        events: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            read_models,
            events,
            clock,
            projections: Vec::new(),
            routes: HashMap::new(),
            retry: RetryConfig::default(),
            dead_letters: Arc::new(DeadLetterQueue::new()),
        }
    }

    /// Registers a projection for its event types.
    ///
    /// # Panics
    ///
    /// Panics if a projection with the same name is already registered.
    #[must_use]
    pub fn register<P: Projection>(mut self, projection: P) -> Self {
        let name = Projection::name(&projection);
        assert!(
            !self.projection_names().contains(&name),
            "projection {name} registered twice"
        );
        let index = self.projections.len();
        for &event_type in Projection::event_types(&projection) {
            self.routes.entry(event_type).or_default().push(index);
        }
        self.projections.push(Arc::new(projection));
        self
    }

    /// Replaces the retry policy for failed deliveries.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the registered projection names in registration order.
    #[must_use]
    pub fn projection_names(&self) -> Vec<&'static str> {
        self.projections.iter().map(|p| p.name()).collect()
    }

    /// Returns the dead letter queue.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letters
    }

    pub(crate) fn event_store(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub(crate) fn read_model_store(&self) -> &dyn ReadModelStore {
        self.read_models.as_ref()
    }

    /// Delivers `event` to every projection registered for its type.
    ///
    /// Failures never propagate: each projection retries on its own and
    /// dead-letters the event when it gives up, without affecting the other
    /// projections.
    pub async fn dispatch(&self, event: &StoredEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(indexes) = self.routes.get(event.event_type.as_str()) else {
            return outcome;
        };
        for &index in indexes {
            let projection = self.projections[index].as_ref();
            let delivery = self.deliver(projection, event).await;
            outcome.deliveries.push((projection.name(), delivery));
        }
        outcome
    }

    /// Delivers `event` to the named projection only, if it handles the
    /// event type. Returns `None` when it does not.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no projection has that name.
    pub async fn dispatch_to(
        &self,
        projection: &str,
        event: &StoredEvent,
    ) -> Result<Option<Delivery>, DomainError> {
        let target = self.projection(projection)?;
        if !target.handles(&event.event_type) {
            return Ok(None);
        }
        Ok(Some(self.deliver(target, event).await))
    }

    /// Drains the dead letter queue and delivers every entry again to the
    /// projection that failed it. Entries that fail again are dead-lettered
    /// anew.
    pub async fn redeliver_dead_letters(&self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for letter in self.dead_letters.drain() {
            let Ok(target) = self.projection(letter.projection) else {
                continue;
            };
            let delivery = self.deliver(target, &letter.event).await;
            outcome.deliveries.push((letter.projection, delivery));
        }
        outcome
    }

    pub(crate) fn projection(&self, name: &str) -> Result<&dyn ErasedProjection, DomainError> {
        self.projections
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
            .ok_or_else(|| DomainError::Validation(format!("unknown projection {name}")))
    }

    async fn deliver(&self, projection: &dyn ErasedProjection, event: &StoredEvent) -> Delivery {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.deliver_once(projection, event).await {
                Ok(delivery) => return delivery,
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = jittered(self.retry.delay_after(attempt));
                    warn!(
                        projection = projection.name(),
                        event_id = %event.event_id,
                        aggregate_id = %event.aggregate_id,
                        version = event.version,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "projection delivery failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        projection = projection.name(),
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        aggregate_id = %event.aggregate_id,
                        version = event.version,
                        attempts = attempt,
                        error = %err,
                        "projection gave up on event, dead-lettered"
                    );
                    self.dead_letters.push(DeadLetter {
                        projection: projection.name(),
                        event: event.clone(),
                        error: err,
                        attempts: attempt,
                        failed_at: self.clock.now(),
                    });
                    return Delivery::DeadLettered;
                }
            }
        }
    }

    async fn deliver_once(
        &self,
        projection: &dyn ErasedProjection,
        event: &StoredEvent,
    ) -> Result<Delivery, DomainError> {
        let name = projection.name();
        let row = self.read_models.load(name, event.aggregate_id).await?;
        let (row_version, mut state) = match row {
            Some(row) => (row.version, Some(row.state)),
            None => (0, None),
        };

        if event.version <= row_version {
            debug!(
                projection = name,
                aggregate_id = %event.aggregate_id,
                version = event.version,
                row_version,
                "skipping already applied event"
            );
            return Ok(Delivery::Duplicate);
        }

        let missed: Vec<StoredEvent> = if event.version > row_version + 1 {
            self.events
                .read(event.aggregate_id, row_version)
                .await?
                .into_iter()
                .filter(|e| e.version < event.version && projection.handles(&e.event_type))
                .collect()
        } else {
            Vec::new()
        };
        if !missed.is_empty() {
            debug!(
                projection = name,
                aggregate_id = %event.aggregate_id,
                row_version,
                version = event.version,
                missed = missed.len(),
                "catching up row from event store"
            );
        }

        for earlier in missed.iter().chain(std::iter::once(event)) {
            state = Some(projection.apply_json(state, earlier)?);
        }

        let written = self
            .read_models
            .upsert_if_newer(ReadModelRow {
                projection: name.to_owned(),
                aggregate_id: event.aggregate_id,
                version: event.version,
                state: state.unwrap_or_default(),
                updated_at: self.clock.now(),
            })
            .await?;

        if written {
            Ok(Delivery::Applied {
                caught_up: missed.len(),
            })
        } else {
            debug!(
                projection = name,
                aggregate_id = %event.aggregate_id,
                version = event.version,
                "row advanced concurrently, write skipped"
            );
            Ok(Delivery::Duplicate)
        }
    }
}

#[async_trait]
impl EventSink for ProjectionDispatcher {
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        for event in events {
            self.dispatch(event).await;
        }
        Ok(())
    }
}
