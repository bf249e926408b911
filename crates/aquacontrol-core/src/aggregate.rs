//! Aggregate root abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// `apply` must be pure: no I/O, total over every event the aggregate can
/// emit, and deterministic. The engine relies on that to make replay from a
/// snapshot equal to replay from the first event.
pub trait AggregateRoot: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent + 'static;

    /// Type name stored alongside snapshots.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the empty state an aggregate starts from before its first
    /// event.
    fn empty(id: Uuid) -> Self;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);
}

/// An aggregate together with the stream version its state reflects.
///
/// Version 0 means the aggregate has never been persisted; a loaded
/// aggregate always has version 1 or more, which keeps "never created"
/// distinct from "created with default field values".
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<A> {
    aggregate: A,
    version: i64,
}

impl<A: AggregateRoot> Versioned<A> {
    /// Starts a brand-new aggregate at version 0.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            aggregate: A::empty(id),
            version: 0,
        }
    }

    /// Wraps state already known to reflect `version` (e.g. a snapshot).
    #[must_use]
    pub fn from_parts(aggregate: A, version: i64) -> Self {
        Self { aggregate, version }
    }

    /// Returns the aggregate state.
    #[must_use]
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    /// Returns the aggregate identifier.
    #[must_use]
    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate.aggregate_id()
    }

    /// Returns the version the state reflects.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns `true` once at least one event has been persisted.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Applies the next event of the stream and advances the version by one.
    pub fn apply(&mut self, event: &A::Event) {
        self.aggregate.apply(event);
        self.version += 1;
    }
}
