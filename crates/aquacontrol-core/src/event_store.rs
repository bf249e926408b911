//! Event store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{DomainEvent, EventMetadata, EventRegistry};

/// An event produced by a command but not yet persisted. The store assigns
/// its identifier and version at append time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Payload schema version.
    pub schema_version: i32,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation/causation identifiers and occurrence time.
    pub metadata: EventMetadata,
}

impl NewEvent {
    /// Serializes a domain event into an appendable record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be encoded.
    pub fn from_domain<E: DomainEvent>(
        event: &E,
        metadata: EventMetadata,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            event_type: event.event_type().to_owned(),
            schema_version: event.schema_version(),
            payload: event.to_payload()?,
            metadata,
        })
    }

    /// Turns this record into a [`StoredEvent`] at `version`, minting a
    /// time-ordered event identifier.
    #[must_use]
    pub fn into_stored(self, aggregate_id: Uuid, version: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            event_type: self.event_type,
            schema_version: self.schema_version,
            payload: self.payload,
            version,
            metadata: self.metadata,
        }
    }
}

/// Stored representation of a domain event. Never mutated once written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique event identifier, assigned at append time.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Payload schema version, independent of the aggregate version.
    pub schema_version: i32,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Version within the aggregate stream: 1-based and gap-free.
    pub version: i64,
    /// Correlation/causation identifiers and occurrence time.
    pub metadata: EventMetadata,
}

impl StoredEvent {
    /// Decodes the payload through `registry`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be decoded.
    pub fn decode<E: 'static>(&self, registry: &EventRegistry<E>) -> Result<E, DomainError> {
        registry.decode(&self.event_type, self.schema_version, &self.payload)
    }
}

/// Outcome of a successful append.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendResult {
    /// Highest version stored for the aggregate after the append.
    pub version: i64,
    /// The events exactly as persisted, in version order.
    pub events: Vec<StoredEvent>,
}

/// Append-only log of events per aggregate.
///
/// Implementations must make the expected-version comparison and the insert
/// atomic with respect to other writers on the same aggregate, and must not
/// serialize writers of different aggregates behind one lock.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` with consecutive versions starting at
    /// `expected_version + 1`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if `expected_version` is not
    /// the highest stored version at commit time; nothing is written in that
    /// case. Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<AppendResult, DomainError>;

    /// Loads the events with `version > from_version`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Returns the highest stored version, 0 if the aggregate was never
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError>;

    /// Returns every aggregate with at least one event, in order of first
    /// append.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on I/O failure.
    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError>;
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_into_stored_keeps_payload_and_assigns_version() {
        // Arrange
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let new_event = NewEvent {
            event_type: "tank.renamed".to_owned(),
            schema_version: 1,
            payload: json!({ "name": "Nursery" }),
            metadata: EventMetadata::for_command(correlation_id, at),
        };

        // Act
        let stored = new_event.clone().into_stored(aggregate_id, 4);

        // Assert
        assert_eq!(stored.aggregate_id, aggregate_id);
        assert_eq!(stored.version, 4);
        assert_eq!(stored.event_type, new_event.event_type);
        assert_eq!(stored.payload, new_event.payload);
        assert_eq!(stored.metadata.causation_id, correlation_id);
        assert_eq!(stored.metadata.occurred_at, at);
    }

    #[test]
    fn test_into_stored_mints_distinct_ids() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let new_event = NewEvent {
            event_type: "tank.renamed".to_owned(),
            schema_version: 1,
            payload: json!({}),
            metadata: EventMetadata::for_command(Uuid::new_v4(), at),
        };
        let aggregate_id = Uuid::new_v4();

        let first = new_event.clone().into_stored(aggregate_id, 1);
        let second = new_event.into_stored(aggregate_id, 2);

        assert_ne!(first.event_id, second.event_id);
    }
}
