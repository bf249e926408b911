//! Builder for hand-made `StoredEvent`s.

use aquacontrol_core::event::EventMetadata;
use aquacontrol_core::event_store::StoredEvent;
use uuid::Uuid;

use crate::clock::fixed_time;

/// Builds a `StoredEvent` without going through a store, for feeding
/// projections and dispatchers directly.
#[derive(Debug, Clone)]
pub struct StoredEventBuilder {
    event: StoredEvent,
}

impl StoredEventBuilder {
    /// Starts an event of `event_type` at `version` with an empty object
    /// payload.
    #[must_use]
    pub fn new(aggregate_id: Uuid, event_type: &str, version: i64) -> Self {
        Self {
            event: StoredEvent {
                event_id: Uuid::new_v4(),
                aggregate_id,
                event_type: event_type.to_owned(),
                schema_version: 1,
                payload: serde_json::json!({}),
                version,
                metadata: EventMetadata::for_command(Uuid::new_v4(), fixed_time()),
            },
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.event.payload = payload;
        self
    }

    /// Sets the payload schema version.
    #[must_use]
    pub fn schema_version(mut self, schema_version: i32) -> Self {
        self.event.schema_version = schema_version;
        self
    }

    /// Returns the built event.
    #[must_use]
    pub fn build(self) -> StoredEvent {
        self.event
    }
}
