//! Test sinks — mock `EventSink` implementations for tests.

use std::sync::Mutex;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::StoredEvent;
use aquacontrol_core::sink::EventSink;
use async_trait::async_trait;

/// An event sink that records every published batch and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    batches: Mutex<Vec<Vec<StoredEvent>>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every batch published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batches(&self) -> Vec<Vec<StoredEvent>> {
        self.batches.lock().unwrap().clone()
    }

    /// Returns every published event, flattened in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

/// An event sink that rejects every batch.
#[derive(Debug)]
pub struct FailingEventSink;

#[async_trait]
impl EventSink for FailingEventSink {
    async fn publish(&self, _events: &[StoredEvent]) -> Result<(), DomainError> {
        Err(DomainError::StorageUnavailable("dispatcher queue closed".into()))
    }
}

/// An event sink whose `publish` never completes.
#[derive(Debug)]
pub struct HangingEventSink;

#[async_trait]
impl EventSink for HangingEventSink {
    async fn publish(&self, _events: &[StoredEvent]) -> Result<(), DomainError> {
        std::future::pending().await
    }
}
