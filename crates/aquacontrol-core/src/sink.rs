//! Destination for committed events.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event_store::StoredEvent;

/// Receives events after they are durably appended.
///
/// The repository hands every committed batch to an injected sink instead of
/// a global bus. A sink failure never undoes the append.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes a committed batch, in version order.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be handed off; the events stay
    /// stored regardless.
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError>;
}
