//! The projection capability and its type-erased form.

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::StoredEvent;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A fold from one aggregate's events into one read model row.
///
/// `apply` must be deterministic and depend only on the row and the event;
/// the dispatcher relies on that to make redelivery and rebuilds converge
/// on the same row.
pub trait Projection: Send + Sync + 'static {
    /// Row state stored as JSON in the read model store. `Default` is the
    /// state of a row that does not exist yet.
    type Row: Serialize + DeserializeOwned + Default + Send;

    /// Stable projection name, used as the read model key.
    fn name(&self) -> &'static str;

    /// Event types this projection is routed.
    fn event_types(&self) -> &'static [&'static str];

    /// Folds `event` into `row`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event payload cannot be
    /// decoded, or any other error the handler wants to surface; the
    /// dispatcher retries transient ones and dead-letters the event.
    fn apply(&self, row: &mut Self::Row, event: &StoredEvent) -> Result<(), DomainError>;
}

/// Object-safe view of a [`Projection`] working on JSON row state.
pub(crate) trait ErasedProjection: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self, event_type: &str) -> bool;

    fn apply_json(
        &self,
        state: Option<serde_json::Value>,
        event: &StoredEvent,
    ) -> Result<serde_json::Value, DomainError>;
}

impl<P: Projection> ErasedProjection for P {
    fn name(&self) -> &'static str {
        Projection::name(self)
    }

    fn handles(&self, event_type: &str) -> bool {
        Projection::event_types(self).contains(&event_type)
    }

    fn apply_json(
        &self,
        state: Option<serde_json::Value>,
        event: &StoredEvent,
    ) -> Result<serde_json::Value, DomainError> {
        let mut row: P::Row = match state {
            Some(value) => serde_json::from_value(value)?,
            None => P::Row::default(),
        };
        self.apply(&mut row, event).map_err(|err| match err {
            DomainError::Serialization(_) | DomainError::ProjectionFailure { .. } => err,
            other => DomainError::ProjectionFailure {
                projection: Projection::name(self).to_owned(),
                event_id: event.event_id,
                reason: other.to_string(),
            },
        })?;
        Ok(serde_json::to_value(row)?)
    }
}
