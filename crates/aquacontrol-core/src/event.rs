//! Domain event abstractions and the event type registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Metadata attached to every stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// Wall-clock time the event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Metadata for an event caused directly by a command, where correlation
    /// and causation coincide.
    #[must_use]
    pub fn for_command(correlation_id: Uuid, occurred_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            causation_id: correlation_id,
            occurred_at,
        }
    }
}

/// Trait that all domain events implement.
///
/// A domain event is usually an enum with one variant per concrete event
/// shape. The variant's discriminator is exposed as [`event_type`], and its
/// payload is serialized without the enum tag so the stored discriminator is
/// the single source of truth. Decoding goes back through an
/// [`EventRegistry`].
///
/// [`event_type`]: DomainEvent::event_type
pub trait DomainEvent: Send + Sync + fmt::Debug + Clone {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Returns the payload schema version this event serializes as.
    fn schema_version(&self) -> i32;

    /// Serializes the variant payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be encoded.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;
}

type Decoder<E> = Box<dyn Fn(serde_json::Value) -> Result<E, serde_json::Error> + Send + Sync>;
type Upcaster = Box<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>;

struct Registration<E> {
    schema_version: i32,
    decoder: Decoder<E>,
    upcasters: BTreeMap<i32, Upcaster>,
}

/// Maps stored `event_type` discriminators to decoders for a domain event
/// enum `E`.
///
/// Each event type is registered with its current payload schema version.
/// Payloads persisted under an older schema version are passed through the
/// registered upcasters, one version step at a time, before decoding.
pub struct EventRegistry<E> {
    registrations: HashMap<&'static str, Registration<E>>,
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.registrations.keys().collect();
        types.sort();
        f.debug_struct("EventRegistry")
            .field("event_types", &types)
            .finish()
    }
}

impl<E: 'static> EventRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `event_type` at `schema_version`, decoding its payload as
    /// `P` and wrapping it into the event enum with `wrap`.
    #[must_use]
    pub fn register<P, F>(mut self, event_type: &'static str, schema_version: i32, wrap: F) -> Self
    where
        P: DeserializeOwned + 'static,
        F: Fn(P) -> E + Send + Sync + 'static,
    {
        let decoder: Decoder<E> =
            Box::new(move |value| serde_json::from_value::<P>(value).map(&wrap));
        self.registrations.insert(
            event_type,
            Registration {
                schema_version,
                decoder,
                upcasters: BTreeMap::new(),
            },
        );
        self
    }

    /// Registers a transformation lifting an `event_type` payload from
    /// `from_version` to `from_version + 1`.
    ///
    /// # Panics
    ///
    /// Panics if `event_type` has not been registered first.
    #[must_use]
    pub fn upcast<F>(mut self, event_type: &'static str, from_version: i32, upcaster: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        let registration = self
            .registrations
            .get_mut(event_type)
            .unwrap_or_else(|| panic!("upcaster registered for unknown event type {event_type}"));
        registration
            .upcasters
            .insert(from_version, Box::new(upcaster));
        self
    }

    /// Returns `true` if `event_type` has a decoder.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.registrations.contains_key(event_type)
    }

    /// Decodes a stored payload into the event enum.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event type is unknown, the
    /// payload was written by a newer schema than registered, an upcaster is
    /// missing for an intermediate version, or the payload does not match
    /// the registered shape.
    pub fn decode(
        &self,
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<E, DomainError> {
        let registration = self.registrations.get(event_type).ok_or_else(|| {
            DomainError::Serialization(format!("unknown event type {event_type}"))
        })?;

        if schema_version > registration.schema_version {
            return Err(DomainError::Serialization(format!(
                "{event_type} payload has schema version {schema_version}, newest known is {}",
                registration.schema_version
            )));
        }

        let mut value = payload.clone();
        for version in schema_version..registration.schema_version {
            let upcaster = registration.upcasters.get(&version).ok_or_else(|| {
                DomainError::Serialization(format!(
                    "no upcaster for {event_type} from schema version {version}"
                ))
            })?;
            value = upcaster(value);
        }

        (registration.decoder)(value).map_err(|e| {
            DomainError::Serialization(format!("{event_type} payload decode failed: {e}"))
        })
    }
}
