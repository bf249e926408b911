//! Domain events for the Tank monitoring context.

use std::fmt;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event::{DomainEvent, EventRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type of [`TankCreated`].
pub const TANK_CREATED: &str = "tank.created";
/// Event type of [`TankRenamed`].
pub const TANK_RENAMED: &str = "tank.renamed";
/// Event type of [`CapacityChanged`].
pub const TANK_CAPACITY_CHANGED: &str = "tank.capacity_changed";
/// Event type of [`ReadingRecorded`].
pub const TANK_READING_RECORDED: &str = "tank.reading_recorded";
/// Event type of [`TankDecommissioned`].
pub const TANK_DECOMMISSIONED: &str = "tank.decommissioned";

/// Where a tank is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankLocation {
    /// Building name.
    pub building: String,
    /// Room within the building.
    pub room: String,
}

/// Kind of water-quality sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Water temperature in °C.
    Temperature,
    /// Acidity.
    Ph,
    /// Dissolved oxygen in mg/L.
    DissolvedOxygen,
    /// Salinity in ppt.
    Salinity,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "temperature",
            Self::Ph => "ph",
            Self::DissolvedOxygen => "dissolved_oxygen",
            Self::Salinity => "salinity",
        };
        f.write_str(name)
    }
}

/// Emitted when a tank is commissioned. Schema version 2; version 1
/// payloads carried `capacity` and no location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankCreated {
    /// Display name.
    pub name: String,
    /// Usable volume in liters.
    pub capacity_liters: f64,
    /// Installation site.
    #[serde(default)]
    pub location: TankLocation,
}

/// Emitted when a tank is renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankRenamed {
    /// The new name.
    pub name: String,
}

/// Emitted when a tank's usable volume changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityChanged {
    /// The new volume in liters.
    pub capacity_liters: f64,
}

/// Emitted for every sensor reading accepted for a tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecorded {
    /// The sensor that produced the reading.
    pub sensor_id: Uuid,
    /// What the sensor measures.
    pub sensor: SensorKind,
    /// Measured value.
    pub value: f64,
    /// Sensor-reported confidence in `[0, 1]`.
    pub quality_score: f64,
    /// When the sensor took the measurement.
    pub measured_at: DateTime<Utc>,
}

/// Tombstone: the tank is out of service and accepts no further commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankDecommissioned {
    /// Operator-supplied reason.
    pub reason: String,
}

/// Events of the `Tank` aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum TankEvent {
    /// A tank was created.
    Created(TankCreated),
    /// A tank was renamed.
    Renamed(TankRenamed),
    /// A tank's capacity changed.
    CapacityChanged(CapacityChanged),
    /// A sensor reading was recorded.
    ReadingRecorded(ReadingRecorded),
    /// A tank was decommissioned.
    Decommissioned(TankDecommissioned),
}

impl DomainEvent for TankEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => TANK_CREATED,
            Self::Renamed(_) => TANK_RENAMED,
            Self::CapacityChanged(_) => TANK_CAPACITY_CHANGED,
            Self::ReadingRecorded(_) => TANK_READING_RECORDED,
            Self::Decommissioned(_) => TANK_DECOMMISSIONED,
        }
    }

    fn schema_version(&self) -> i32 {
        match self {
            Self::Created(_) => 2,
            _ => 1,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        let payload = match self {
            Self::Created(p) => serde_json::to_value(p)?,
            Self::Renamed(p) => serde_json::to_value(p)?,
            Self::CapacityChanged(p) => serde_json::to_value(p)?,
            Self::ReadingRecorded(p) => serde_json::to_value(p)?,
            Self::Decommissioned(p) => serde_json::to_value(p)?,
        };
        Ok(payload)
    }
}

/// `tank.created` v1 → v2: `capacity` becomes `capacity_liters` and an
/// empty location is added.
fn upcast_tank_created_v1(mut payload: serde_json::Value) -> serde_json::Value {
    if let Some(fields) = payload.as_object_mut() {
        if let Some(capacity) = fields.remove("capacity") {
            fields.insert("capacity_liters".to_owned(), capacity);
        }
        fields
            .entry("location")
            .or_insert_with(|| serde_json::json!({ "building": "", "room": "" }));
    }
    payload
}

/// Builds the registry decoding every stored tank event, old schema
/// versions included.
#[must_use]
pub fn tank_event_registry() -> EventRegistry<TankEvent> {
    EventRegistry::new()
        .register(TANK_CREATED, 2, TankEvent::Created)
        .upcast(TANK_CREATED, 1, upcast_tank_created_v1)
        .register(TANK_RENAMED, 1, TankEvent::Renamed)
        .register(TANK_CAPACITY_CHANGED, 1, TankEvent::CapacityChanged)
        .register(TANK_READING_RECORDED, 1, TankEvent::ReadingRecorded)
        .register(TANK_DECOMMISSIONED, 1, TankEvent::Decommissioned)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_types_and_payloads_carry_no_enum_tag() {
        let event = TankEvent::Renamed(TankRenamed {
            name: "Quarantine B".to_owned(),
        });

        assert_eq!(event.event_type(), "tank.renamed");
        assert_eq!(event.schema_version(), 1);
        assert_eq!(event.to_payload().unwrap(), json!({ "name": "Quarantine B" }));
    }

    #[test]
    fn test_registry_decodes_current_created_payload() {
        let payload = json!({
            "name": "Hatchery 1",
            "capacity_liters": 1200.0,
            "location": { "building": "North", "room": "H1" }
        });

        let event = tank_event_registry().decode(TANK_CREATED, 2, &payload).unwrap();

        assert_eq!(
            event,
            TankEvent::Created(TankCreated {
                name: "Hatchery 1".to_owned(),
                capacity_liters: 1200.0,
                location: TankLocation {
                    building: "North".to_owned(),
                    room: "H1".to_owned(),
                },
            })
        );
    }

    #[test]
    fn test_registry_upcasts_v1_created_payload() {
        let legacy = json!({ "name": "Legacy", "capacity": 300.0 });

        let event = tank_event_registry().decode(TANK_CREATED, 1, &legacy).unwrap();

        match event {
            TankEvent::Created(created) => {
                assert_eq!(created.name, "Legacy");
                assert!((created.capacity_liters - 300.0).abs() < f64::EPSILON);
                assert_eq!(created.location, TankLocation::default());
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn test_sensor_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SensorKind::DissolvedOxygen).unwrap(),
            json!("dissolved_oxygen")
        );
        assert_eq!(SensorKind::Ph.to_string(), "ph");
    }
}
