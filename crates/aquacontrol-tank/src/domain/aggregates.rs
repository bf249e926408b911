//! Aggregate roots for the Tank monitoring context.

use std::collections::BTreeMap;

use aquacontrol_core::aggregate::AggregateRoot;
use aquacontrol_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::{ChangeCapacity, CreateTank, DecommissionTank, RecordReading, RenameTank};
use super::events::{
    CapacityChanged, ReadingRecorded, SensorKind, TankCreated, TankDecommissioned, TankEvent,
    TankLocation, TankRenamed,
};

/// Whether a tank is in service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankStatus {
    /// In service.
    #[default]
    Active,
    /// Out of service; terminal.
    Decommissioned,
}

/// The most recent reading of one sensor kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
    /// Measured value.
    pub value: f64,
    /// Sensor-reported confidence.
    pub quality_score: f64,
    /// When it was measured.
    pub measured_at: DateTime<Utc>,
}

/// The aggregate root for a monitored tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Usable volume in liters.
    pub capacity_liters: f64,
    /// Installation site.
    pub location: TankLocation,
    /// Lifecycle status.
    pub status: TankStatus,
    /// Latest reading per sensor kind.
    pub latest_readings: BTreeMap<SensorKind, LatestReading>,
    /// Number of readings ever recorded.
    pub reading_count: u64,
}

fn require_printable(field: &str, value: &str) -> Result<(), DomainError> {
    if value.chars().any(char::is_control) {
        return Err(DomainError::Validation(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

fn require_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation("tank name must not be empty".into()));
    }
    require_printable("tank name", trimmed)?;
    Ok(trimmed.to_owned())
}

fn require_capacity(capacity_liters: f64) -> Result<f64, DomainError> {
    if !capacity_liters.is_finite() || capacity_liters <= 0.0 {
        return Err(DomainError::Validation(format!(
            "tank capacity must be a positive number of liters, got {capacity_liters}"
        )));
    }
    Ok(capacity_liters)
}

impl Tank {
    /// Returns `true` once the tank has been decommissioned.
    #[must_use]
    pub fn is_decommissioned(&self) -> bool {
        self.status == TankStatus::Decommissioned
    }

    fn require_active(&self) -> Result<(), DomainError> {
        if self.is_decommissioned() {
            return Err(DomainError::Validation(format!(
                "tank {} is decommissioned",
                self.id
            )));
        }
        Ok(())
    }

    /// Decides the events for creating this tank. `exists` is whether any
    /// event has been stored for it already.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tank already exists or the
    /// name, capacity or location are invalid.
    pub fn create(
        &self,
        exists: bool,
        command: &CreateTank,
    ) -> Result<Vec<TankEvent>, DomainError> {
        if exists {
            return Err(DomainError::Validation(format!(
                "tank {} already exists",
                self.id
            )));
        }
        require_printable("building", &command.location.building)?;
        require_printable("room", &command.location.room)?;
        Ok(vec![TankEvent::Created(TankCreated {
            name: require_name(&command.name)?,
            capacity_liters: require_capacity(command.capacity_liters)?,
            location: command.location.clone(),
        })])
    }

    /// Decides the events for renaming. Renaming to the current name
    /// produces none.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tank is decommissioned or the
    /// name is blank.
    pub fn rename(&self, command: &RenameTank) -> Result<Vec<TankEvent>, DomainError> {
        self.require_active()?;
        let name = require_name(&command.name)?;
        if name == self.name {
            return Ok(Vec::new());
        }
        Ok(vec![TankEvent::Renamed(TankRenamed { name })])
    }

    /// Decides the events for a capacity change. An unchanged capacity
    /// produces none.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tank is decommissioned or the
    /// capacity is not positive.
    #[allow(clippy::float_cmp)]
    pub fn change_capacity(&self, command: &ChangeCapacity) -> Result<Vec<TankEvent>, DomainError> {
        self.require_active()?;
        let capacity_liters = require_capacity(command.capacity_liters)?;
        if capacity_liters == self.capacity_liters {
            return Ok(Vec::new());
        }
        Ok(vec![TankEvent::CapacityChanged(CapacityChanged {
            capacity_liters,
        })])
    }

    /// Decides the events for recording a sensor reading.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tank is decommissioned, the
    /// value is not finite, or the quality score is outside `[0, 1]`.
    pub fn record_reading(&self, command: &RecordReading) -> Result<Vec<TankEvent>, DomainError> {
        self.require_active()?;
        if !command.value.is_finite() {
            return Err(DomainError::Validation(format!(
                "{} reading must be a finite number",
                command.sensor
            )));
        }
        if !(0.0..=1.0).contains(&command.quality_score) {
            return Err(DomainError::Validation(format!(
                "quality score must be within [0, 1], got {}",
                command.quality_score
            )));
        }
        Ok(vec![TankEvent::ReadingRecorded(ReadingRecorded {
            sensor_id: command.sensor_id,
            sensor: command.sensor,
            value: command.value,
            quality_score: command.quality_score,
            measured_at: command.measured_at,
        })])
    }

    /// Decides the events for decommissioning. A decommissioned tank stays
    /// decommissioned; repeating the command produces none.
    ///
    /// # Errors
    ///
    /// Never fails at present.
    pub fn decommission(&self, command: &DecommissionTank) -> Result<Vec<TankEvent>, DomainError> {
        if self.is_decommissioned() {
            return Ok(Vec::new());
        }
        Ok(vec![TankEvent::Decommissioned(TankDecommissioned {
            reason: command.reason.trim().to_owned(),
        })])
    }
}

impl AggregateRoot for Tank {
    type Event = TankEvent;
    const AGGREGATE_TYPE: &'static str = "tank";

    fn empty(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            capacity_liters: 0.0,
            location: TankLocation::default(),
            status: TankStatus::Active,
            latest_readings: BTreeMap::new(),
            reading_count: 0,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TankEvent::Created(payload) => {
                self.name.clone_from(&payload.name);
                self.capacity_liters = payload.capacity_liters;
                self.location = payload.location.clone();
            }
            TankEvent::Renamed(payload) => self.name.clone_from(&payload.name),
            TankEvent::CapacityChanged(payload) => self.capacity_liters = payload.capacity_liters,
            TankEvent::ReadingRecorded(payload) => {
                self.latest_readings.insert(
                    payload.sensor,
                    LatestReading {
                        value: payload.value,
                        quality_score: payload.quality_score,
                        measured_at: payload.measured_at,
                    },
                );
                self.reading_count += 1;
            }
            TankEvent::Decommissioned(_) => self.status = TankStatus::Decommissioned,
        }
    }
}

#[cfg(test)]
mod tests {
    use aquacontrol_core::aggregate::Versioned;
    use aquacontrol_test_support::fixed_time;

    use super::*;

    fn create_command(id: Uuid) -> CreateTank {
        CreateTank {
            correlation_id: Uuid::new_v4(),
            tank_id: id,
            name: "  Grow-out 3 ".to_owned(),
            capacity_liters: 5000.0,
            location: TankLocation {
                building: "South".to_owned(),
                room: "G3".to_owned(),
            },
        }
    }

    fn active_tank() -> Versioned<Tank> {
        let id = Uuid::new_v4();
        let mut tank = Versioned::<Tank>::new(id);
        for event in tank.aggregate().create(false, &create_command(id)).unwrap() {
            tank.apply(&event);
        }
        tank
    }

    #[test]
    fn test_create_produces_trimmed_created_event() {
        // Arrange
        let id = Uuid::new_v4();
        let tank = Tank::empty(id);

        // Act
        let events = tank.create(false, &create_command(id)).unwrap();

        // Assert
        assert_eq!(events.len(), 1);
        match &events[0] {
            TankEvent::Created(payload) => {
                assert_eq!(payload.name, "Grow-out 3");
                assert_eq!(payload.location.room, "G3");
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn test_create_rejects_existing_tank_and_bad_capacity() {
        let id = Uuid::new_v4();
        let tank = Tank::empty(id);
        let mut command = create_command(id);

        assert!(matches!(
            tank.create(true, &command),
            Err(DomainError::Validation(_))
        ));
        command.capacity_liters = -1.0;
        assert!(matches!(
            tank.create(false, &command),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_rename_to_same_name_is_a_no_op() {
        let tank = active_tank();
        let command = RenameTank {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            name: "Grow-out 3".to_owned(),
        };

        let events = tank.aggregate().rename(&command).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn test_rename_rejects_blank_name() {
        let tank = active_tank();
        let command = RenameTank {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            name: "   ".to_owned(),
        };

        let result = tank.aggregate().rename(&command);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_control_characters_are_rejected_in_names_and_locations() {
        let tank = active_tank();
        let rename = RenameTank {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            name: "Grow\u{0}out".to_owned(),
        };
        let mut create = create_command(Uuid::new_v4());
        create.location.room = "G\u{7}3".to_owned();

        assert!(matches!(
            tank.aggregate().rename(&rename),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            Tank::empty(create.tank_id).create(false, &create),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_reading_tracks_latest_per_sensor() {
        // Arrange
        let mut tank = active_tank();
        let reading = |value: f64| RecordReading {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            sensor_id: Uuid::new_v4(),
            sensor: SensorKind::Ph,
            value,
            quality_score: 0.95,
            measured_at: fixed_time(),
        };
        let first = tank.aggregate().record_reading(&reading(7.1)).unwrap();
        let second = tank.aggregate().record_reading(&reading(7.4)).unwrap();

        // Act
        for event in first.iter().chain(&second) {
            tank.apply(event);
        }

        // Assert
        assert_eq!(tank.version(), 3);
        assert_eq!(tank.aggregate().reading_count, 2);
        let latest = &tank.aggregate().latest_readings[&SensorKind::Ph];
        assert!((latest.value - 7.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_reading_rejects_out_of_range_quality() {
        let tank = active_tank();
        let command = RecordReading {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            sensor_id: Uuid::new_v4(),
            sensor: SensorKind::Salinity,
            value: 31.0,
            quality_score: 1.5,
            measured_at: fixed_time(),
        };

        let result = tank.aggregate().record_reading(&command);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_decommissioned_tank_rejects_further_changes() {
        // Arrange
        let mut tank = active_tank();
        let decommission = DecommissionTank {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            reason: "cracked acrylic".to_owned(),
        };
        for event in tank.aggregate().decommission(&decommission).unwrap() {
            tank.apply(&event);
        }

        // Act
        let rename = tank.aggregate().rename(&RenameTank {
            correlation_id: Uuid::new_v4(),
            tank_id: tank.aggregate_id(),
            name: "Reborn".to_owned(),
        });
        let again = tank.aggregate().decommission(&decommission).unwrap();

        // Assert
        assert!(tank.aggregate().is_decommissioned());
        assert!(matches!(rename, Err(DomainError::Validation(_))));
        assert!(again.is_empty());
    }
}
