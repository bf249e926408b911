//! Commands for the Tank monitoring context.

use aquacontrol_core::command::Command;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::events::{SensorKind, TankLocation};

/// Command to commission a new tank.
#[derive(Debug, Clone)]
pub struct CreateTank {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Identifier chosen by the caller for the new tank.
    pub tank_id: Uuid,
    /// Display name.
    pub name: String,
    /// Usable volume in liters.
    pub capacity_liters: f64,
    /// Installation site.
    pub location: TankLocation,
}

/// Command to rename a tank.
#[derive(Debug, Clone)]
pub struct RenameTank {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tank identifier.
    pub tank_id: Uuid,
    /// The new name.
    pub name: String,
}

/// Command to change a tank's usable volume.
#[derive(Debug, Clone)]
pub struct ChangeCapacity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tank identifier.
    pub tank_id: Uuid,
    /// The new volume in liters.
    pub capacity_liters: f64,
}

/// Command to record one sensor reading against a tank.
#[derive(Debug, Clone)]
pub struct RecordReading {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tank identifier.
    pub tank_id: Uuid,
    /// The sensor that produced the reading.
    pub sensor_id: Uuid,
    /// What the sensor measures.
    pub sensor: SensorKind,
    /// Measured value.
    pub value: f64,
    /// Sensor-reported confidence in `[0, 1]`.
    pub quality_score: f64,
    /// When the measurement was taken.
    pub measured_at: DateTime<Utc>,
}

/// Command to take a tank out of service.
#[derive(Debug, Clone)]
pub struct DecommissionTank {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tank identifier.
    pub tank_id: Uuid,
    /// Why the tank is retired.
    pub reason: String,
}

macro_rules! impl_command {
    ($command:ty, $name:literal) => {
        impl Command for $command {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn aggregate_id(&self) -> Uuid {
                self.tank_id
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
}

impl_command!(CreateTank, "tank.create");
impl_command!(RenameTank, "tank.rename");
impl_command!(ChangeCapacity, "tank.change_capacity");
impl_command!(RecordReading, "tank.record_reading");
impl_command!(DecommissionTank, "tank.decommission");
