//! Read-model projections over the tank event stream.
//!
//! `tank_summary` keeps the descriptive state of every tank.
//! `tank_water_quality` keeps the latest trusted reading per sensor and the
//! derived stress flags.

use std::collections::BTreeMap;
use std::fmt;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event::EventRegistry;
use aquacontrol_core::event_store::StoredEvent;
use aquacontrol_projection::{Projection, ProjectionDispatcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::TankStatus;
use crate::domain::events::{
    ReadingRecorded, SensorKind, TANK_CAPACITY_CHANGED, TANK_CREATED, TANK_DECOMMISSIONED,
    TANK_READING_RECORDED, TANK_RENAMED, TankEvent, tank_event_registry,
};

/// Readings below this quality score are counted but never trusted.
pub const MIN_QUALITY_SCORE: f64 = 0.7;
/// pH below this value stresses the stock.
pub const PH_LOW: f64 = 6.5;
/// pH above this value stresses the stock.
pub const PH_HIGH: f64 = 8.5;
/// Dissolved oxygen (mg/L) below this value is depleted.
pub const OXYGEN_DEPLETED: f64 = 4.0;
/// Dissolved oxygen (mg/L) below this value is critical.
pub const OXYGEN_CRITICAL: f64 = 2.0;

/// Registers every tank projection on `dispatcher`.
#[must_use]
pub fn register_tank_projections(dispatcher: ProjectionDispatcher) -> ProjectionDispatcher {
    dispatcher
        .register(TankSummaryProjection::new())
        .register(WaterQualityProjection::new())
}

/// Row of the `tank_summary` projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankSummaryRow {
    /// Display name.
    pub name: String,
    /// Usable volume in liters.
    pub capacity_liters: f64,
    /// Building the tank stands in.
    pub building: String,
    /// Room within the building.
    pub room: String,
    /// Lifecycle status.
    pub status: TankStatus,
    /// Readings recorded, trusted or not.
    pub reading_count: u64,
    /// Measurement time of the newest reading.
    pub last_reading_at: Option<DateTime<Utc>>,
}

/// Projects descriptive tank state.
pub struct TankSummaryProjection {
    registry: EventRegistry<TankEvent>,
}

impl TankSummaryProjection {
    /// Name of the read model this projection writes.
    pub const NAME: &'static str = "tank_summary";

    /// Creates the projection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: tank_event_registry(),
        }
    }
}

impl Default for TankSummaryProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TankSummaryProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TankSummaryProjection").finish_non_exhaustive()
    }
}

impl Projection for TankSummaryProjection {
    type Row = TankSummaryRow;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            TANK_CREATED,
            TANK_RENAMED,
            TANK_CAPACITY_CHANGED,
            TANK_READING_RECORDED,
            TANK_DECOMMISSIONED,
        ]
    }

    fn apply(&self, row: &mut TankSummaryRow, event: &StoredEvent) -> Result<(), DomainError> {
        match event.decode(&self.registry)? {
            TankEvent::Created(created) => {
                row.name = created.name;
                row.capacity_liters = created.capacity_liters;
                row.building = created.location.building;
                row.room = created.location.room;
            }
            TankEvent::Renamed(renamed) => row.name = renamed.name,
            TankEvent::CapacityChanged(changed) => row.capacity_liters = changed.capacity_liters,
            TankEvent::ReadingRecorded(reading) => {
                row.reading_count += 1;
                if row.last_reading_at.is_none_or(|at| reading.measured_at > at) {
                    row.last_reading_at = Some(reading.measured_at);
                }
            }
            TankEvent::Decommissioned(_) => row.status = TankStatus::Decommissioned,
        }
        Ok(())
    }
}

/// Dissolved oxygen classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OxygenStatus {
    /// No trusted reading yet, or at least [`OXYGEN_DEPLETED`].
    #[default]
    Normal,
    /// Below [`OXYGEN_DEPLETED`].
    Depleted,
    /// Below [`OXYGEN_CRITICAL`].
    Critical,
}

impl OxygenStatus {
    /// Classifies a dissolved oxygen reading in mg/L.
    #[must_use]
    pub fn classify(mg_per_liter: f64) -> Self {
        if mg_per_liter < OXYGEN_CRITICAL {
            Self::Critical
        } else if mg_per_liter < OXYGEN_DEPLETED {
            Self::Depleted
        } else {
            Self::Normal
        }
    }
}

/// Row of the `tank_water_quality` projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityRow {
    /// Latest trusted value per sensor kind.
    pub latest: BTreeMap<SensorKind, f64>,
    /// Whether the latest trusted pH is outside `[PH_LOW, PH_HIGH]`.
    pub ph_stress: bool,
    /// Classification of the latest trusted dissolved oxygen reading.
    pub oxygen: OxygenStatus,
    /// Readings ignored for a quality score below [`MIN_QUALITY_SCORE`].
    pub low_quality_readings: u64,
}

impl WaterQualityRow {
    /// Returns `true` if any derived flag calls for an operator.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.ph_stress || self.oxygen != OxygenStatus::Normal
    }

    fn record(&mut self, reading: &ReadingRecorded) {
        if reading.quality_score < MIN_QUALITY_SCORE {
            self.low_quality_readings += 1;
            return;
        }
        self.latest.insert(reading.sensor, reading.value);
        match reading.sensor {
            SensorKind::Ph => self.ph_stress = !(PH_LOW..=PH_HIGH).contains(&reading.value),
            SensorKind::DissolvedOxygen => self.oxygen = OxygenStatus::classify(reading.value),
            SensorKind::Temperature | SensorKind::Salinity => {}
        }
    }
}

/// Projects sensor readings into water-quality state.
pub struct WaterQualityProjection {
    registry: EventRegistry<TankEvent>,
}

impl WaterQualityProjection {
    /// Name of the read model this projection writes.
    pub const NAME: &'static str = "tank_water_quality";

    /// Creates the projection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: tank_event_registry(),
        }
    }
}

impl Default for WaterQualityProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaterQualityProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaterQualityProjection").finish_non_exhaustive()
    }
}

impl Projection for WaterQualityProjection {
    type Row = WaterQualityRow;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[TANK_READING_RECORDED]
    }

    fn apply(&self, row: &mut WaterQualityRow, event: &StoredEvent) -> Result<(), DomainError> {
        match event.decode(&self.registry)? {
            TankEvent::ReadingRecorded(reading) => {
                row.record(&reading);
                Ok(())
            }
            other => Err(DomainError::ProjectionFailure {
                projection: Self::NAME.to_owned(),
                event_id: event.event_id,
                reason: format!("unexpected event {other:?}"),
            }),
        }
    }
}
