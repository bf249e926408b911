//! Wiring of stores, the tank repository and the projection dispatcher.

use std::sync::Arc;

use aquacontrol_core::clock::{Clock, SystemClock};
use aquacontrol_core::event_store::EventStore;
use aquacontrol_core::read_model::ReadModelStore;
use aquacontrol_core::snapshot::{SnapshotPolicy, SnapshotStore};
use aquacontrol_event_store::{PgEventStore, PgReadModelStore, PgSnapshotStore};
use aquacontrol_projection::{ProjectionDispatcher, RebuildReport};
use aquacontrol_repository::{
    AggregateRepository, CompactionReport, RepositoryConfig, compact_snapshots,
};
use aquacontrol_tank::application::projections::register_tank_projections;
use aquacontrol_tank::domain::aggregates::Tank;
use aquacontrol_tank::domain::events::tank_event_registry;
use sqlx::PgPool;
use tracing::info;

use crate::config::Mode;
use crate::error::AppError;

/// Result of one projector run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    /// A rebuild ran.
    Rebuilt(RebuildReport),
    /// A compaction pass ran.
    Compacted(CompactionReport),
}

/// Everything a projector run needs, built once at startup.
#[derive(Debug)]
pub struct Engine {
    dispatcher: Arc<ProjectionDispatcher>,
    tanks: AggregateRepository<Tank>,
}

impl Engine {
    /// Builds the engine over PostgreSQL stores sharing `pool`.
    #[must_use]
    pub fn postgres(pool: &PgPool, snapshot_interval: u32) -> Self {
        Self::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(PgSnapshotStore::new(pool.clone())),
            Arc::new(PgReadModelStore::new(pool.clone())),
            Arc::new(SystemClock),
            snapshot_interval,
        )
    }

    /// Builds the engine over arbitrary stores.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        read_models: Arc<dyn ReadModelStore>,
        clock: Arc<dyn Clock>,
        snapshot_interval: u32,
    ) -> Self {
        let dispatcher = Arc::new(register_tank_projections(ProjectionDispatcher::new(
            read_models,
            Arc::clone(&events),
            Arc::clone(&clock),
        )));
        let tanks = AggregateRepository::new(
            events,
            snapshots,
            dispatcher.clone(),
            Arc::new(tank_event_registry()),
            clock,
        )
        .with_config(RepositoryConfig {
            snapshot_policy: SnapshotPolicy::EveryNEvents(snapshot_interval),
            ..RepositoryConfig::default()
        });
        Self { dispatcher, tanks }
    }

    /// Returns the projection dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<ProjectionDispatcher> {
        &self.dispatcher
    }

    /// Returns the tank repository.
    #[must_use]
    pub fn tanks(&self) -> &AggregateRepository<Tank> {
        &self.tanks
    }

    /// Runs `mode`. For a rebuild, `projection` limits the run to one
    /// projection, whose rows are cleared first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Engine` if the event log cannot be read or, for a
    /// single-projection rebuild, the projection is unknown or its rows
    /// cannot be cleared.
    pub async fn run(&self, mode: Mode, projection: Option<&str>) -> Result<RunReport, AppError> {
        info!(?mode, projection, "projector run starting");
        let report = match (mode, projection) {
            (Mode::Rebuild, Some(name)) => {
                RunReport::Rebuilt(self.dispatcher.rebuild_projection(name).await?)
            }
            (Mode::Rebuild, None) => RunReport::Rebuilt(self.dispatcher.rebuild_all().await?),
            (Mode::CompactSnapshots, _) => {
                RunReport::Compacted(compact_snapshots(&self.tanks).await?)
            }
        };
        let dead_letters = self.dispatcher.dead_letters().len();
        if dead_letters > 0 {
            info!(dead_letters, "events left in the dead letter queue");
        }
        Ok(report)
    }
}
