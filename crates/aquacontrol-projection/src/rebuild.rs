//! Read model rebuilds by replaying the event log.

use aquacontrol_core::error::DomainError;
use tracing::info;

use crate::dispatcher::{DispatchOutcome, ProjectionDispatcher};

/// Totals of a rebuild run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Rows removed before replaying.
    pub cleared: u64,
    /// Aggregates replayed.
    pub aggregates: usize,
    /// Events read from the event store.
    pub events: usize,
    /// Deliveries that changed a row.
    pub applied: usize,
    /// Deliveries that found the row already up to date.
    pub duplicates: usize,
    /// Deliveries that were dead-lettered.
    pub dead_lettered: usize,
}

impl RebuildReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        self.applied += outcome.applied();
        self.duplicates += outcome.duplicates();
        self.dead_lettered += outcome.dead_lettered();
    }
}

impl ProjectionDispatcher {
    /// Replays every stream, in order of first append, through every
    /// projection. Existing rows are kept; deliveries they already reflect
    /// are skipped as duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the event store cannot be read.
    pub async fn rebuild_all(&self) -> Result<RebuildReport, DomainError> {
        let mut report = RebuildReport::default();
        for aggregate_id in self.event_store().aggregate_ids().await? {
            let events = self.event_store().read(aggregate_id, 0).await?;
            report.aggregates += 1;
            report.events += events.len();
            for event in &events {
                let outcome = self.dispatch(event).await;
                report.record(&outcome);
            }
        }
        info!(
            aggregates = report.aggregates,
            events = report.events,
            applied = report.applied,
            dead_lettered = report.dead_lettered,
            "rebuilt all projections"
        );
        Ok(report)
    }

    /// Clears the rows of one projection and replays every stream into it
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the projection is unknown, and an
    /// error if the read model or event store fails.
    pub async fn rebuild_projection(&self, projection: &str) -> Result<RebuildReport, DomainError> {
        let name = self.projection(projection)?.name();
        let mut report = RebuildReport {
            cleared: self.read_model_store().clear(name).await?,
            ..RebuildReport::default()
        };
        for aggregate_id in self.event_store().aggregate_ids().await? {
            let events = self.event_store().read(aggregate_id, 0).await?;
            report.aggregates += 1;
            report.events += events.len();
            for event in &events {
                let Some(delivery) = self.dispatch_to(name, event).await? else {
                    continue;
                };
                report.record(&DispatchOutcome {
                    deliveries: vec![(name, delivery)],
                });
            }
        }
        info!(
            projection = name,
            cleared = report.cleared,
            aggregates = report.aggregates,
            events = report.events,
            applied = report.applied,
            dead_lettered = report.dead_lettered,
            "rebuilt projection"
        );
        Ok(report)
    }
}
