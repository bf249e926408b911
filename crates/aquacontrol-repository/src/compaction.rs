//! Snapshot compaction: refresh snapshots that lag their streams.

use aquacontrol_core::aggregate::AggregateRoot;
use aquacontrol_core::error::DomainError;
use tracing::{info, warn};

use crate::repository::AggregateRepository;

/// Outcome of one [`compact_snapshots`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Aggregates inspected.
    pub examined: usize,
    /// Fresh snapshots written.
    pub written: usize,
    /// Aggregates whose snapshot was recent enough.
    pub up_to_date: usize,
    /// Aggregates that could not be rebuilt or snapshotted.
    pub failed: usize,
}

/// Walks every aggregate in the event store and writes a fresh snapshot
/// where the stored one lags the stream by at least the policy interval.
///
/// The event store is only read. A failure on one aggregate is logged and
/// counted; the pass continues.
///
/// # Errors
///
/// Returns an error only if the list of aggregates cannot be read.
pub async fn compact_snapshots<A: AggregateRoot>(
    repository: &AggregateRepository<A>,
) -> Result<CompactionReport, DomainError> {
    let policy = repository.config().snapshot_policy;
    let mut report = CompactionReport::default();

    for aggregate_id in repository.event_store().aggregate_ids().await? {
        report.examined += 1;

        let current = match repository.event_store().current_version(aggregate_id).await {
            Ok(version) => version,
            Err(err) => {
                warn!(aggregate_id = %aggregate_id, error = %err, "compaction skipped aggregate");
                report.failed += 1;
                continue;
            }
        };
        let snapshot_version = match repository.snapshot_store().load(aggregate_id).await {
            Ok(snapshot) => snapshot.map_or(0, |s| s.version),
            Err(err) => {
                warn!(aggregate_id = %aggregate_id, error = %err, "snapshot load failed");
                0
            }
        };
        if !policy.is_stale(snapshot_version, current) {
            report.up_to_date += 1;
            continue;
        }

        let outcome = match repository.replay(aggregate_id).await {
            Ok(aggregate) => repository.write_snapshot(&aggregate).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => report.written += 1,
            Err(err) => {
                warn!(
                    aggregate_id = %aggregate_id,
                    error = %err,
                    "compaction failed for aggregate"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        aggregate_type = A::AGGREGATE_TYPE,
        examined = report.examined,
        written = report.written,
        up_to_date = report.up_to_date,
        failed = report.failed,
        "snapshot compaction finished"
    );
    Ok(report)
}
