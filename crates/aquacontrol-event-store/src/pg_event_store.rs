//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::SubsecRound;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event::EventMetadata;
use aquacontrol_core::event_store::{AppendResult, EventStore, NewEvent, StoredEvent};

use crate::pg_error::{is_unique_violation, map_sqlx_error};

const CURRENT_VERSION: &str =
    "SELECT COALESCE(MAX(version), 0) FROM domain_events WHERE aggregate_id = $1";

const INSERT_EVENT: &str = r"
INSERT INTO domain_events (
    event_id, aggregate_id, event_type, schema_version, payload,
    version, correlation_id, causation_id, occurred_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
";

const SELECT_EVENTS: &str = r"
SELECT event_id, aggregate_id, event_type, schema_version, payload,
       version, correlation_id, causation_id, occurred_at
FROM domain_events
WHERE aggregate_id = $1 AND version > $2
ORDER BY version ASC
";

const SELECT_AGGREGATE_IDS: &str = r"
SELECT aggregate_id
FROM domain_events
GROUP BY aggregate_id
ORDER BY MIN(position) ASC
";

/// PostgreSQL-backed event store.
///
/// The version check and the inserts of one append run in a single
/// transaction. Two writers that both pass the check race on the
/// `UNIQUE (aggregate_id, version)` constraint; the loser's insert fails with
/// a unique violation, which is reported as a concurrency conflict and rolls
/// back its whole batch.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conflict(&self, aggregate_id: Uuid, expected: i64) -> DomainError {
        let actual = match self.current_version(aggregate_id).await {
            Ok(version) => version,
            Err(err) => return err,
        };
        DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }
    }
}

fn event_from_row(row: &PgRow) -> Result<StoredEvent, sqlx::Error> {
    Ok(StoredEvent {
        event_id: row.try_get("event_id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        event_type: row.try_get("event_type")?,
        schema_version: row.try_get("schema_version")?,
        payload: row.try_get("payload")?,
        version: row.try_get("version")?,
        metadata: EventMetadata {
            correlation_id: row.try_get("correlation_id")?,
            causation_id: row.try_get("causation_id")?,
            occurred_at: row.try_get("occurred_at")?,
        },
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<AppendResult, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let actual: i64 = sqlx::query_scalar(CURRENT_VERSION)
            .bind(aggregate_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if actual != expected_version {
            debug!(
                aggregate_id = %aggregate_id,
                expected = expected_version,
                actual,
                "rejected append on stale expected version"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        if events.is_empty() {
            return Ok(AppendResult {
                version: actual,
                events: Vec::new(),
            });
        }

        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(expected_version + 1..)
            .map(|(event, version)| {
                let mut stored = event.into_stored(aggregate_id, version);
                // TIMESTAMPTZ keeps microseconds.
                stored.metadata.occurred_at = stored.metadata.occurred_at.trunc_subsecs(6);
                stored
            })
            .collect();

        for event in &stored {
            let inserted = sqlx::query(INSERT_EVENT)
                .bind(event.event_id)
                .bind(event.aggregate_id)
                .bind(&event.event_type)
                .bind(event.schema_version)
                .bind(&event.payload)
                .bind(event.version)
                .bind(event.metadata.correlation_id)
                .bind(event.metadata.causation_id)
                .bind(event.metadata.occurred_at)
                .execute(&mut *tx)
                .await;

            if let Err(err) = inserted {
                if is_unique_violation(&err) {
                    drop(tx);
                    debug!(
                        aggregate_id = %aggregate_id,
                        expected = expected_version,
                        "lost append race on unique version constraint"
                    );
                    return Err(self.conflict(aggregate_id, expected_version).await);
                }
                return Err(map_sqlx_error(err));
            }
        }

        if let Err(err) = tx.commit().await {
            if is_unique_violation(&err) {
                return Err(self.conflict(aggregate_id, expected_version).await);
            }
            return Err(map_sqlx_error(err));
        }

        let version = expected_version + i64::try_from(stored.len()).unwrap_or(i64::MAX);
        info!(
            aggregate_id = %aggregate_id,
            new_version = version,
            event_count = stored.len(),
            "appended events"
        );

        Ok(AppendResult {
            version,
            events: stored,
        })
    }

    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query(SELECT_EVENTS)
            .bind(aggregate_id)
            .bind(from_version)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let events = rows
            .iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)?;

        debug!(
            aggregate_id = %aggregate_id,
            from_version,
            event_count = events.len(),
            "loaded events"
        );
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar(CURRENT_VERSION)
            .bind(aggregate_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        sqlx::query_scalar(SELECT_AGGREGATE_IDS)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}
