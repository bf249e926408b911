//! `PostgreSQL` implementation of the `SnapshotStore` trait.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::snapshot::{Snapshot, SnapshotStore};

use crate::pg_error::map_sqlx_error;

// The WHERE clause keeps a late, older snapshot from overwriting a newer one.
const UPSERT_SNAPSHOT: &str = r"
INSERT INTO aggregate_snapshots (aggregate_id, aggregate_type, payload, version, taken_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (aggregate_id) DO UPDATE
SET aggregate_type = EXCLUDED.aggregate_type,
    payload = EXCLUDED.payload,
    version = EXCLUDED.version,
    taken_at = EXCLUDED.taken_at
WHERE aggregate_snapshots.version <= EXCLUDED.version
";

const SELECT_SNAPSHOT: &str = r"
SELECT aggregate_id, aggregate_type, payload, version, taken_at
FROM aggregate_snapshots
WHERE aggregate_id = $1
";

/// PostgreSQL-backed snapshot store, one row per aggregate.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    /// Creates a new `PgSnapshotStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        sqlx::query(UPSERT_SNAPSHOT)
            .bind(snapshot.aggregate_id)
            .bind(&snapshot.aggregate_type)
            .bind(&snapshot.payload)
            .bind(snapshot.version)
            .bind(snapshot.taken_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, DomainError> {
        let row = sqlx::query(SELECT_SNAPSHOT)
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| -> Result<Snapshot, sqlx::Error> {
            Ok(Snapshot {
                aggregate_id: row.try_get("aggregate_id")?,
                aggregate_type: row.try_get("aggregate_type")?,
                payload: row.try_get("payload")?,
                version: row.try_get("version")?,
                taken_at: row.try_get("taken_at")?,
            })
        })
        .transpose()
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, aggregate_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM aggregate_snapshots WHERE aggregate_id = $1")
            .bind(aggregate_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
