//! `PostgreSQL` implementation of the `ReadModelStore` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};

use crate::pg_error::map_sqlx_error;

// A conditional upsert: concurrent or repeated deliveries can never move a
// row back to an older version.
const UPSERT_IF_NEWER: &str = r"
INSERT INTO read_models (projection, aggregate_id, version, state, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (projection, aggregate_id) DO UPDATE
SET version = EXCLUDED.version,
    state = EXCLUDED.state,
    updated_at = EXCLUDED.updated_at
WHERE read_models.version < EXCLUDED.version
";

const SELECT_ROW: &str = r"
SELECT projection, aggregate_id, version, state, updated_at
FROM read_models
WHERE projection = $1 AND aggregate_id = $2
";

const SELECT_PROJECTION: &str = r"
SELECT projection, aggregate_id, version, state, updated_at
FROM read_models
WHERE projection = $1
ORDER BY aggregate_id ASC
";

/// PostgreSQL-backed read model store sharing one `read_models` table across
/// projections.
#[derive(Debug, Clone)]
pub struct PgReadModelStore {
    pool: PgPool,
}

impl PgReadModelStore {
    /// Creates a new `PgReadModelStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_from_pg(row: &PgRow) -> Result<ReadModelRow, sqlx::Error> {
    Ok(ReadModelRow {
        projection: row.try_get("projection")?,
        aggregate_id: row.try_get("aggregate_id")?,
        version: row.try_get("version")?,
        state: row.try_get("state")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ReadModelStore for PgReadModelStore {
    async fn load(
        &self,
        projection: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ReadModelRow>, DomainError> {
        let row = sqlx::query(SELECT_ROW)
            .bind(projection)
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(row_from_pg)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn upsert_if_newer(&self, row: ReadModelRow) -> Result<bool, DomainError> {
        let result = sqlx::query(UPSERT_IF_NEWER)
            .bind(&row.projection)
            .bind(row.aggregate_id)
            .bind(row.version)
            .bind(&row.state)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, projection: &str) -> Result<Vec<ReadModelRow>, DomainError> {
        let rows = sqlx::query(SELECT_PROJECTION)
            .bind(projection)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(row_from_pg)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn clear(&self, projection: &str) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM read_models WHERE projection = $1")
            .bind(projection)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
