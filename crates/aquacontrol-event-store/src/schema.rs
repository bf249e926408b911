//! Database schema for the event log, snapshots and read models.
//!
//! The SQL lives in the workspace `migrations/` directory and is embedded
//! here so binaries and `#[sqlx::test]` suites share one definition.

use aquacontrol_core::error::DomainError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;

/// Embedded workspace migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies all pending migrations.
///
/// # Errors
///
/// Returns `DomainError::StorageUnavailable` if a migration cannot be applied.
pub async fn migrate(pool: &PgPool) -> Result<(), DomainError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DomainError::StorageUnavailable(format!("migration failed: {e}")))
}
