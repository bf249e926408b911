//! Mapping from `sqlx` errors into the domain taxonomy.

use aquacontrol_core::error::DomainError;

/// Returns `true` if the error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Returns `true` if the database rejected the data itself (SQLSTATE class
/// `22`, e.g. `22P05` for a NUL in a JSONB payload).
fn is_data_exception(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("22")),
        _ => false,
    }
}

/// Maps a `sqlx` error to a `DomainError`. Row decoding problems and data
/// the database rejects are serialization errors; everything else is
/// treated as transient storage unavailability.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> DomainError {
    if is_data_exception(&err) {
        return DomainError::Serialization(format!("database rejected data: {err}"));
    }
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DomainError::Serialization(format!("row decode failed: {err}"))
        }
        other => DomainError::StorageUnavailable(other.to_string()),
    }
}
