//! AquaControl projector error types.

use aquacontrol_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the projector.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A rebuild or compaction pass failed.
    #[error("engine error: {0}")]
    Engine(#[from] DomainError),
}
