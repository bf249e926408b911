//! Command handlers for the Tank monitoring context.
//!
//! Every handler loads the tank, runs the matching decision on the
//! aggregate, and saves the resulting events. A concurrency conflict makes
//! the handler reload and decide again, a bounded number of times.

use std::time::Duration;

use aquacontrol_core::aggregate::Versioned;
use aquacontrol_core::command::Command;
use aquacontrol_core::error::DomainError;
use aquacontrol_core::retry::RetryConfig;
use aquacontrol_repository::{AggregateRepository, retry_on_conflict};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::Tank;
use crate::domain::commands::{
    ChangeCapacity, CreateTank, DecommissionTank, RecordReading, RenameTank,
};
use crate::domain::events::TankEvent;

const CONFLICT_RETRY: RetryConfig = RetryConfig {
    max_attempts: 5,
    initial_delay: Duration::from_millis(10),
    max_delay: Duration::from_millis(200),
    multiplier: 2.0,
};

async fn load_or_new(
    tank_id: Uuid,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    match repo.load(tank_id).await {
        Err(DomainError::AggregateNotFound(_)) => Ok(Versioned::new(tank_id)),
        other => other,
    }
}

async fn execute<C, F>(
    command: &C,
    repo: &AggregateRepository<Tank>,
    allow_missing: bool,
    decide: F,
) -> Result<Versioned<Tank>, DomainError>
where
    C: Command,
    F: Fn(&Versioned<Tank>) -> Result<Vec<TankEvent>, DomainError>,
{
    let tank_id = command.aggregate_id();
    let correlation_id = command.correlation_id();
    let command_type = command.command_type();
    let decide = &decide;

    let tank = retry_on_conflict(CONFLICT_RETRY, |attempt| async move {
        let tank = if allow_missing {
            load_or_new(tank_id, repo).await?
        } else {
            repo.load(tank_id).await?
        };
        let events = decide(&tank)?;
        if events.is_empty() {
            debug!(command_type, attempt, "command produced no events");
            return Ok(tank);
        }
        repo.save(&tank, events, correlation_id).await
    })
    .await?;

    info!(command_type, version = tank.version(), "command handled");
    Ok(tank)
}

/// Handles the `CreateTank` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if a tank with that id already exists or
/// the name or capacity are invalid, and repository errors otherwise.
#[instrument(
    skip_all,
    fields(tank_id = %command.tank_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_create_tank(
    command: &CreateTank,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    execute(command, repo, true, |tank| {
        tank.aggregate().create(tank.exists(), command)
    })
    .await
}

/// Handles the `RenameTank` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tank does not exist,
/// `DomainError::Validation` if the aggregate rejects the rename, and
/// repository errors otherwise.
#[instrument(
    skip_all,
    fields(tank_id = %command.tank_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_rename_tank(
    command: &RenameTank,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    execute(command, repo, false, |tank| tank.aggregate().rename(command)).await
}

/// Handles the `ChangeCapacity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tank does not exist,
/// `DomainError::Validation` if the capacity is rejected, and repository
/// errors otherwise.
#[instrument(
    skip_all,
    fields(tank_id = %command.tank_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_change_capacity(
    command: &ChangeCapacity,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    execute(command, repo, false, |tank| {
        tank.aggregate().change_capacity(command)
    })
    .await
}

/// Handles the `RecordReading` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tank does not exist,
/// `DomainError::Validation` if the reading is rejected, and repository
/// errors otherwise.
#[instrument(skip_all, fields(tank_id = %command.tank_id, sensor = %command.sensor))]
pub async fn handle_record_reading(
    command: &RecordReading,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    execute(command, repo, false, |tank| {
        tank.aggregate().record_reading(command)
    })
    .await
}

/// Handles the `DecommissionTank` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tank does not exist and
/// repository errors otherwise.
#[instrument(
    skip_all,
    fields(tank_id = %command.tank_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_decommission_tank(
    command: &DecommissionTank,
    repo: &AggregateRepository<Tank>,
) -> Result<Versioned<Tank>, DomainError> {
    execute(command, repo, false, |tank| {
        tank.aggregate().decommission(command)
    })
    .await
}
