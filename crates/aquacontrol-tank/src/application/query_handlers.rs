//! Query handlers for the Tank monitoring context.
//!
//! Queries read projected rows only; they never touch the event log.

use aquacontrol_core::error::DomainError;
use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::application::projections::{
    TankSummaryProjection, TankSummaryRow, WaterQualityProjection, WaterQualityRow,
};

/// A projected row together with the stream position it reflects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View<T> {
    /// The tank identifier.
    pub tank_id: Uuid,
    /// Version of the last event folded into `state`.
    pub version: i64,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
    /// Projected state.
    pub state: T,
}

/// Read-only view of a tank's descriptive state.
pub type TankSummaryView = View<TankSummaryRow>;
/// Read-only view of a tank's water quality.
pub type WaterQualityView = View<WaterQualityRow>;

fn to_view<T: DeserializeOwned>(row: ReadModelRow) -> Result<View<T>, DomainError> {
    let state = serde_json::from_value(row.state).map_err(|e| {
        DomainError::Serialization(format!(
            "{} row for {} decode failed: {e}",
            row.projection, row.aggregate_id
        ))
    })?;
    Ok(View {
        tank_id: row.aggregate_id,
        version: row.version,
        updated_at: row.updated_at,
        state,
    })
}

async fn get<T: DeserializeOwned>(
    projection: &str,
    tank_id: Uuid,
    read_models: &dyn ReadModelStore,
) -> Result<View<T>, DomainError> {
    let row = read_models
        .load(projection, tank_id)
        .await?
        .ok_or(DomainError::AggregateNotFound(tank_id))?;
    to_view(row)
}

/// Retrieves the summary of one tank.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no summary row exists yet,
/// `DomainError::Serialization` if the row cannot be decoded, and store
/// errors otherwise.
pub async fn get_tank_summary(
    tank_id: Uuid,
    read_models: &dyn ReadModelStore,
) -> Result<TankSummaryView, DomainError> {
    get(TankSummaryProjection::NAME, tank_id, read_models).await
}

/// Lists the summaries of every tank, ordered by tank id.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if a row cannot be decoded, and
/// store errors otherwise.
pub async fn list_tank_summaries(
    read_models: &dyn ReadModelStore,
) -> Result<Vec<TankSummaryView>, DomainError> {
    read_models
        .list(TankSummaryProjection::NAME)
        .await?
        .into_iter()
        .map(to_view)
        .collect()
}

/// Retrieves the water quality of one tank.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tank has no projected
/// reading yet, `DomainError::Serialization` if the row cannot be decoded,
/// and store errors otherwise.
pub async fn get_water_quality(
    tank_id: Uuid,
    read_models: &dyn ReadModelStore,
) -> Result<WaterQualityView, DomainError> {
    get(WaterQualityProjection::NAME, tank_id, read_models).await
}

/// Lists tanks whose latest trusted readings show pH stress or low
/// dissolved oxygen.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if a row cannot be decoded, and
/// store errors otherwise.
pub async fn list_tanks_needing_attention(
    read_models: &dyn ReadModelStore,
) -> Result<Vec<WaterQualityView>, DomainError> {
    let mut flagged = Vec::new();
    for row in read_models.list(WaterQualityProjection::NAME).await? {
        let view: WaterQualityView = to_view(row)?;
        if view.state.needs_attention() {
            flagged.push(view);
        }
    }
    Ok(flagged)
}
