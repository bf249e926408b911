//! AquaControl projector entry point.

use std::error::Error;

use aquacontrol_event_store::schema;
use aquacontrol_projector::config::{LogFormat, ProjectorConfig};
use aquacontrol_projector::engine::{Engine, RunReport};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ProjectorConfig::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(mode = ?config.mode, "starting AquaControl projector");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    schema::migrate(&pool).await?;

    let engine = Engine::postgres(&pool, config.snapshot_interval);
    match engine.run(config.mode, config.projection.as_deref()).await? {
        RunReport::Rebuilt(report) => tracing::info!(
            aggregates = report.aggregates,
            events = report.events,
            applied = report.applied,
            dead_lettered = report.dead_lettered,
            "rebuild complete"
        ),
        RunReport::Compacted(report) => tracing::info!(
            examined = report.examined,
            written = report.written,
            failed = report.failed,
            "compaction complete"
        ),
    }

    pool.close().await;
    Ok(())
}
