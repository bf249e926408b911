//! Projector configuration read from environment variables.

use std::str::FromStr;

use crate::error::AppError;

/// What a projector run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Replay the event log into the read models.
    Rebuild,
    /// Refresh snapshots that lag their streams.
    CompactSnapshots,
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rebuild" => Ok(Self::Rebuild),
            "compact-snapshots" => Ok(Self::CompactSnapshots),
            other => Err(AppError::Config(format!(
                "PROJECTOR_MODE must be rebuild or compact-snapshots, got {other}"
            ))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(AppError::Config(format!(
                "LOG_FORMAT must be json or pretty, got {other}"
            ))),
        }
    }
}

/// Settings of one projector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Pool size.
    pub max_connections: u32,
    /// What to run.
    pub mode: Mode,
    /// Restricts a rebuild to one projection, cleared first.
    pub projection: Option<String>,
    /// Snapshot interval used by compaction.
    pub snapshot_interval: u32,
    /// Log output format.
    pub log_format: LogFormat,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

impl ProjectorConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any
    /// variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".into())
            })?;
        let snapshot_interval = parse_or(&lookup, "SNAPSHOT_INTERVAL", 10)?;
        if snapshot_interval == 0 {
            return Err(AppError::Config(
                "SNAPSHOT_INTERVAL must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            mode: parse_or(&lookup, "PROJECTOR_MODE", Mode::Rebuild)?,
            projection: lookup("PROJECTOR_PROJECTION").filter(|name| !name.trim().is_empty()),
            snapshot_interval,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Json)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<const N: usize>(
        vars: [(&'static str, &'static str); N],
    ) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Arrange
        let env = lookup([("DATABASE_URL", "postgres://localhost/aquacontrol")]);

        // Act
        let config = ProjectorConfig::from_lookup(env).unwrap();

        // Assert
        assert_eq!(config.database_url, "postgres://localhost/aquacontrol");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.mode, Mode::Rebuild);
        assert_eq!(config.projection, None);
        assert_eq!(config.snapshot_interval, 10);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_every_variable_is_read() {
        let env = lookup([
            ("DATABASE_URL", "postgres://db/aqua"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("PROJECTOR_MODE", "compact-snapshots"),
            ("PROJECTOR_PROJECTION", "tank_summary"),
            ("SNAPSHOT_INTERVAL", "25"),
            ("LOG_FORMAT", "pretty"),
        ]);

        let config = ProjectorConfig::from_lookup(env).unwrap();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.mode, Mode::CompactSnapshots);
        assert_eq!(config.projection.as_deref(), Some("tank_summary"));
        assert_eq!(config.snapshot_interval, 25);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let result = ProjectorConfig::from_lookup(lookup([]));

        match result {
            Err(AppError::Config(message)) => assert!(message.contains("DATABASE_URL")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (key, value) in [
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("PROJECTOR_MODE", "vacuum"),
            ("SNAPSHOT_INTERVAL", "0"),
            ("LOG_FORMAT", "xml"),
        ] {
            let env = lookup([("DATABASE_URL", "postgres://db/aqua"), (key, value)]);

            let result = ProjectorConfig::from_lookup(env);

            assert!(
                matches!(result, Err(AppError::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
