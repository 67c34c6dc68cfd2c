use std::time::Duration;

use crate::error::DbError;

/// Default pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default time to wait for a free connection.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound on pooled connections (default: `20`).
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection (default: `30`).
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Build a config for `database_url` with default pool settings.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }

    /// Apply the optional pool settings from the environment.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `DB_MAX_CONNECTIONS`      | `20`    |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`    |
    pub fn with_env_overrides(mut self) -> Result<Self, DbError> {
        if let Some(max) = env_parse::<u32>("DB_MAX_CONNECTIONS")? {
            self.max_connections = max;
        }
        if let Some(secs) = env_parse::<u64>("DB_ACQUIRE_TIMEOUT_SECS")? {
            self.acquire_timeout_secs = secs;
        }
        Ok(self)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, DbError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DbError::Config(format!("{key} must be a valid number, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}
