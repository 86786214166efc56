//! Environment-driven configuration.
//!
//! Environment variables:
//!   DATABASE_URL                        - PostgreSQL URL (default: `defaults::DATABASE_URL`)
//!   ASSETVAULT_DB_MAX_CONNECTIONS       - pool size upper bound
//!   ASSETVAULT_DB_CONNECT_TIMEOUT_SECS  - connection acquire timeout
//!   ASSETVAULT_LOCK_SOURCE_ROWS         - "true"/"false", lock rows while moving them
//!
//! A `.env` file in the working directory is loaded first when present.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use assetvault_core::defaults::DATABASE_URL;
use assetvault_core::{Error, Result};

use crate::engine::EngineOptions;
use crate::pool::PoolConfig;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "ASSETVAULT_DB_MAX_CONNECTIONS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "ASSETVAULT_DB_CONNECT_TIMEOUT_SECS";
pub const ENV_LOCK_SOURCE_ROWS: &str = "ASSETVAULT_LOCK_SOURCE_ROWS";

/// Everything needed to open a [`crate::Database`] on PostgreSQL.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolConfig,
    pub engine: EngineOptions,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DATABASE_URL.to_string(),
            pool: PoolConfig::default(),
            engine: EngineOptions::default(),
        }
    }
}

impl DatabaseConfig {
    /// Load `.env` (if any) and read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = vars.get(ENV_DATABASE_URL) {
            if url.trim().is_empty() {
                return Err(Error::Config(format!("{ENV_DATABASE_URL} is empty")));
            }
            config.url = url.clone();
        }
        if let Some(max) = parse_var::<u32>(&vars, ENV_MAX_CONNECTIONS)? {
            if max == 0 {
                return Err(Error::Config(format!(
                    "{ENV_MAX_CONNECTIONS} must be at least 1"
                )));
            }
            let min = config.pool.min_connections.min(max);
            config.pool = config.pool.max_connections(max).min_connections(min);
        }
        if let Some(secs) = parse_var::<u64>(&vars, ENV_CONNECT_TIMEOUT_SECS)? {
            config.pool = config.pool.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(lock) = parse_var::<bool>(&vars, ENV_LOCK_SOURCE_ROWS)? {
            config.engine = config.engine.lock_source_rows(lock);
        }

        debug!(
            subsystem = "db",
            component = "config",
            max_connections = config.pool.max_connections,
            lock_source_rows = config.engine.lock_source_rows,
            "Database configuration loaded"
        );
        Ok(config)
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
    }
}
