//! Process configuration, read from environment variables.
//!
//! | Variable                     | Default | Meaning                                    |
//! |------------------------------|---------|--------------------------------------------|
//! | `LARDER_DATABASE_URL`        | unset   | Postgres URL; unset means in-memory stock  |
//! | `LARDER_DB_MAX_CONNECTIONS`  | `5`     | Pool size for the Postgres adapter         |
//! | `LARDER_ALLOW_EMPTY_RECIPES` | `false` | Treat empty recipes as "consume nothing"   |
//! | `LARDER_LOG_FORMAT`          | `json`  | `json`, `pretty` or `compact`              |
//! | `RUST_LOG`                   | `info`  | `EnvFilter` directives                     |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_inventory::DeductionOptions;
use larder_observability::{LogConfig, LogFormatError};

pub const DATABASE_URL_VAR: &str = "LARDER_DATABASE_URL";
pub const DB_MAX_CONNECTIONS_VAR: &str = "LARDER_DB_MAX_CONNECTIONS";
pub const ALLOW_EMPTY_RECIPES_VAR: &str = "LARDER_ALLOW_EMPTY_RECIPES";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be true or false, got '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error(transparent)]
    LogFormat(#[from] LogFormatError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` selects the in-memory stock store (see [`crate::bootstrap`]).
    pub database: Option<DatabaseConfig>,
    pub log: LogConfig,
    pub deduction: DeductionOptions,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get(DATABASE_URL_VAR) {
            Some(url) => {
                let max_connections = match get(DB_MAX_CONNECTIONS_VAR) {
                    Some(raw) => parse_positive(DB_MAX_CONNECTIONS_VAR, &raw)?,
                    None => DEFAULT_MAX_CONNECTIONS,
                };
                Some(DatabaseConfig {
                    url,
                    max_connections,
                })
            }
            None => None,
        };

        let allow_empty_recipes = match get(ALLOW_EMPTY_RECIPES_VAR) {
            Some(raw) => parse_bool(ALLOW_EMPTY_RECIPES_VAR, &raw)?,
            None => false,
        };

        Ok(Self {
            database,
            log: LogConfig::from_lookup(&lookup)?,
            deduction: DeductionOptions {
                allow_empty_recipes,
            },
        })
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}
