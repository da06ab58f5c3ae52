//! Configuration management for the gatekeeper binary.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::types::OperatorId;
use std::env;
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gatekeeper=info";

/// Default drain time for in-flight notifications on exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An `OPERATORS` entry is not an integer id
    #[error("invalid operator id {entry:?} in OPERATORS: {source}")]
    InvalidOperator {
        /// Offending entry, trimmed
        entry: String,
        /// Parse failure
        #[source]
        source: ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Operator allow-list, in broadcast order
    pub operators: Vec<OperatorId>,
    /// How long shutdown waits for in-flight notifications
    pub shutdown_timeout: Duration,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `OPERATORS` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `OPERATORS` is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let operators = match lookup("OPERATORS") {
            Some(raw) => parse_operators(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            operators,
            shutdown_timeout: lookup("SHUTDOWN_TIMEOUT")
                .and_then(|s| s.trim().parse().ok())
                .map_or(DEFAULT_SHUTDOWN_TIMEOUT, Duration::from_secs),
            log_filter: lookup("RUST_LOG")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

/// Parse a comma-separated operator list.
///
/// Whitespace around entries is ignored, empty entries are skipped and
/// repeated ids keep their first position.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOperator`] for the first non-integer entry.
pub fn parse_operators(raw: &str) -> Result<Vec<OperatorId>, ConfigError> {
    let mut operators = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let id = entry
            .parse::<i64>()
            .map_err(|source| ConfigError::InvalidOperator {
                entry: entry.to_string(),
                source,
            })?;
        let operator = OperatorId::new(id);
        if !operators.contains(&operator) {
            operators.push(operator);
        }
    }
    Ok(operators)
}
