//! Ledger runtime configuration.
//!
//! Defaults suit tests and local development. Override via environment
//! variables or explicit construction.

use std::str::FromStr;
use std::time::Duration;

/// Settings for a [`crate::LedgerHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Bound applied by [`crate::LedgerHandle::await_mutation`].
    pub await_timeout: Duration,
    /// Call `enable()` on a disabled provider before submitting.
    pub auto_enable_provider: bool,
    /// Settled mutations the registry keeps for status queries. Pending
    /// mutations are never evicted.
    pub mutation_history: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            await_timeout: Duration::from_secs(30),
            auto_enable_provider: true,
            mutation_history: 1024,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `XCERT_AWAIT_TIMEOUT_SECS` (default: 30, must be positive)
    /// - `XCERT_AUTO_ENABLE_PROVIDER` (default: `true`)
    /// - `XCERT_MUTATION_HISTORY` (default: 1024)
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = env_parse("XCERT_AWAIT_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "XCERT_AWAIT_TIMEOUT_SECS".to_string(),
                "0".to_string(),
            ));
        }
        Ok(Self {
            await_timeout: Duration::from_secs(timeout_secs),
            auto_enable_provider: env_bool("XCERT_AUTO_ENABLE_PROVIDER", true)?,
            mutation_history: env_parse("XCERT_MUTATION_HISTORY", 1024)?,
        })
    }
}

fn env_parse<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn env_bool(var: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(var.to_string(), raw)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
}
