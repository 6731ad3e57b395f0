//! Epoch manager configuration from environment variables.

use crate::error::ConfigError;
use shared_types::DEFAULT_TRANSACTION_EXPIRY;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Default wait for a bundle to become ready.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default wait for a bundle to shut down.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Epoch manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochManagerConfig {
    /// How long a freshly started bundle may take to become ready
    pub startup_timeout: Duration,

    /// How long a cancelled bundle may take to shut down
    pub shutdown_timeout: Duration,

    /// Blocks a transaction stays valid after its reference block. A bundle
    /// outlives its epoch by this many blocks.
    pub transaction_expiry: u64,

    /// Capacity of each internal notification queue
    pub queue_capacity: usize,
}

impl Default for EpochManagerConfig {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            transaction_expiry: DEFAULT_TRANSACTION_EXPIRY,
            queue_capacity: 1,
        }
    }
}

impl EpochManagerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_EPOCH_STARTUP_TIMEOUT_SECS` (default: 60)
    /// - `QC_EPOCH_SHUTDOWN_TIMEOUT_SECS` (default: 60)
    /// - `QC_EPOCH_TRANSACTION_EXPIRY` (default: 600)
    /// - `QC_EPOCH_QUEUE_CAPACITY` (default: 1)
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            startup_timeout: parse_env("QC_EPOCH_STARTUP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.startup_timeout),
            shutdown_timeout: parse_env("QC_EPOCH_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            transaction_expiry: parse_env("QC_EPOCH_TRANSACTION_EXPIRY")
                .unwrap_or(defaults.transaction_expiry),
            queue_capacity: parse_env("QC_EPOCH_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity),
        }
    }

    /// Reject values the manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.startup_timeout.is_zero() {
            return Err(ConfigError::Zero("startup_timeout"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::Zero("shutdown_timeout"));
        }
        if self.transaction_expiry == 0 {
            return Err(ConfigError::Zero("transaction_expiry"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
