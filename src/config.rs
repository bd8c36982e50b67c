//! Configuration module for the log pusher.
//!
//! This module provides environment-based configuration for a pusher's
//! flush cadence, retry ceiling, ingress capacity, and shutdown drain
//! deadline.

use std::env;
use std::time::Duration;

/// Default flush interval in milliseconds.
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Minimum flush interval to avoid hammering the sink.
const MIN_FLUSH_INTERVAL_MS: u64 = 100;

/// Maximum flush interval to bound worst-case event latency.
const MAX_FLUSH_INTERVAL_MS: u64 = 300_000;

/// Default number of recoverable-error retries per flush attempt.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Maximum allowed retry ceiling.
const MAX_MAX_RETRIES: u32 = 20;

/// Default bounded-queue capacity per target.
const DEFAULT_INGRESS_CAPACITY: usize = 100;

/// Maximum allowed ingress capacity.
const MAX_INGRESS_CAPACITY: usize = 10_000;

/// Default shutdown drain deadline in milliseconds.
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a pusher, shared across every target it manages.
///
/// All settings can be configured via environment variables:
/// - `LOGPUSHER_FLUSH_INTERVAL_MS`: flush timer period (default: 5000)
/// - `LOGPUSHER_MAX_RETRIES`: recoverable-error retry ceiling (default: 5)
/// - `LOGPUSHER_INGRESS_CAPACITY`: per-target bounded queue size (default: 100)
/// - `LOGPUSHER_SHUTDOWN_TIMEOUT_MS`: drain deadline on stop (default: 10000)
#[derive(Debug, Clone)]
pub struct Config {
    /// How long the buffer may sit non-empty before a timer-driven flush.
    pub flush_interval: Duration,

    /// Recoverable-error retries attempted per flush before giving up.
    pub max_retries: u32,

    /// Capacity of a target's bounded ingress queue.
    pub ingress_capacity: usize,

    /// How long `Pusher::stop` waits for the final drain before giving up.
    pub shutdown_timeout: Duration,
}

/// Error type for configuration loading failures.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// sensible defaults where a variable is unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any of the four variables is set but fails
    /// to parse, or falls outside its allowed bounds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let flush_interval_ms = Self::parse_bounded(
            "LOGPUSHER_FLUSH_INTERVAL_MS",
            DEFAULT_FLUSH_INTERVAL_MS,
            MIN_FLUSH_INTERVAL_MS,
            MAX_FLUSH_INTERVAL_MS,
        )?;

        let max_retries = Self::parse_bounded(
            "LOGPUSHER_MAX_RETRIES",
            DEFAULT_MAX_RETRIES as u64,
            0,
            MAX_MAX_RETRIES as u64,
        )? as u32;

        let ingress_capacity = Self::parse_bounded(
            "LOGPUSHER_INGRESS_CAPACITY",
            DEFAULT_INGRESS_CAPACITY as u64,
            1,
            MAX_INGRESS_CAPACITY as u64,
        )? as usize;

        let shutdown_timeout_ms = Self::parse_bounded(
            "LOGPUSHER_SHUTDOWN_TIMEOUT_MS",
            DEFAULT_SHUTDOWN_TIMEOUT_MS,
            0,
            u64::MAX,
        )?;

        Ok(Self {
            flush_interval: Duration::from_millis(flush_interval_ms),
            max_retries,
            ingress_capacity,
            shutdown_timeout: Duration::from_millis(shutdown_timeout_ms),
        })
    }

    /// Parse `env_var` as a `u64`, defaulting to `default` when unset and
    /// rejecting values outside `[min, max]`.
    fn parse_bounded(env_var: &str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
        match env::var(env_var) {
            Ok(value) => {
                let parsed: u64 = value.parse().map_err(|_| ConfigError {
                    message: format!("'{}' is not a valid number", value),
                    env_var: Some(env_var.to_string()),
                })?;

                if parsed < min {
                    return Err(ConfigError {
                        message: format!("{} is below minimum ({})", parsed, min),
                        env_var: Some(env_var.to_string()),
                    });
                }

                if parsed > max {
                    return Err(ConfigError {
                        message: format!("{} exceeds maximum ({})", parsed, max),
                        env_var: Some(env_var.to_string()),
                    });
                }

                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}
