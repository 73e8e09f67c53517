//! Consumer configuration.
//!
//! # Scheduling
//!
//! - **Interval**: time between cycle starts. 1 second by default
//!   (configurable via `BURST_BATCH_INTERVAL_MS`). Must be non-zero.
//! - **Cycle policy**: whether a new tick may start a cycle while an earlier
//!   one is still running (configurable via `BURST_BATCH_CYCLE_POLICY`).
//!
//! # Cycle policy
//!
//! With [`CyclePolicy::Overlapping`] every tick spawns a cycle immediately,
//! which favours throughput: a slow handler does not delay the next
//! extraction. Items pulled by overlapping cycles may then be handled out of
//! FIFO order. [`CyclePolicy::Serialized`] makes each cycle wait for the
//! previous one, preserving order across cycles at the cost of letting a slow
//! handler stall extraction.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default interval between cycle starts (1 second).
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Environment variable overriding the interval, in milliseconds.
pub const INTERVAL_ENV: &str = "BURST_BATCH_INTERVAL_MS";

/// Environment variable selecting the cycle policy.
pub const CYCLE_POLICY_ENV: &str = "BURST_BATCH_CYCLE_POLICY";

/// Errors from building or loading a [`ConsumerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The interval was zero.
    #[error("consumer interval must be greater than zero")]
    ZeroInterval,

    /// The configuration file could not be read.
    #[error("failed to read consumer config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file was not valid JSON for this type.
    #[error("failed to parse consumer config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whether extraction cycles may run concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Every tick starts a cycle, even if earlier cycles are still running.
    #[default]
    Overlapping,

    /// A cycle waits for the previous one to finish before extracting.
    Serialized,
}

impl CyclePolicy {
    /// Parses `overlapping` or `serialized`, ignoring case and surrounding
    /// whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlapping" => Some(CyclePolicy::Overlapping),
            "serialized" => Some(CyclePolicy::Serialized),
            _ => None,
        }
    }
}

/// Configuration for a [`RateLimitedConsumer`](super::RateLimitedConsumer).
///
/// The store, predicate and handler are passed to the consumer directly;
/// this type holds the scheduling knobs.
///
/// Serialized form:
///
/// ```json
/// { "interval_ms": 250, "cycle_policy": "serialized" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Time between cycle starts.
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,

    /// Whether cycles may overlap.
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INTERVAL_MS))
    }
}

impl ConsumerConfig {
    /// Creates a configuration with the given interval and overlapping cycles.
    pub fn new(interval: Duration) -> Self {
        ConsumerConfig {
            interval,
            cycle_policy: CyclePolicy::default(),
        }
    }

    /// Sets the cycle policy.
    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }

    /// Checks that the configuration can drive a consumer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Creates a `ConsumerConfig` from environment variables.
    ///
    /// Reads [`INTERVAL_ENV`] and [`CYCLE_POLICY_ENV`]. Missing or unparsable
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let interval_ms = lookup(INTERVAL_ENV)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_INTERVAL_MS);
        let cycle_policy = lookup(CYCLE_POLICY_ENV)
            .and_then(|s| CyclePolicy::parse(&s))
            .unwrap_or_default();

        ConsumerConfig {
            interval: Duration::from_millis(interval_ms),
            cycle_policy,
        }
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ConsumerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
