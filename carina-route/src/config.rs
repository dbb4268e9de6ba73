//! Reconciler configuration

use std::collections::HashMap;
use std::time::Duration;

use carina_core::resource::Value;
use carina_core::retry::{RetryPolicy, duration_ms};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long and how often to re-read after a write until it is observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    #[serde(rename = "initial_interval_ms", with = "duration_ms")]
    pub initial_interval: Duration,
    #[serde(rename = "max_interval_ms", with = "duration_ms")]
    pub max_interval: Duration,
    pub multiplier: u32,
    /// Give up after this much time has passed since the write returned
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2,
            timeout: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    /// Delay before re-read number `poll` (1-based)
    pub fn interval(&self, poll: u32) -> Duration {
        let mut delay = self.initial_interval;
        for _ in 1..poll {
            delay = delay.saturating_mul(self.multiplier.max(1));
            if delay >= self.max_interval {
                break;
            }
        }
        delay.min(self.max_interval)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Retry and polling budgets, passed explicitly to every reconciler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
}

impl ReconcilerConfig {
    /// Zero-wait retries and a short poll window (for tests)
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy::immediate(3),
            poll: PollPolicy {
                initial_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(1),
                multiplier: 1,
                timeout: Duration::from_millis(100),
            },
        }
    }

    /// Read overrides from provider configuration attributes
    ///
    /// Recognized keys are `max_attempts`, `initial_backoff_ms`,
    /// `max_backoff_ms`, `poll_interval_ms`, `poll_max_interval_ms` and
    /// `poll_timeout_ms`. Missing keys keep their defaults.
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(n) = get_u64(attributes, "max_attempts")? {
            config.retry.max_attempts =
                u32::try_from(n).map_err(|e| invalid("max_attempts", e))?;
            if config.retry.max_attempts == 0 {
                return Err(invalid("max_attempts", "must be at least 1"));
            }
        }
        if let Some(ms) = get_u64(attributes, "initial_backoff_ms")? {
            config.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = get_u64(attributes, "max_backoff_ms")? {
            config.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = get_u64(attributes, "poll_interval_ms")? {
            config.poll.initial_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = get_u64(attributes, "poll_max_interval_ms")? {
            config.poll.max_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = get_u64(attributes, "poll_timeout_ms")? {
            config.poll.timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn get_u64(attributes: &HashMap<String, Value>, key: &str) -> Result<Option<u64>, ConfigError> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::Int(n)) => u64::try_from(*n)
            .map(Some)
            .map_err(|_| invalid(key, "must not be negative")),
        Some(other) => Err(invalid(
            key,
            format!("expected Int, got {}", other.type_name()),
        )),
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_grows_and_caps() {
        let poll = PollPolicy::default();
        assert_eq!(poll.interval(1), Duration::from_secs(1));
        assert_eq!(poll.interval(2), Duration::from_secs(2));
        assert_eq!(poll.interval(4), Duration::from_secs(8));
        assert_eq!(poll.interval(5), Duration::from_secs(10));
        assert_eq!(poll.interval(50), Duration::from_secs(10));
    }

    #[test]
    fn from_attributes_overrides_defaults() {
        let mut attrs = HashMap::new();
        attrs.insert("max_attempts".to_string(), Value::Int(2));
        attrs.insert("poll_timeout_ms".to_string(), Value::Int(500));

        let config = ReconcilerConfig::from_attributes(&attrs).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.poll.timeout, Duration::from_millis(500));
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(200));
    }

    #[test]
    fn from_attributes_rejects_bad_values() {
        let mut attrs = HashMap::new();
        attrs.insert("poll_timeout_ms".to_string(), Value::from("soon"));
        assert!(matches!(
            ReconcilerConfig::from_attributes(&attrs),
            Err(ConfigError::InvalidValue { key, .. }) if key == "poll_timeout_ms"
        ));

        let mut attrs = HashMap::new();
        attrs.insert("max_attempts".to_string(), Value::Int(0));
        assert!(ReconcilerConfig::from_attributes(&attrs).is_err());

        let mut attrs = HashMap::new();
        attrs.insert("max_backoff_ms".to_string(), Value::Int(-1));
        assert!(ReconcilerConfig::from_attributes(&attrs).is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let config: ReconcilerConfig = serde_json::from_str(
            r#"{"retry": {"max_attempts": 7}, "poll": {"timeout_ms": 30000}}"#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.poll.timeout, Duration::from_secs(30));
        assert_eq!(config.poll.initial_interval, Duration::from_secs(1));
    }
}
