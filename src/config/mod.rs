//! # Consumer Configuration
//!
//! Operator-facing settings for one queue consumer. Values are layered by
//! [`ConfigLoader`]: built-in defaults, then an optional YAML file, then
//! `SBQ__`-prefixed environment variables (`SBQ__SCHEDULE__INTERVAL=5`).
//!
//! ```rust
//! use servicebus_consumer::config::{ConsumerConfig, IntervalUnit};
//! use std::time::Duration;
//!
//! let mut config = ConsumerConfig::new("orders");
//! config.schedule.interval = 2;
//! config.schedule.unit = IntervalUnit::Minutes;
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.schedule.period(), Duration::from_secs(120));
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_MESSAGES, DEFAULT_RECEIVE_TIMEOUT_SECONDS, DEFAULT_SCHEDULE_INTERVAL,
    MAX_BATCH_CEILING, MAX_RECEIVE_TIMEOUT_SECONDS,
};
use crate::messaging::{Credential, QueueTarget};

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Settings for one queue consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Queue messages are consumed from
    #[serde(default)]
    pub queue_name: String,
    /// Fully qualified namespace host, e.g. `contoso.servicebus.windows.net`
    #[serde(default)]
    pub namespace: Option<String>,
    /// Messages requested per cycle, clamped to the provider ceiling
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_receive_timeout_seconds")]
    pub receive_timeout_seconds: f64,
    /// Emit the pre-parse body string alongside the parsed body
    #[serde(default = "default_include_raw_body")]
    pub include_raw_body: bool,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Where consumer timestamps persist; in memory when absent
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_receive_timeout_seconds() -> f64 {
    DEFAULT_RECEIVE_TIMEOUT_SECONDS
}

fn default_include_raw_body() -> bool {
    true
}

/// Effective batch size after applying the provider ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSize {
    pub value: usize,
    /// Set when the configured value exceeded the ceiling
    pub warning: Option<String>,
}

impl ConsumerConfig {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            namespace: None,
            max_messages: DEFAULT_MAX_MESSAGES,
            receive_timeout_seconds: DEFAULT_RECEIVE_TIMEOUT_SECONDS,
            include_raw_body: true,
            schedule: ScheduleConfig::default(),
            credential: None,
            state_file: None,
        }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_receive_timeout_seconds(mut self, seconds: f64) -> Self {
        self.receive_timeout_seconds = seconds;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Check the settings a poll cycle or probe depends on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigError::missing_required_field("queue_name"));
        }

        if self.max_messages == 0 {
            return Err(ConfigError::invalid_value(
                "max_messages",
                self.max_messages,
                "must be a positive integer",
            ));
        }

        if !self.receive_timeout_seconds.is_finite() || self.receive_timeout_seconds <= 0.0 {
            return Err(ConfigError::invalid_value(
                "receive_timeout_seconds",
                self.receive_timeout_seconds,
                "must be a positive number of seconds",
            ));
        }

        if self.receive_timeout_seconds > MAX_RECEIVE_TIMEOUT_SECONDS {
            return Err(ConfigError::invalid_value(
                "receive_timeout_seconds",
                self.receive_timeout_seconds,
                format!("must not exceed {MAX_RECEIVE_TIMEOUT_SECONDS} seconds"),
            ));
        }

        self.schedule.validate()
    }

    /// Batch size passed to `receive`
    pub fn batch_size(&self) -> BatchSize {
        if self.max_messages > MAX_BATCH_CEILING {
            BatchSize {
                value: MAX_BATCH_CEILING,
                warning: Some(format!(
                    "max_messages {} exceeds the provider ceiling; clamped to {}",
                    self.max_messages, MAX_BATCH_CEILING
                )),
            }
        } else {
            BatchSize {
                value: self.max_messages,
                warning: None,
            }
        }
    }

    /// Receive wait as a `Duration`, rejecting values no `Duration` can hold
    pub fn receive_timeout(&self) -> ConfigResult<Duration> {
        Duration::try_from_secs_f64(self.receive_timeout_seconds).map_err(|_| {
            ConfigError::invalid_value(
                "receive_timeout_seconds",
                self.receive_timeout_seconds,
                "is not a representable duration",
            )
        })
    }

    pub fn target(&self) -> QueueTarget {
        let target = QueueTarget::new(self.queue_name.clone());
        match &self.namespace {
            Some(namespace) => target.with_namespace(namespace.clone()),
            None => target,
        }
    }

    /// Configured credential, required before any session can open
    pub fn credential(&self) -> ConfigResult<&Credential> {
        self.credential
            .as_ref()
            .ok_or_else(|| ConfigError::missing_required_field("credential"))
    }

    /// JSON view with secrets masked, for logging
    pub fn sanitized(&self) -> serde_json::Value {
        json!({
            "queue_name": self.queue_name,
            "namespace": self.namespace,
            "max_messages": self.max_messages,
            "receive_timeout_seconds": self.receive_timeout_seconds,
            "include_raw_body": self.include_raw_body,
            "schedule": {
                "interval": self.schedule.interval,
                "unit": self.schedule.unit.to_string(),
            },
            "credential": self.credential.as_ref().map(|c| format!("{}: ***", c.kind())),
            "state_file": self.state_file,
        })
    }
}

/// Poll schedule expressed as an interval and a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_interval")]
    pub interval: u64,
    #[serde(default)]
    pub unit: IntervalUnit,
}

fn default_schedule_interval() -> u64 {
    DEFAULT_SCHEDULE_INTERVAL
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SCHEDULE_INTERVAL,
            unit: IntervalUnit::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval == 0 {
            return Err(ConfigError::invalid_value(
                "schedule.interval",
                self.interval,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval.saturating_mul(self.unit.seconds()))
    }
}

/// Unit of the poll schedule interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => 24 * 60 * 60,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for IntervalUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "s" => Ok(Self::Seconds),
            "minute" | "minutes" | "m" => Ok(Self::Minutes),
            "hour" | "hours" | "h" => Ok(Self::Hours),
            "day" | "days" | "d" => Ok(Self::Days),
            other => Err(ConfigError::invalid_value(
                "schedule.unit",
                other,
                "expected seconds, minutes, hours or days",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsumerConfig::new("orders");
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.receive_timeout(), Ok(Duration::from_secs(5)));
        assert_eq!(config.schedule.period(), Duration::from_secs(30));
        assert!(config.include_raw_body);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_clamped_with_warning() {
        let batch = ConsumerConfig::new("orders").with_max_messages(5000).batch_size();
        assert_eq!(batch.value, MAX_BATCH_CEILING);
        assert!(batch.warning.unwrap().contains("5000"));

        let batch = ConsumerConfig::new("orders").with_max_messages(2047).batch_size();
        assert_eq!(batch.value, 2047);
        assert!(batch.warning.is_none());
    }

    #[test]
    fn test_validation_failures() {
        assert_eq!(
            ConsumerConfig::new("  ").validate(),
            Err(ConfigError::missing_required_field("queue_name"))
        );
        assert!(matches!(
            ConsumerConfig::new("q").with_max_messages(0).validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(ConsumerConfig::new("q")
            .with_receive_timeout_seconds(0.0)
            .validate()
            .is_err());
        assert!(ConsumerConfig::new("q")
            .with_receive_timeout_seconds(f64::NAN)
            .validate()
            .is_err());
        assert!(matches!(
            ConsumerConfig::new("q")
                .with_receive_timeout_seconds(1e20)
                .validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(ConsumerConfig::new("q")
            .with_receive_timeout_seconds(MAX_RECEIVE_TIMEOUT_SECONDS)
            .validate()
            .is_ok());
        assert!(ConsumerConfig::new("q")
            .with_receive_timeout_seconds(1e20)
            .receive_timeout()
            .is_err());

        let mut config = ConsumerConfig::new("q");
        config.schedule.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_credential() {
        let config = ConsumerConfig::new("orders");
        assert_eq!(
            config.credential(),
            Err(ConfigError::missing_required_field("credential"))
        );
    }

    #[test]
    fn test_target_carries_namespace() {
        let target = ConsumerConfig::new("orders")
            .with_namespace("contoso.servicebus.windows.net")
            .target();
        assert_eq!(target.queue_name, "orders");
        assert_eq!(
            target.namespace.as_deref(),
            Some("contoso.servicebus.windows.net")
        );
    }

    #[test]
    fn test_sanitized_masks_credential() {
        let config = ConsumerConfig::new("orders")
            .with_credential(Credential::bearer_token("super-secret", None));
        let rendered = config.sanitized().to_string();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("bearer_token: ***"));
    }

    #[test]
    fn test_interval_unit_parsing() {
        assert_eq!("Minutes".parse::<IntervalUnit>().unwrap(), IntervalUnit::Minutes);
        assert_eq!("d".parse::<IntervalUnit>().unwrap(), IntervalUnit::Days);
        assert!("fortnights".parse::<IntervalUnit>().is_err());
        assert_eq!(IntervalUnit::Hours.to_string(), "hours");
    }
}
