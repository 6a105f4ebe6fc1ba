//! Dispatcher configuration
//!
//! All types use camelCase JSON serialization and default every field, so a
//! configuration file only needs to list what differs from the defaults.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// How the runtime variant of each driver is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvironmentMode {
    /// Ask the host environment
    #[default]
    Auto,
    /// Always load browser variants
    Browser,
    /// Always load server variants
    Server,
}

/// Bounded retry policy for vendor availability polling
///
/// A driver checks for its vendor global immediately, then once per
/// `interval_ms`, and gives up once `max_wait_ms` has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPolicy {
    /// Delay between two availability checks (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Total time after which the driver reports a failed load (milliseconds)
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_interval_ms() -> u64 {
    250
}

fn default_max_wait_ms() -> u64 {
    1500
}

fn default_failure_log_capacity() -> usize {
    1000
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl AvailabilityPolicy {
    /// Create a policy from explicit millisecond values
    pub fn new(interval_ms: u64, max_wait_ms: u64) -> Self {
        Self {
            interval_ms,
            max_wait_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Check the policy terminates and polls at least once after the first check
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(TrackError::Config(
                "Availability interval must be greater than zero".to_string(),
            ));
        }
        if self.interval_ms > self.max_wait_ms {
            return Err(TrackError::Config(format!(
                "Availability interval ({}ms) exceeds max wait ({}ms)",
                self.interval_ms, self.max_wait_ms
            )));
        }
        Ok(())
    }
}

/// Configuration for a `Dispatcher`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherConfig {
    /// Driver tokens to load, in delivery order
    #[serde(default)]
    pub drivers: Vec<String>,

    /// Variant selection mode
    #[serde(default)]
    pub environment: EnvironmentMode,

    /// Vendor availability polling policy handed to every driver
    #[serde(default)]
    pub availability: AvailabilityPolicy,

    /// Maximum number of tracking failures kept in memory (0 = unbounded)
    #[serde(default = "default_failure_log_capacity")]
    pub failure_log_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            drivers: Vec::new(),
            environment: EnvironmentMode::default(),
            availability: AvailabilityPolicy::default(),
            failure_log_capacity: default_failure_log_capacity(),
        }
    }
}

impl DispatcherConfig {
    /// Create a configuration for the given driver tokens
    pub fn with_drivers<I, S>(drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            drivers: drivers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Override the environment mode
    pub fn environment(mut self, mode: EnvironmentMode) -> Self {
        self.environment = mode;
        self
    }

    /// Override the availability policy
    pub fn availability(mut self, policy: AvailabilityPolicy) -> Self {
        self.availability = policy;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrackError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            drivers = ?config.drivers,
            "Dispatcher config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.availability.validate()?;

        let mut seen = HashSet::new();
        for token in &self.drivers {
            if token.trim().is_empty() {
                return Err(TrackError::Config(
                    "Driver token cannot be empty".to_string(),
                ));
            }
            if !seen.insert(token.as_str()) {
                return Err(TrackError::Config(format!(
                    "Driver token '{}' configured more than once",
                    token
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert!(config.drivers.is_empty());
        assert_eq!(config.environment, EnvironmentMode::Auto);
        assert_eq!(config.availability.interval_ms, 250);
        assert_eq!(config.availability.max_wait_ms, 1500);
        assert_eq!(config.failure_log_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = DispatcherConfig::from_json(
            r#"{"drivers": ["debug", "synerise"], "environment": "browser"}"#,
        )
        .unwrap();
        assert_eq!(config.drivers, vec!["debug", "synerise"]);
        assert_eq!(config.environment, EnvironmentMode::Browser);
        assert_eq!(config.availability, AvailabilityPolicy::default());
    }

    #[test]
    fn test_from_json_availability() {
        let config = DispatcherConfig::from_json(
            r#"{"availability": {"intervalMs": 100, "maxWaitMs": 400}, "failureLogCapacity": 5}"#,
        )
        .unwrap();
        assert_eq!(config.availability.interval(), Duration::from_millis(100));
        assert_eq!(config.availability.max_wait(), Duration::from_millis(400));
        assert_eq!(config.failure_log_capacity, 5);
    }

    #[test]
    fn test_rejects_duplicate_tokens() {
        let err = DispatcherConfig::with_drivers(["gtm", "gtm"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(DispatcherConfig::with_drivers([" "]).validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_poll() {
        assert!(AvailabilityPolicy::new(0, 1500).validate().is_err());
        assert!(AvailabilityPolicy::new(500, 100).validate().is_err());
        assert!(AvailabilityPolicy::new(250, 250).validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("a3s-trackify-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trackify.json");
        std::fs::write(&path, r#"{"drivers": ["debug"], "environment": "server"}"#).unwrap();

        let config = DispatcherConfig::from_file(&path).unwrap();
        assert_eq!(config.drivers, vec!["debug"]);
        assert_eq!(config.environment, EnvironmentMode::Server);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_file_missing() {
        let err = DispatcherConfig::from_file("/tmp/nonexistent-a3s-trackify.json").unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }
}
