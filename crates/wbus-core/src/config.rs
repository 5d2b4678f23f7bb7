//! Driver configuration
//!
//! All timing constants of the driver in one serde-backed struct. Every field
//! has a default, so a JSON file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::heater::{KeepAlive, DEFAULT_ATTEMPTS};
use crate::protocol::{BusTiming, SerialConfig, StatusQuery};

/// Errors loading or validating a [`DriverConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Driver settings, durations in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Physical port settings (ignored by the simulator)
    pub serial: SerialConfig,

    /// Quiet time after which the next request is preceded by a wake pulse
    pub wake_holdoff_ms: u64,
    /// Wait for the wake byte to come back
    pub wake_ack_timeout_ms: u64,
    /// Wait for the looped-back request
    pub echo_timeout_ms: u64,
    /// Wait for the heater's reply
    pub reply_timeout_ms: u64,
    /// Sleep between receive polls
    pub poll_interval_ms: u64,

    /// Attempts per command and keep-alive check
    pub command_attempts: u32,
    /// Minutes used by `heat_on`/`vent_on` when none are given
    pub default_minutes: u8,

    pub keep_alive_period_ms: u64,
    pub renewal_threshold_ms: u64,
    /// Minutes requested when a running session is renewed
    pub renewal_minutes: u8,

    pub flags_period_ms: u64,
    pub drive_levels_period_ms: u64,
    pub sensors_period_ms: u64,
    pub counters_period_ms: u64,
    pub operating_state_period_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            wake_holdoff_ms: 30_000,
            wake_ack_timeout_ms: 50,
            echo_timeout_ms: 100,
            reply_timeout_ms: 200,
            poll_interval_ms: 1,
            command_attempts: DEFAULT_ATTEMPTS,
            default_minutes: 1,
            keep_alive_period_ms: 10_000,
            renewal_threshold_ms: 30_000,
            renewal_minutes: 1,
            flags_period_ms: 5_000,
            drive_levels_period_ms: 5_000,
            sensors_period_ms: 5_000,
            counters_period_ms: 30_000,
            operating_state_period_ms: 5_000,
        }
    }
}

impl DriverConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the driver cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("keep_alive_period_ms", self.keep_alive_period_ms),
            ("flags_period_ms", self.flags_period_ms),
            ("drive_levels_period_ms", self.drive_levels_period_ms),
            ("sensors_period_ms", self.sensors_period_ms),
            ("counters_period_ms", self.counters_period_ms),
            ("operating_state_period_ms", self.operating_state_period_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }
        if self.command_attempts == 0 {
            return Err(ConfigError::Invalid(
                "command_attempts must be at least 1".to_string(),
            ));
        }
        if self.default_minutes == 0 {
            return Err(ConfigError::Invalid(
                "default_minutes must be at least 1".to_string(),
            ));
        }
        if self.renewal_minutes == 0 {
            return Err(ConfigError::Invalid(
                "renewal_minutes must be at least 1".to_string(),
            ));
        }
        let renewal = Duration::from_secs(self.renewal_minutes as u64 * 60);
        if renewal < self.renewal_threshold() {
            return Err(ConfigError::Invalid(format!(
                "renewal of {} min is shorter than the renewal threshold of {} ms",
                self.renewal_minutes, self.renewal_threshold_ms
            )));
        }
        Ok(())
    }

    pub fn bus_timing(&self) -> BusTiming {
        BusTiming {
            wake_holdoff: Duration::from_millis(self.wake_holdoff_ms),
            wake_ack_timeout: Duration::from_millis(self.wake_ack_timeout_ms),
            echo_timeout: Duration::from_millis(self.echo_timeout_ms),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn keep_alive(&self) -> KeepAlive {
        KeepAlive {
            period: Duration::from_millis(self.keep_alive_period_ms),
            renewal_threshold: self.renewal_threshold(),
            renewal_minutes: self.renewal_minutes,
        }
    }

    fn renewal_threshold(&self) -> Duration {
        Duration::from_millis(self.renewal_threshold_ms)
    }

    /// Polling period of a status query
    pub fn query_period(&self, query: StatusQuery) -> Duration {
        let ms = match query {
            StatusQuery::Flags => self.flags_period_ms,
            StatusQuery::DriveLevels => self.drive_levels_period_ms,
            StatusQuery::Sensors => self.sensors_period_ms,
            StatusQuery::Counters => self.counters_period_ms,
            StatusQuery::OperatingState => self.operating_state_period_ms,
        };
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_bus_defaults() {
        let config = DriverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus_timing(), BusTiming::default());
        assert_eq!(config.keep_alive(), KeepAlive::default());
        assert_eq!(config.query_period(StatusQuery::Counters), Duration::from_secs(30));
        assert_eq!(config.query_period(StatusQuery::Sensors), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "command_attempts": 5, "serial": { "port_name": "/dev/ttyUSB0" } }"#;
        let config = DriverConfig::from_json(json).expect("parse");
        assert_eq!(config.command_attempts, 5);
        assert_eq!(config.serial.port_name, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 2400);
        assert_eq!(config.keep_alive_period_ms, 10_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "command_attempts": 0 }"#,
            r#"{ "sensors_period_ms": 0 }"#,
            r#"{ "renewal_minutes": 0 }"#,
            r#"{ "renewal_threshold_ms": 120000 }"#,
        ] {
            assert!(
                matches!(DriverConfig::from_json(json), Err(ConfigError::Invalid(_))),
                "{} should be rejected",
                json
            );
        }
        assert!(matches!(
            DriverConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wbus.json");
        let mut config = DriverConfig::default();
        config.default_minutes = 30;
        config.save(&path).expect("save");
        assert_eq!(DriverConfig::from_file(&path).expect("load"), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            DriverConfig::from_file(dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
