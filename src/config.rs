use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
// 100 Hz exchange cadence
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 10;
pub const DEFAULT_LOW_PRIORITY_DIVISOR: u32 = 10;
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Station settings. Port, baud and slave id are handed to the transport
/// untouched; the sync loop only consumes the timing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub slave_id: u8,
    pub update_interval_ms: u64,
    /// Defaults to the update interval when absent.
    pub watchdog_deadline_ms: Option<u64>,
    pub low_priority_divisor: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port_name: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            slave_id: DEFAULT_SLAVE_ID,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            watchdog_deadline_ms: None,
            low_priority_divisor: DEFAULT_LOW_PRIORITY_DIVISOR,
        }
    }
}

impl StationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid("update_interval_ms must be positive".into()));
        }
        if self.watchdog_deadline_ms == Some(0) {
            return Err(ConfigError::Invalid("watchdog_deadline_ms must be positive".into()));
        }
        if self.low_priority_divisor == 0 {
            return Err(ConfigError::Invalid("low_priority_divisor must be positive".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".into()));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn watchdog_deadline(&self) -> Duration {
        Duration::from_millis(self.watchdog_deadline_ms.unwrap_or(self.update_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StationConfig::default();
        assert_eq!(config.update_interval(), Duration::from_millis(10));
        assert_eq!(config.watchdog_deadline(), Duration::from_millis(10));
        assert_eq!(config.low_priority_divisor, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = StationConfig::from_json_str(
            r#"{"port_name": "COM4", "baud_rate": 9600, "watchdog_deadline_ms": 25}"#,
        )
        .unwrap();
        assert_eq!(config.port_name, "COM4");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.update_interval_ms, DEFAULT_UPDATE_INTERVAL_MS);
        assert_eq!(config.watchdog_deadline(), Duration::from_millis(25));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            StationConfig::from_json_str(r#"{"update_interval_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StationConfig::from_json_str(r#"{"low_priority_divisor": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StationConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
