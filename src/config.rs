//! Configuration for sphero-io
//!
//! Loads configuration from a TOML file. Every section except `[device]` may
//! be omitted and falls back to its defaults.

use crate::devices::sphero::CollisionConfig;
use crate::devices::sphero::constants::{
    DISPATCH_INTERVAL_MS, HALT_DURATION_MS, HALT_INTERVAL_MS, OUTGOING_QUEUE_CAPACITY,
    SYNC_RESPONSE_TIMEOUT_MS,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    /// Collision detection parameters sent at startup (defaults if absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision: Option<CollisionConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device selection and link settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Name used in logs
    pub name: String,
    /// Driver to use ("sphero")
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    /// Serial port of the robot (e.g. an RFCOMM device)
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Protocol engine timing and limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Outgoing packet queue capacity
    pub queue_capacity: usize,
    /// How long a synchronous request waits for its reply
    pub sync_timeout_ms: u64,
    /// Async dispatcher tick
    pub dispatch_interval_ms: u64,
    /// How long `halt` keeps sending stop
    pub halt_duration_ms: u64,
    /// Spacing of the stop commands sent by `halt`
    pub halt_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

fn default_device_type() -> String {
    "sphero".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use sphero_io::config::Config;
    ///
    /// let config = Config::load("sphero.toml")?;
    /// # Ok::<(), sphero_io::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                name: "sphero".to_string(),
                device_type: default_device_type(),
                port: "/dev/rfcomm0".to_string(),
                baud_rate: default_baud_rate(),
            },
            driver: DriverConfig::default(),
            collision: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            queue_capacity: OUTGOING_QUEUE_CAPACITY,
            sync_timeout_ms: SYNC_RESPONSE_TIMEOUT_MS,
            dispatch_interval_ms: DISPATCH_INTERVAL_MS,
            halt_duration_ms: HALT_DURATION_MS,
            halt_interval_ms: HALT_INTERVAL_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.device_type, "sphero");
        assert_eq!(config.device.baud_rate, 115_200);
        assert_eq!(config.driver.sync_timeout_ms, 50);
        assert_eq!(config.driver.dispatch_interval_ms, 100);
        assert_eq!(config.driver.halt_duration_ms, 1000);
        assert_eq!(config.driver.halt_interval_ms, 10);
        assert!(config.collision.is_none());
    }

    #[test]
    fn test_minimal_toml() {
        let config = Config::from_toml(
            r#"
[device]
name = "bb8"
port = "/dev/rfcomm1"
"#,
        )
        .unwrap();

        assert_eq!(config.device.name, "bb8");
        assert_eq!(config.device.device_type, "sphero");
        assert_eq!(config.driver.queue_capacity, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_toml() {
        let config = Config::from_toml(
            r#"
[device]
name = "ollie"
type = "sphero"
port = "/dev/ttyUSB0"
baud_rate = 57600

[driver]
sync_timeout_ms = 200
dispatch_interval_ms = 50

[collision]
method = 1
x_threshold = 64
y_threshold = 64
dead_time = 32

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.device.baud_rate, 57600);
        assert_eq!(config.driver.sync_timeout_ms, 200);
        assert_eq!(config.driver.halt_interval_ms, 10);

        let collision = config.collision.unwrap();
        assert_eq!(collision.x_threshold, 64);
        assert_eq!(collision.x_speed, 0x80); // Unset fields keep defaults
        assert_eq!(collision.dead_time, 32);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_device_is_an_error() {
        assert!(Config::from_toml("[logging]\nlevel = \"warn\"").is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_string = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[driver]"));
        assert!(toml_string.contains("type = \"sphero\""));
        assert!(!toml_string.contains("[collision]"));
    }
}
