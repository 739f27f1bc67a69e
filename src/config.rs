//! Configuration for the fatigue monitor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Drowsiness percentage at or above which a reading raises an alert
    pub alert_threshold: u8,

    /// Reference blink rate shown next to live readings (blinks/min)
    pub normal_blink_rate: f64,

    /// Period of the synthetic generator
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// Path for exported session data
    pub export_path: PathBuf,

    /// Path for the session history slot file
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fatigue-monitor");

        Self {
            alert_threshold: 70,
            normal_blink_rate: 17.0,
            tick_interval: Duration::from_secs(2),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fatigue-monitor")
            .join("config.json")
    }

    /// Path of the session history slot file.
    pub fn history_path(&self) -> PathBuf {
        self.data_path.join("history.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// The live evaluation inputs carried by this configuration.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            alert_threshold: self.alert_threshold.min(100),
            normal_blink_rate: self.normal_blink_rate,
        }
    }
}

/// Inputs read at the moment each reading is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub alert_threshold: u8,
    pub normal_blink_rate: f64,
}

impl Thresholds {
    pub fn alert_threshold_f64(&self) -> f64 {
        f64::from(self.alert_threshold)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Config::default().thresholds()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
