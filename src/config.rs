//! Configuration for the funscript copilot.

use crate::core::pca::DEFAULT_AMNESIC;
use crate::core::turnpoints::TurnpointConfig;
use crate::session::queue::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Eigenbasis estimator settings
    pub estimator: EstimatorConfig,

    /// Signal batching and output values
    pub signal: SignalConfig,

    /// Editor connection settings
    pub session: SessionConfig,

    /// Path for exported funscripts
    pub export_path: PathBuf,

    /// Path for persisted stats
    pub data_path: PathBuf,

    /// Write a funscript of each activation's actions
    pub export_funscript: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("funscript-copilot");

        Self {
            estimator: EstimatorConfig::default(),
            signal: SignalConfig::default(),
            session: SessionConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            export_funscript: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("funscript-copilot")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }
}

/// Settings of the incremental eigenbasis estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Number of tracked directions (at least 2)
    pub n_components: usize,
    /// Amnesic constant of the weighting schedule
    pub amnesic: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            amnesic: DEFAULT_AMNESIC,
        }
    }
}

/// Settings of the batching and turnpoint stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Seconds of video per estimator batch
    pub batch_duration_secs: f64,
    /// Position emitted at a bottom turnpoint
    pub bottom_value: i32,
    /// Position emitted at a top turnpoint
    pub top_value: i32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let turnpoints = TurnpointConfig::default();
        Self {
            batch_duration_secs: 1.1,
            bottom_value: turnpoints.bottom_value,
            top_value: turnpoints.top_value,
        }
    }
}

impl SignalConfig {
    pub fn turnpoints(&self) -> TurnpointConfig {
        TurnpointConfig {
            bottom_value: self.bottom_value,
            top_value: self.top_value,
        }
    }
}

/// Settings of the editor WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// WebSocket endpoint path
    pub path: String,
    /// Pending actions kept while the editor is slow or absent
    pub queue_capacity: usize,
    /// Idle wait of the producer and of the processing loop
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Wait between connection attempts
    #[serde(with = "duration_ms")]
    pub reconnect_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path: "/ofs".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(200),
            reconnect_interval: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// WebSocket URL of the editor.
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Serde support for Duration as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.estimator.n_components, 2);
        assert_eq!(config.estimator.amnesic, 2.0);
        assert_eq!(config.signal.bottom_value, 0);
        assert_eq!(config.signal.top_value, 100);
        assert_eq!(config.session.queue_capacity, 2048);
        assert_eq!(config.session.poll_interval, Duration::from_millis(200));
        assert!(!config.export_funscript);
    }

    #[test]
    fn test_session_url() {
        assert_eq!(SessionConfig::default().url(), "ws://localhost:8080/ofs");
    }

    #[test]
    fn test_durations_as_millis() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["session"]["poll_interval"], 200);
        assert_eq!(json["session"]["reconnect_interval"], 2000);

        let parsed: Config = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.session.reconnect_interval, Duration::from_secs(2));
    }
}
