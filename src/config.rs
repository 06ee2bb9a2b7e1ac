//! Configuration for the IAQ monitor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "IAQ_DB";

/// Environment variable overriding the simulator's target API.
pub const API_ENV: &str = "IAQ_API";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding readings and events
    pub db_path: PathBuf,

    /// HTTP server settings
    pub server: ServerSettings,

    /// Site used when a reading or query does not name one
    pub default_site: String,

    /// Exposure window used when a query does not give one
    pub default_window: String,

    /// IANA timezone for CLI timestamps
    pub display_timezone: String,

    /// Simulator settings
    pub simulator: SimulatorSettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iaq-monitor");

        Self {
            db_path: data_dir.join("iaq.db"),
            server: ServerSettings::default(),
            default_site: "Lab".to_string(),
            default_window: "24h".to_string(),
            display_timezone: "UTC".to_string(),
            simulator: SimulatorSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iaq-monitor")
            .join("config.json")
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(DB_ENV).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(api) = lookup(API_ENV).filter(|v| !v.is_empty()) {
            self.simulator.api = api;
        }
    }

    /// Parse the display timezone.
    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.display_timezone
            .parse()
            .map_err(|_| ConfigError::ParseError(format!("unknown timezone '{}'", self.display_timezone)))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Base URL of the ingest API
    pub api: String,

    /// Nominal time between posts
    #[serde(with = "duration_serde")]
    pub period: Duration,

    /// Random jitter as a fraction of the period
    pub jitter: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            api: "http://127.0.0.1:8000".to_string(),
            period: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
