use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Get the local data directory for hourglass.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("hourglass");
    Ok(path)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Pipeline settings, read from `config.toml` in the data directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `SQLite` database shared with the event producer
    pub db_path: PathBuf,
    /// JSON category rule file
    pub categories_path: PathBuf,
    /// Seconds between scheduled cycles
    pub interval_secs: u64,
    /// Hours re-aggregated behind the hourly watermark
    pub hourly_lookback_hours: u32,
    /// Days re-aggregated behind the daily watermark
    pub daily_lookback_days: u32,
    /// First retry delay after a failed cycle
    pub retry_initial_secs: u64,
    /// Upper bound of the retry delay
    pub retry_max_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = get_data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            db_path: data_dir.join("hourglass.db"),
            categories_path: data_dir.join("app_categories.json"),
            interval_secs: 300,
            hourly_lookback_hours: 2,
            daily_lookback_days: 1,
            retry_initial_secs: 30,
            retry_max_secs: 900,
        }
    }
}

impl PipelineConfig {
    /// Default location of the config file
    ///
    /// # Errors
    ///
    /// Returns an error if the local data directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_data_dir()?.join("config.toml"))
    }

    /// Load the config file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first inconsistent setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "interval_secs must be greater than 0",
            )));
        }
        // The newest aggregated hour may still be receiving events
        if self.hourly_lookback_hours == 0 {
            return Err(ConfigError::Invalid(String::from(
                "hourly_lookback_hours must be at least 1",
            )));
        }
        if self.retry_initial_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "retry_initial_secs must be greater than 0",
            )));
        }
        if self.retry_max_secs < self.retry_initial_secs {
            return Err(ConfigError::Invalid(String::from(
                "retry_max_secs must not be below retry_initial_secs",
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn hourly_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.hourly_lookback_hours))
    }

    #[must_use]
    pub fn daily_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.daily_lookback_days))
    }
}
