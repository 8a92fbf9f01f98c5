use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{LogKind, RetentionPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Runtime settings for the logger.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```toml
/// log_dir = "/var/lib/sensor-logger"
/// prune_interval_secs = 600
///
/// [retention]
/// raw_secs = 172800
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Directory holding `log_raw.txt`, `log_hour.txt` and `log_day.txt`
    pub log_dir: PathBuf,
    pub baud_rate: u32,
    /// Sleep between polls when the device has nothing to read
    pub poll_interval_ms: u64,
    /// Minimum wall-clock seconds between two pruning passes
    pub prune_interval_secs: u64,
    pub retention: RetentionConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            baud_rate: 9600,
            poll_interval_ms: 10,
            prune_interval_secs: 3600,
            retention: RetentionConfig::default(),
        }
    }
}

impl LoggerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Maximum record age per log, in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub raw_secs: u64,
    pub hourly_secs: u64,
    pub daily_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_secs: LogKind::Raw.default_max_age_secs(),
            hourly_secs: LogKind::Hourly.default_max_age_secs(),
            daily_secs: LogKind::Daily.default_max_age_secs(),
        }
    }
}

impl RetentionConfig {
    pub const fn max_age_secs(&self, kind: LogKind) -> u64 {
        match kind {
            LogKind::Raw => self.raw_secs,
            LogKind::Hourly => self.hourly_secs,
            LogKind::Daily => self.daily_secs,
        }
    }

    /// One policy per log, in pruning order
    pub fn policies(&self) -> [RetentionPolicy; 3] {
        LogKind::ALL.map(|kind| RetentionPolicy::new(kind, self.max_age_secs(kind)))
    }
}
