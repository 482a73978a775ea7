//! Persisted retention tunables.
//!
//! The record lives at `<dir>/sensorreader.json` and holds exactly two
//! fields:
//!
//! ```json
//! { "Interval": 60, "TimeFrame": 10 }
//! ```
//!
//! Loading never fails. A missing, unreadable or malformed record (or one
//! holding a zero) is replaced with the defaults, and the defaults are
//! written back so the file is valid after every load.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// File name of the persisted record inside the config directory.
pub const CONFIG_FILE: &str = "sensorreader.json";

/// Default poll interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default retention window in minutes.
pub const DEFAULT_TIME_FRAME_MINS: u64 = 10;

const SECONDS_PER_MINUTE: u64 = 60;

/// Poll interval and retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Seconds between ticks.
    #[serde(rename = "Interval")]
    pub interval: u64,
    /// Minutes of history to retain.
    #[serde(rename = "TimeFrame")]
    pub time_frame: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
            time_frame: DEFAULT_TIME_FRAME_MINS,
        }
    }
}

impl HistoryConfig {
    /// Build a config, refusing zero for either field.
    pub fn new(interval: u64, time_frame: u64) -> Result<Self> {
        let cfg = Self {
            interval,
            time_frame,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(ConfigError::InvalidValue { field: "interval" });
        }
        if self.time_frame == 0 {
            return Err(ConfigError::InvalidValue {
                field: "time_frame",
            });
        }
        Ok(())
    }

    /// Number of samples retained per sensor: `floor(time_frame * 60 / interval)`,
    /// never less than one.
    pub fn capacity(&self) -> usize {
        let interval = self.interval.max(1);
        let samples = self.time_frame.saturating_mul(SECONDS_PER_MINUTE) / interval;
        usize::try_from(samples).unwrap_or(usize::MAX).max(1)
    }
}

/// File-backed store for [`HistoryConfig`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at `dir`. Nothing touches the filesystem until
    /// [`load`](Self::load) or [`save`](Self::save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the record.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the record.
    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Load the persisted config, healing the file with defaults when it is
    /// missing or unusable.
    pub fn load(&self) -> HistoryConfig {
        match self.try_load() {
            Ok(cfg) => {
                info!(
                    "loaded sensor history config interval={}s time_frame={}m",
                    cfg.interval, cfg.time_frame
                );
                cfg
            }
            Err(e) => {
                warn!(
                    "sensor history config unusable ({e}), restoring defaults at {}",
                    self.path().display()
                );
                let cfg = HistoryConfig::default();
                self.save(&cfg);
                cfg
            }
        }
    }

    /// Load without any fallback.
    pub fn try_load(&self) -> Result<HistoryConfig> {
        let path = self.path();
        let content =
            fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?;
        let cfg: HistoryConfig = serde_json::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist `cfg`. Failures are logged; the caller keeps its in-memory copy.
    pub fn save(&self, cfg: &HistoryConfig) {
        if let Err(e) = self.try_save(cfg) {
            error!("unable to persist sensor history config: {e}");
        }
    }

    /// Persist `cfg`, creating the directory if needed.
    pub fn try_save(&self, cfg: &HistoryConfig) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(cfg)?;
        let path = self.path();
        fs::write(&path, json).map_err(|source| ConfigError::Io { path, source })
    }
}
