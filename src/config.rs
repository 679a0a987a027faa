use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::TetsundoError;
use crate::catalog::{DEFAULT_CHANNEL_ID, DEFAULT_MAX_RESULTS, DEFAULT_RECOMMENDATION_COUNT};
use crate::progress::{DEFAULT_STORAGE_KEY, FileStorage, MemoryStorage, ProgressStorage};
use crate::report::ErrorReporter;
use crate::watch::{DEFAULT_COMPLETION_THRESHOLD, MonitorConfig};

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "tetsundo";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub storage_key: String,
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Railway reference data to use instead of the bundled lines
    pub network_file: Option<PathBuf>,
    pub sample_interval_ms: u64,
    pub completion_threshold: f64,
    pub journal_enabled: bool,
    pub youtube_channel_id: String,
    pub youtube_api_key: Option<String>,
    pub max_results: u32,
    pub recommendation_count: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: None,
            network_file: None,
            sample_interval_ms: 1000,
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            journal_enabled: true,
            youtube_channel_id: DEFAULT_CHANNEL_ID.to_string(),
            youtube_api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
            recommendation_count: DEFAULT_RECOMMENDATION_COUNT,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/tetsundo/config.json`
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the user's config file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn from_local_file() -> Self {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                log::warn!("No config directory on this platform, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| TetsundoError::ConfigIOError { source: e })
            .and_then(|content| {
                serde_json::from_str::<Self>(&content)
                    .map_err(|e| TetsundoError::ConfigSerializeError { source: e })
            });
        match parsed {
            Ok(config) => config.validated(),
            Err(e) => {
                log::warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Replace out of range values with their defaults.
    fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !(self.completion_threshold > 0. && self.completion_threshold <= 1.) {
            log::warn!(
                "completion_threshold {} out of range, using {}",
                self.completion_threshold,
                defaults.completion_threshold
            );
            self.completion_threshold = defaults.completion_threshold;
        }
        if self.sample_interval_ms == 0 {
            log::warn!("sample_interval_ms must be positive, using {}", defaults.sample_interval_ms);
            self.sample_interval_ms = defaults.sample_interval_ms;
        }
        if self.storage_key.trim().is_empty() {
            self.storage_key = defaults.storage_key;
        }
        self
    }

    pub fn save(&self) -> Result<(), TetsundoError> {
        let path = Self::default_path().ok_or(TetsundoError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TetsundoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TetsundoError::ConfigIOError { source: e })?;
        }

        let file =
            std::fs::File::create(path).map_err(|e| TetsundoError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| TetsundoError::ConfigSerializeError { source: e })
    }

    /// Directory holding the progress records and the journal.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, TetsundoError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or(TetsundoError::NoDataDir)?
                .join(APP_DIR_NAME)),
        }
    }

    /// Progress storage in the data directory, along with that directory.
    ///
    /// When the directory cannot be resolved or created the failure is
    /// reported and progress lives in memory for this run, so exercising is
    /// never blocked. No directory is returned in that case.
    pub fn open_storage(
        &self,
        reporter: &dyn ErrorReporter,
    ) -> (Box<dyn ProgressStorage>, Option<PathBuf>) {
        let opened = self.resolve_data_dir().and_then(|dir| {
            let storage = FileStorage::new(dir.clone())?;
            Ok((storage, dir))
        });
        match opened {
            Ok((storage, dir)) => (Box::new(storage), Some(dir)),
            Err(e) => {
                reporter.report("storage.open", &e);
                (Box::new(MemoryStorage::new()), None)
            }
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            threshold: self.completion_threshold,
            sample_interval: Duration::from_millis(self.sample_interval_ms),
        }
    }
}
