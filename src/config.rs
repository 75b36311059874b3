//! Configuration types for gallery downloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of files fetched concurrently within one batch.
pub const MAX_CONCURRENT: usize = 4;

/// Configuration for download operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of files fetched concurrently in each batch.
    pub max_concurrent: usize,
    /// Seconds without a body chunk before a file fetch is failed.
    /// `None` waits forever.
    pub stall_timeout_secs: Option<u64>,
    /// Whether to overwrite existing files when saving.
    pub force_overwrite: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT,
            stall_timeout_secs: Some(60),
            force_overwrite: false,
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size. Zero is treated as one.
    #[must_use]
    pub const fn with_max_concurrent(mut self, concurrent: usize) -> Self {
        self.max_concurrent = concurrent;
        self
    }

    /// Sets the stall timeout in seconds.
    #[must_use]
    pub const fn with_stall_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.stall_timeout_secs = secs;
        self
    }

    /// Sets whether to force overwrite existing files.
    #[must_use]
    pub const fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    /// Effective batch size, never zero.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Stall timeout as a [`Duration`].
    #[must_use]
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }
}

/// Gallery API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST API, e.g. `https://studio.example/api`.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
        }
    }
}

/// Path configuration for downloads and configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory where archives and single files are saved.
    pub download_dir: PathBuf,
    /// Directory where `config.toml` is read from.
    pub config_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            download_dir: PathBuf::from("."),
            config_dir: config_dir.join("gallery-fetch"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
    /// Gallery API configuration.
    pub api: ApiConfig,
    /// Path configuration.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathConfig::default().config_dir.join("config.toml")
    }

    /// Loads configuration from `path`, or from [`default_path`](Self::default_path)
    /// when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml(&contents)
            }
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML for this schema.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
