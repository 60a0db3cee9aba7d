//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (THUMBWATCH_*)
//! 2. TOML config file (if THUMBWATCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (THUMBWATCH_*)
/// 2. TOML config file (if THUMBWATCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of the gallery. The empty folder path refers to it.
    ///
    /// Set via THUMBWATCH_GALLERY_ROOT environment variable.
    #[serde(default = "default_gallery_root")]
    pub gallery_root: PathBuf,

    /// Directory that receives generated thumbnails.
    ///
    /// Set via THUMBWATCH_THUMBS_DIR environment variable.
    #[serde(default = "default_thumbs_dir")]
    pub thumbs_dir: PathBuf,

    /// Path to SQLite cache database.
    ///
    /// Set via THUMBWATCH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Seconds between two scheduler scans.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Folders checked concurrently during one scheduler tick.
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Maximum folder paths accepted by one batch status request.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Folders checked concurrently within one batch status request.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Retention window used when a cleanup request omits `retention_hours`.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: f64,

    /// Longest edge of generated thumbnails, in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Delete records whose folder disappeared from disk during a scan.
    #[serde(default)]
    pub prune_orphans: bool,

    /// Whether the background scheduler is started with the server.
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
}

fn default_gallery_root() -> PathBuf {
    PathBuf::from("./gallery")
}

fn default_thumbs_dir() -> PathBuf {
    PathBuf::from("./thumbnails")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./thumbwatch.sqlite")
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_scan_concurrency() -> usize {
    4
}

fn default_batch_limit() -> usize {
    100
}

fn default_batch_concurrency() -> usize {
    16
}

fn default_retention_hours() -> f64 {
    168.0 // one week
}

fn default_thumbnail_size() -> u32 {
    256
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gallery_root: default_gallery_root(),
            thumbs_dir: default_thumbs_dir(),
            db_path: default_db_path(),
            scan_interval_secs: default_scan_interval_secs(),
            scan_concurrency: default_scan_concurrency(),
            batch_limit: default_batch_limit(),
            batch_concurrency: default_batch_concurrency(),
            retention_hours: default_retention_hours(),
            thumbnail_size: default_thumbnail_size(),
            prune_orphans: false,
            scheduler_enabled: true,
        }
    }
}

impl AppConfig {
    /// Scheduler tick interval as Duration for use with tokio.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `THUMBWATCH_`
    /// 2. TOML file from `THUMBWATCH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("THUMBWATCH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("THUMBWATCH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
