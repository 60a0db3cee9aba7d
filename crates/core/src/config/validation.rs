//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::retention::MAX_RETENTION_HOURS;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `scan_interval_secs` is 0 or exceeds one day
    /// - `scan_concurrency`, `batch_limit` or `batch_concurrency` is 0
    /// - `retention_hours` is not a positive number up to [`MAX_RETENTION_HOURS`]
    /// - `thumbnail_size` is outside 16..=4096
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scan_interval_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.scan_interval_secs > 86_400 {
            return Err(ConfigError::Invalid {
                field: "scan_interval_secs".into(),
                reason: "must not exceed one day (86400s)".into(),
            });
        }

        if self.scan_concurrency == 0 {
            return Err(ConfigError::Invalid { field: "scan_concurrency".into(), reason: "must be at least 1".into() });
        }
        if self.batch_limit == 0 {
            return Err(ConfigError::Invalid { field: "batch_limit".into(), reason: "must be at least 1".into() });
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Invalid { field: "batch_concurrency".into(), reason: "must be at least 1".into() });
        }

        if !(self.retention_hours > 0.0 && self.retention_hours <= MAX_RETENTION_HOURS) {
            return Err(ConfigError::Invalid {
                field: "retention_hours".into(),
                reason: format!("must be a positive number no greater than {MAX_RETENTION_HOURS}"),
            });
        }

        if !(16..=4096).contains(&self.thumbnail_size) {
            return Err(ConfigError::Invalid {
                field: "thumbnail_size".into(),
                reason: "must be between 16 and 4096 pixels".into(),
            });
        }

        if self.thumbs_dir.starts_with(&self.gallery_root) {
            tracing::warn!(
                thumbs_dir = %self.thumbs_dir.display(),
                gallery_root = %self.gallery_root.display(),
                "thumbs_dir lies inside gallery_root; it will be skipped during folder enumeration"
            );
        }

        Ok(())
    }
}
