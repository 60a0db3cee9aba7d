//! Core of thumbwatch, the gallery thumbnail cache and invalidation engine.
//!
//! This crate provides:
//! - Cache store with SQLite backend (records, history, change log)
//! - Folder fingerprinting
//! - Cache status checks, thumbnail rebuilds and history retention
//! - The background scan scheduler
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod rebuild;
pub mod retention;
pub mod scheduler;
pub mod source;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheStats, FolderHashRecord};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use rebuild::{RebuildOutcome, Rebuilder};
pub use retention::{CleanupOutcome, HistoryRetention, MAX_RETENTION_HOURS};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, TickSummary};
pub use source::{ImageEntry, ImageSource, ThumbnailArtifact, ThumbnailGenerator, normalize_folder_path};
pub use status::{FolderStatus, ScanOutcome, StatusService};
