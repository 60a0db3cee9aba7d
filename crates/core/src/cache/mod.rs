//! SQLite-backed store for folder fingerprints and their audit trail.
//!
//! This module provides a persistent cache state store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Per-folder hash records with whole-record, revisioned writes
//! - Atomic read-modify-write via [`CacheDb::update_record`]
//! - Append-only history and change logs with age-based deletion
//! - Automatic schema migrations
//! - WAL mode with full synchronous commits

pub mod connection;
pub mod hash;
pub mod history;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::{FolderHasher, compute_folder_hash};
pub use history::{CacheSnapshot, ChangeRecord, HistoryEntry, HistoryEventType, NewChange, NewHistoryEntry};
pub use records::{CacheStats, FolderHashRecord, RecordUpdate};
