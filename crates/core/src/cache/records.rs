//! Folder hash record operations.
//!
//! Records are keyed by normalized folder path. Every write replaces the whole
//! row and bumps its `revision`, so readers never observe a record assembled
//! from two different writes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, OptionalExtension, Row, types::Type};

use super::connection::CacheDb;
use super::history::{NewChange, insert_change};
use crate::Error;

/// Cache state of one gallery folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderHashRecord {
    pub folder_path: String,
    /// Fingerprint at the last successful thumbnail build.
    pub previous_hash: Option<String>,
    /// Fingerprint computed at the last scan.
    pub current_hash: String,
    pub last_scanned_at: DateTime<Utc>,
    pub last_built_at: Option<DateTime<Utc>>,
    pub thumbnail_count: u32,
    /// Incremented by the store on every write; 0 for a record never written.
    #[serde(default)]
    pub revision: i64,
}

impl FolderHashRecord {
    /// A record for a folder seen for the first time.
    pub fn new(folder_path: impl Into<String>, current_hash: impl Into<String>, scanned_at: DateTime<Utc>) -> Self {
        Self {
            folder_path: folder_path.into(),
            previous_hash: None,
            current_hash: current_hash.into(),
            last_scanned_at: scanned_at,
            last_built_at: None,
            thumbnail_count: 0,
            revision: 0,
        }
    }

    /// True when the thumbnails were built from the current contents.
    pub fn is_current(&self) -> bool {
        self.previous_hash.as_deref() == Some(self.current_hash.as_str())
    }
}

/// Aggregate counts over all records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: usize,
    /// Records whose previous hash equals the current hash.
    pub matching: usize,
    /// Records with a previous hash that differs from the current hash.
    pub changed: usize,
    /// Records that were never built.
    pub new_folders: usize,
}

impl CacheStats {
    pub fn from_records(records: &[FolderHashRecord]) -> Self {
        let mut stats = CacheStats { total: records.len(), ..Default::default() };
        for record in records {
            match &record.previous_hash {
                None => stats.new_folders += 1,
                Some(previous) if *previous == record.current_hash => stats.matching += 1,
                Some(_) => stats.changed += 1,
            }
        }
        stats
    }
}

/// Result of an atomic read-modify-write, see [`CacheDb::update_record`].
#[derive(Debug)]
pub struct RecordUpdate<T> {
    /// Replacement for the whole record.
    pub record: FolderHashRecord,
    /// Change entry committed in the same transaction.
    pub change: Option<NewChange>,
    pub output: T,
}

/// Fixed-width RFC 3339 form; lexical order matches chronological order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

const RECORD_COLUMNS: &str =
    "folder_path, previous_hash, current_hash, last_scanned_at, last_built_at, thumbnail_count, revision";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FolderHashRecord> {
    Ok(FolderHashRecord {
        folder_path: row.get(0)?,
        previous_hash: row.get(1)?,
        current_hash: row.get(2)?,
        last_scanned_at: parse_timestamp(row, 3)?,
        last_built_at: parse_optional_timestamp(row, 4)?,
        thumbnail_count: row.get(5)?,
        revision: row.get(6)?,
    })
}

pub(super) fn select_record(conn: &Connection, folder_path: &str) -> Result<Option<FolderHashRecord>, Error> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM folder_hashes WHERE folder_path = ?1");
    let record = conn
        .query_row(&sql, params![folder_path], record_from_row)
        .optional()?;
    Ok(record)
}

pub(super) fn select_all_records(conn: &Connection) -> Result<Vec<FolderHashRecord>, Error> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM folder_hashes ORDER BY folder_path");
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Replace the row for `record.folder_path` and return the stored record.
fn write_record(conn: &Connection, record: &FolderHashRecord) -> Result<FolderHashRecord, Error> {
    let revision: i64 = conn.query_row(
        "INSERT INTO folder_hashes (
            folder_path, previous_hash, current_hash, last_scanned_at,
            last_built_at, thumbnail_count, revision
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
        ON CONFLICT(folder_path) DO UPDATE SET
            previous_hash = excluded.previous_hash,
            current_hash = excluded.current_hash,
            last_scanned_at = excluded.last_scanned_at,
            last_built_at = excluded.last_built_at,
            thumbnail_count = excluded.thumbnail_count,
            revision = folder_hashes.revision + 1
        RETURNING revision",
        params![
            &record.folder_path,
            &record.previous_hash,
            &record.current_hash,
            format_timestamp(&record.last_scanned_at),
            record.last_built_at.as_ref().map(format_timestamp),
            record.thumbnail_count,
        ],
        |row| row.get(0),
    )?;

    let mut stored = record.clone();
    stored.last_scanned_at = truncate_millis(&record.last_scanned_at);
    stored.last_built_at = record.last_built_at.as_ref().map(truncate_millis);
    stored.revision = revision;
    Ok(stored)
}

fn truncate_millis(ts: &DateTime<Utc>) -> DateTime<Utc> {
    use chrono::SubsecRound;
    ts.trunc_subsecs(3)
}

impl CacheDb {
    /// Get the record for a folder.
    ///
    /// Returns None if the folder has never been scanned.
    pub async fn get_record(&self, folder_path: &str) -> Result<Option<FolderHashRecord>, Error> {
        let folder_path = folder_path.to_string();
        self.conn
            .call(move |conn| -> Result<Option<FolderHashRecord>, Error> { select_record(conn, &folder_path) })
            .await
            .map_err(Error::from)
    }

    /// Insert or fully replace a record (last writer wins).
    ///
    /// Returns the stored record with its new revision.
    pub async fn upsert_record(&self, record: &FolderHashRecord) -> Result<FolderHashRecord, Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<FolderHashRecord, Error> { write_record(conn, &record) })
            .await
            .map_err(Error::from)
    }

    /// Atomically read, transform and write the record for `folder_path`.
    ///
    /// `f` receives the stored record (if any) and returns the full
    /// replacement, plus an optional change entry. Read, write and change
    /// insert commit in one transaction, so concurrent updates of the same
    /// folder are linearized.
    pub async fn update_record<F, T>(&self, folder_path: &str, f: F) -> Result<(FolderHashRecord, T), Error>
    where
        F: FnOnce(Option<FolderHashRecord>) -> RecordUpdate<T> + Send + 'static,
        T: Send + 'static,
    {
        let folder_path = folder_path.to_string();
        self.conn
            .call(move |conn| -> Result<(FolderHashRecord, T), Error> {
                let tx = conn.transaction()?;
                let existing = select_record(&tx, &folder_path)?;

                let mut update = f(existing);
                update.record.folder_path = folder_path;

                let stored = write_record(&tx, &update.record)?;
                if let Some(change) = &update.change {
                    insert_change(&tx, change)?;
                }
                tx.commit()?;

                Ok((stored, update.output))
            })
            .await
            .map_err(Error::from)
    }

    /// All records, ordered by folder path.
    pub async fn list_records(&self) -> Result<Vec<FolderHashRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<FolderHashRecord>, Error> { select_all_records(conn) })
            .await
            .map_err(Error::from)
    }

    /// Delete a folder's record.
    ///
    /// Returns true if a record existed.
    pub async fn delete_record(&self, folder_path: &str) -> Result<bool, Error> {
        let folder_path = folder_path.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM folder_hashes WHERE folder_path = ?1", params![folder_path])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
