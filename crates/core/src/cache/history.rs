//! History and change log operations.
//!
//! Both tables are append-only. Rows leave them only through the
//! age-based deletes or [`CacheDb::clear_all`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, Row, types::Type};

use super::connection::CacheDb;
use super::records::{FolderHashRecord, format_timestamp, parse_timestamp, select_all_records};
use crate::Error;

/// Kind of a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventType {
    Scan,
    Rebuild,
    Error,
}

impl HistoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::Scan => "scan",
            HistoryEventType::Rebuild => "rebuild",
            HistoryEventType::Error => "error",
        }
    }
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(HistoryEventType::Scan),
            "rebuild" => Ok(HistoryEventType::Rebuild),
            "error" => Ok(HistoryEventType::Error),
            other => Err(Error::InvalidInput(format!("unknown history event type: {other}"))),
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub folder_path: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: HistoryEventType,
    pub detail: String,
}

/// An audit entry to append.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub folder_path: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: HistoryEventType,
    pub detail: String,
}

impl NewHistoryEntry {
    /// Entry stamped with the current time.
    pub fn now(folder_path: impl Into<String>, event_type: HistoryEventType, detail: impl Into<String>) -> Self {
        Self { folder_path: folder_path.into(), timestamp: Utc::now(), event_type, detail: detail.into() }
    }
}

/// A stored fingerprint change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: i64,
    pub folder_path: String,
    pub timestamp: DateTime<Utc>,
    pub from_hash: String,
    pub to_hash: String,
}

/// A fingerprint change to append.
#[derive(Debug, Clone)]
pub struct NewChange {
    pub folder_path: String,
    pub timestamp: DateTime<Utc>,
    pub from_hash: String,
    pub to_hash: String,
}

/// Records, history and changes read in a single transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub records: Vec<FolderHashRecord>,
    pub history: Vec<HistoryEntry>,
    pub changes: Vec<ChangeRecord>,
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let raw_type: String = row.get(3)?;
    let event_type = raw_type
        .parse::<HistoryEventType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.to_string().into()))?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        folder_path: row.get(1)?,
        timestamp: parse_timestamp(row, 2)?,
        event_type,
        detail: row.get(4)?,
    })
}

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeRecord> {
    Ok(ChangeRecord {
        id: row.get(0)?,
        folder_path: row.get(1)?,
        timestamp: parse_timestamp(row, 2)?,
        from_hash: row.get(3)?,
        to_hash: row.get(4)?,
    })
}

pub(super) fn insert_change(conn: &Connection, change: &NewChange) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO changes (folder_path, timestamp, from_hash, to_hash) VALUES (?1, ?2, ?3, ?4)",
        params![&change.folder_path, format_timestamp(&change.timestamp), &change.from_hash, &change.to_hash],
    )?;
    Ok(conn.last_insert_rowid())
}

impl CacheDb {
    /// Append an audit entry and return its id.
    pub async fn append_history(&self, entry: NewHistoryEntry) -> Result<i64, Error> {
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO history (folder_path, timestamp, event_type, detail) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &entry.folder_path,
                        format_timestamp(&entry.timestamp),
                        entry.event_type.as_str(),
                        &entry.detail
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Append a fingerprint change and return its id.
    pub async fn append_change(&self, change: NewChange) -> Result<i64, Error> {
        self.conn
            .call(move |conn| -> Result<i64, Error> { insert_change(conn, &change) })
            .await
            .map_err(Error::from)
    }

    /// Read records, history and changes at a single point in time.
    pub async fn list_all(&self) -> Result<CacheSnapshot, Error> {
        self.conn
            .call(|conn| -> Result<CacheSnapshot, Error> {
                let tx = conn.transaction()?;
                let records = select_all_records(&tx)?;

                let history = {
                    let mut stmt = tx.prepare(
                        "SELECT id, folder_path, timestamp, event_type, detail FROM history ORDER BY timestamp, id",
                    )?;
                    stmt.query_map([], history_from_row)?
                        .collect::<Result<Vec<_>, _>>()?
                };

                let changes = {
                    let mut stmt = tx.prepare(
                        "SELECT id, folder_path, timestamp, from_hash, to_hash FROM changes ORDER BY timestamp, id",
                    )?;
                    stmt.query_map([], change_from_row)?
                        .collect::<Result<Vec<_>, _>>()?
                };

                tx.commit()?;
                Ok(CacheSnapshot { records, history, changes })
            })
            .await
            .map_err(Error::from)
    }

    /// Delete history entries strictly older than `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_history_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = format_timestamp(&cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM history WHERE timestamp < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete change entries strictly older than `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_changes_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = format_timestamp(&cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM changes WHERE timestamp < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove every history and change entry. Folder records are kept.
    pub async fn clear_all(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM history", [])?;
                tx.execute("DELETE FROM changes", [])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    #[tokio::test]
    async fn test_append_and_list() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now().trunc_subsecs(3);

        let id = db
            .append_history(NewHistoryEntry {
                folder_path: "landscapes".into(),
                timestamp: now,
                event_type: HistoryEventType::Rebuild,
                detail: "generated 2 thumbnails".into(),
            })
            .await
            .unwrap();

        let snapshot = db.list_all().await.unwrap();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].id, id);
        assert_eq!(snapshot.history[0].timestamp, now);
        assert_eq!(snapshot.history[0].event_type, HistoryEventType::Rebuild);
        assert!(snapshot.changes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_older_than_is_strict() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cutoff = Utc::now().trunc_subsecs(3) - Duration::hours(24);

        for ts in [cutoff - Duration::milliseconds(1), cutoff, cutoff + Duration::hours(1)] {
            db.append_history(NewHistoryEntry {
                folder_path: "a".into(),
                timestamp: ts,
                event_type: HistoryEventType::Scan,
                detail: String::new(),
            })
            .await
            .unwrap();
            db.append_change(NewChange { folder_path: "a".into(), timestamp: ts, from_hash: "h1".into(), to_hash: "h2".into() })
                .await
                .unwrap();
        }

        assert_eq!(db.delete_history_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(db.delete_changes_older_than(cutoff).await.unwrap(), 1);

        let snapshot = db.list_all().await.unwrap();
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.changes.len(), 2);
        assert!(snapshot.history.iter().all(|h| h.timestamp >= cutoff));
    }

    #[tokio::test]
    async fn test_clear_all_keeps_records() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_record(&FolderHashRecord::new("a", "h1", Utc::now())).await.unwrap();
        db.append_history(NewHistoryEntry::now("a", HistoryEventType::Scan, "new folder"))
            .await
            .unwrap();
        db.append_change(NewChange { folder_path: "a".into(), timestamp: Utc::now(), from_hash: "h0".into(), to_hash: "h1".into() })
            .await
            .unwrap();

        db.clear_all().await.unwrap();

        let snapshot = db.list_all().await.unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.history.is_empty());
        assert!(snapshot.changes.is_empty());
    }

    #[test]
    fn test_event_type_round_trip() {
        for event in [HistoryEventType::Scan, HistoryEventType::Rebuild, HistoryEventType::Error] {
            assert_eq!(event.as_str().parse::<HistoryEventType>().unwrap(), event);
        }
        assert!("purge".parse::<HistoryEventType>().is_err());
    }
}
