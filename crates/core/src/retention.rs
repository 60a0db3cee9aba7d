//! History retention.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::CacheDb;

/// Largest accepted retention window, in hours (100 years).
pub const MAX_RETENTION_HOURS: f64 = 876_000.0;

/// Counts removed by a retention cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub history_removed: u64,
    pub changes_removed: u64,
}

/// Prunes history and change entries by age.
///
/// `retention_hours` is expected to be a positive finite number; callers
/// validate it before it reaches this type.
#[derive(Clone)]
pub struct HistoryRetention {
    db: CacheDb,
    default_hours: f64,
}

impl HistoryRetention {
    pub fn new(db: CacheDb, default_hours: f64) -> Self {
        Self { db, default_hours }
    }

    /// Remove entries strictly older than `now - retention_hours`.
    pub async fn cleanup_history(&self, retention_hours: f64) -> Result<CleanupOutcome, Error> {
        self.cleanup_history_at(Utc::now(), retention_hours).await
    }

    /// [`Self::cleanup_history`] with the configured window when `None`.
    pub async fn cleanup_history_or_default(&self, retention_hours: Option<f64>) -> Result<CleanupOutcome, Error> {
        self.cleanup_history(retention_hours.unwrap_or(self.default_hours)).await
    }

    /// Cleanup relative to an explicit `now`.
    ///
    /// A window reaching past the earliest representable timestamp removes
    /// nothing.
    pub async fn cleanup_history_at(&self, now: DateTime<Utc>, retention_hours: f64) -> Result<CleanupOutcome, Error> {
        let cutoff = TimeDelta::try_milliseconds((retention_hours * 3_600_000.0).round() as i64)
            .and_then(|window| now.trunc_subsecs(3).checked_sub_signed(window));
        let Some(cutoff) = cutoff else {
            tracing::debug!(retention_hours, "retention window exceeds the representable range; nothing removed");
            return Ok(CleanupOutcome::default());
        };

        let history_removed = self.db.delete_history_older_than(cutoff).await?;
        let changes_removed = self.db.delete_changes_older_than(cutoff).await?;

        tracing::info!(%cutoff, history_removed, changes_removed, "history cleanup finished");

        Ok(CleanupOutcome { history_removed, changes_removed })
    }

    /// Empty the history and change logs. Irreversible; records are kept.
    pub async fn clear_all_history(&self) -> Result<(), Error> {
        self.db.clear_all().await?;
        tracing::warn!("cleared all history and change entries");
        Ok(())
    }
}
