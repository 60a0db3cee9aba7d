//! Cache status checks.
//!
//! A status check is read-mostly but not read-only: it always records the
//! freshly computed fingerprint as the folder's `current_hash`, creates the
//! record for a folder seen for the first time, and appends a change entry
//! when the fingerprint moved since the previous scan. That entry runs from
//! the stored `current_hash` to the fresh one, not from `previous_hash`, so
//! a folder that changes twice before a rebuild logs two consecutive steps.
//! `previous_hash` is never touched here; only a successful rebuild advances it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::Error;
use crate::cache::{CacheDb, FolderHashRecord, FolderHasher, NewChange, RecordUpdate};
use crate::source::{ImageSource, normalize_folder_path};

/// Cache status of one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    pub folder_path: String,
    pub is_current: bool,
    pub current_hash: String,
    pub previous_hash: Option<String>,
    pub thumbnail_count: u32,
    pub last_built_at: Option<DateTime<Utc>>,
}

impl From<&FolderHashRecord> for FolderStatus {
    fn from(record: &FolderHashRecord) -> Self {
        Self {
            folder_path: record.folder_path.clone(),
            is_current: record.is_current(),
            current_hash: record.current_hash.clone(),
            previous_hash: record.previous_hash.clone(),
            thumbnail_count: record.thumbnail_count,
            last_built_at: record.last_built_at,
        }
    }
}

/// What a scan observed relative to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    /// No record existed; one was created.
    New,
    /// Fingerprint equals the stored `current_hash`.
    Unchanged,
    /// Fingerprint differs from the stored `current_hash`; a change was logged.
    Changed,
}

/// Status check plus what it observed.
#[derive(Debug, Clone)]
pub struct StatusCheck {
    pub status: FolderStatus,
    pub outcome: ScanOutcome,
    /// Fingerprint of the last scan before this one.
    pub prior_hash: Option<String>,
}

/// Answers whether a folder's thumbnails match its contents.
#[derive(Clone)]
pub struct StatusService {
    db: CacheDb,
    hasher: FolderHasher,
    batch_limit: usize,
    batch_concurrency: usize,
}

impl StatusService {
    pub fn new(db: CacheDb, source: Arc<dyn ImageSource>, batch_limit: usize, batch_concurrency: usize) -> Self {
        Self { db, hasher: FolderHasher::new(source), batch_limit, batch_concurrency: batch_concurrency.max(1) }
    }

    /// Cache status of one folder, updating its stored record as a side effect.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the path cannot be normalized
    /// - `Io` if the folder cannot be listed; the stored record is left untouched
    /// - `Database` if the store is unavailable
    pub async fn get_folder_cache_status(&self, folder_path: &str) -> Result<FolderStatus, Error> {
        Ok(self.check_folder(folder_path).await?.status)
    }

    /// Like [`Self::get_folder_cache_status`], also reporting the scan outcome.
    pub async fn check_folder(&self, folder_path: &str) -> Result<StatusCheck, Error> {
        let folder_path = normalize_folder_path(folder_path)?;
        let fresh = self.hasher.compute(&folder_path).await?;
        let now = Utc::now();

        let (record, (outcome, prior_hash)) = self
            .db
            .update_record(&folder_path, move |existing| match existing {
                None => RecordUpdate {
                    record: FolderHashRecord::new(String::new(), fresh, now),
                    change: None,
                    output: (ScanOutcome::New, None),
                },
                Some(existing) if existing.current_hash == fresh => RecordUpdate {
                    output: (ScanOutcome::Unchanged, Some(existing.current_hash.clone())),
                    record: FolderHashRecord { last_scanned_at: now, ..existing },
                    change: None,
                },
                Some(existing) => {
                    let change = NewChange {
                        folder_path: existing.folder_path.clone(),
                        timestamp: now,
                        from_hash: existing.current_hash.clone(),
                        to_hash: fresh.clone(),
                    };
                    RecordUpdate {
                        output: (ScanOutcome::Changed, Some(existing.current_hash.clone())),
                        record: FolderHashRecord { current_hash: fresh, last_scanned_at: now, ..existing },
                        change: Some(change),
                    }
                }
            })
            .await?;

        tracing::debug!(
            folder = %record.folder_path,
            outcome = ?outcome,
            is_current = record.is_current(),
            "checked folder cache status"
        );

        Ok(StatusCheck { status: FolderStatus::from(&record), outcome, prior_hash })
    }

    /// Check several folders concurrently.
    ///
    /// The request is rejected with `InvalidInput` when empty or when it holds
    /// more than the configured batch limit of paths. Paths that normalize to the same
    /// key are checked once. A failing folder is reported in its own entry and
    /// never fails the batch.
    pub async fn get_folder_cache_status_batch(
        &self, folder_paths: &[String],
    ) -> Result<BTreeMap<String, Result<FolderStatus, Error>>, Error> {
        if folder_paths.is_empty() {
            return Err(Error::InvalidInput("folder_paths cannot be empty".into()));
        }
        if folder_paths.len() > self.batch_limit {
            return Err(Error::InvalidInput(format!(
                "at most {} folder paths per request, got {}",
                self.batch_limit,
                folder_paths.len()
            )));
        }

        let mut results = BTreeMap::new();
        let mut keys: Vec<String> = Vec::with_capacity(folder_paths.len());
        for raw in folder_paths {
            match normalize_folder_path(raw) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    results.insert(raw.clone(), Err(e));
                }
            }
        }
        keys.sort();
        keys.dedup();

        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));
        let mut join_set = JoinSet::new();

        for key in keys {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::InvalidInput(format!("batch cancelled: {e}")))?;
            let service = self.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let result = service.get_folder_cache_status(&key).await;
                (key, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, result)) => {
                    results.insert(key, result);
                }
                Err(e) => tracing::error!("batch status task failed: {e}"),
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::compute_folder_hash;
    use crate::testing::{MemorySource, image};

    async fn setup() -> (CacheDb, Arc<MemorySource>, StatusService) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let source = Arc::new(MemorySource::default());
        let service = StatusService::new(db.clone(), source.clone(), 100, 8);
        (db, source, service)
    }

    #[tokio::test]
    async fn test_new_folder_creates_record() {
        let (db, source, service) = setup().await;
        let images = vec![image("a.jpg", 10, 1), image("b.jpg", 20, 2)];
        source.set_folder("landscapes", images.clone());

        let check = service.check_folder("landscapes").await.unwrap();
        assert_eq!(check.outcome, ScanOutcome::New);
        assert!(!check.status.is_current);
        assert_eq!(check.status.previous_hash, None);
        assert_eq!(check.status.current_hash, compute_folder_hash(&images));

        let record = db.get_record("landscapes").await.unwrap().unwrap();
        assert_eq!(record.previous_hash, None);
        assert!(db.list_all().await.unwrap().changes.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_built_folder_is_current_twice() {
        let (db, source, service) = setup().await;
        let images = vec![image("a.jpg", 10, 1)];
        source.set_folder("a", images.clone());
        let hash = compute_folder_hash(&images);
        db.upsert_record(&FolderHashRecord {
            previous_hash: Some(hash.clone()),
            ..FolderHashRecord::new("a", hash.clone(), Utc::now())
        })
        .await
        .unwrap();

        for _ in 0..2 {
            let status = service.get_folder_cache_status("a").await.unwrap();
            assert!(status.is_current);
            assert_eq!(status.previous_hash.as_deref(), Some(hash.as_str()));
        }
        assert!(db.list_all().await.unwrap().changes.is_empty());
    }

    #[tokio::test]
    async fn test_change_detected_and_logged_once() {
        let (db, source, service) = setup().await;
        source.set_folder("a", vec![image("a.jpg", 10, 1)]);
        let first = service.get_folder_cache_status("a").await.unwrap();

        source.add_image("a", image("b.jpg", 5, 3));
        let check = service.check_folder("a").await.unwrap();
        assert_eq!(check.outcome, ScanOutcome::Changed);
        assert_eq!(check.prior_hash.as_deref(), Some(first.current_hash.as_str()));
        assert_ne!(check.status.current_hash, first.current_hash);
        assert!(!check.status.is_current);

        let again = service.check_folder("a").await.unwrap();
        assert_eq!(again.outcome, ScanOutcome::Unchanged);
        assert!(!again.status.is_current);

        let changes = db.list_all().await.unwrap().changes;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from_hash, first.current_hash);
        assert_eq!(changes[0].to_hash, check.status.current_hash);
    }

    #[tokio::test]
    async fn test_two_changes_before_rebuild_chain_from_current_hash() {
        let (db, source, service) = setup().await;
        let built = vec![image("a.jpg", 10, 1)];
        source.set_folder("a", built.clone());
        let h1 = compute_folder_hash(&built);
        db.upsert_record(&FolderHashRecord {
            previous_hash: Some(h1.clone()),
            ..FolderHashRecord::new("a", h1.clone(), Utc::now())
        })
        .await
        .unwrap();

        source.add_image("a", image("b.jpg", 5, 2));
        let h2 = service.get_folder_cache_status("a").await.unwrap().current_hash;
        source.add_image("a", image("c.jpg", 5, 3));
        let status = service.get_folder_cache_status("a").await.unwrap();
        let h3 = status.current_hash.clone();
        assert_eq!(status.previous_hash.as_deref(), Some(h1.as_str()));

        let mut changes = db.list_all().await.unwrap().changes;
        changes.sort_by_key(|c| c.id);
        let steps: Vec<(&str, &str)> = changes.iter().map(|c| (c.from_hash.as_str(), c.to_hash.as_str())).collect();
        assert_eq!(steps, vec![(h1.as_str(), h2.as_str()), (h2.as_str(), h3.as_str())]);
    }

    #[tokio::test]
    async fn test_status_never_touches_previous_hash() {
        let (db, source, service) = setup().await;
        source.set_folder("a", vec![image("a.jpg", 10, 1)]);
        db.upsert_record(&FolderHashRecord {
            previous_hash: Some("old".into()),
            thumbnail_count: 4,
            ..FolderHashRecord::new("a", "old", Utc::now())
        })
        .await
        .unwrap();

        let status = service.get_folder_cache_status("a").await.unwrap();
        assert_eq!(status.previous_hash.as_deref(), Some("old"));
        assert_eq!(status.thumbnail_count, 4);
        assert!(!status.is_current);
    }

    #[tokio::test]
    async fn test_unreadable_folder_is_io_error_and_leaves_record() {
        let (db, source, service) = setup().await;
        source.set_folder("a", vec![image("a.jpg", 10, 1)]);
        let before = service.get_folder_cache_status("a").await.unwrap();

        source.make_unreadable("a");
        let result = service.get_folder_cache_status("a").await;
        assert!(matches!(result, Err(Error::Io(_))));

        let record = db.get_record("a").await.unwrap().unwrap();
        assert_eq!(record.current_hash, before.current_hash);
    }

    #[tokio::test]
    async fn test_root_folder_and_normalization() {
        let (db, source, service) = setup().await;
        source.set_folder("", vec![image("cover.jpg", 1, 1)]);
        source.set_folder("trips/alps", vec![]);

        service.get_folder_cache_status("").await.unwrap();
        let status = service.get_folder_cache_status("/trips/alps/").await.unwrap();
        assert_eq!(status.folder_path, "trips/alps");
        assert!(db.get_record("").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_reports_errors_inline() {
        let (_db, source, service) = setup().await;
        source.set_folder("a", vec![image("a.jpg", 10, 1)]);
        source.set_folder("b", vec![image("b.jpg", 10, 1)]);

        let paths = vec!["a".to_string(), "b/".to_string(), "missing".to_string(), "../x".to_string()];
        let results = service.get_folder_cache_status_batch(&paths).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results["a"].is_ok());
        assert!(results["b"].is_ok());
        assert!(matches!(results["missing"], Err(Error::Io(_))));
        assert!(matches!(results["../x"], Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_batch_cap_rejects_oversized_request() {
        let (_db, _source, service) = setup().await;
        let paths: Vec<String> = (0..150).map(|i| format!("folder-{i}")).collect();
        let result = service.get_folder_cache_status_batch(&paths).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = service.get_folder_cache_status_batch(&[]).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_batch_at_cap_is_processed() {
        let (_db, source, service) = setup().await;
        let paths: Vec<String> = (0..100).map(|i| format!("folder-{i}")).collect();
        for path in &paths {
            source.set_folder(path, vec![image("a.jpg", 1, 1)]);
        }
        let results = service.get_folder_cache_status_batch(&paths).await.unwrap();
        assert_eq!(results.len(), 100);
        assert!(results.values().all(|r| r.is_ok()));
    }
}
