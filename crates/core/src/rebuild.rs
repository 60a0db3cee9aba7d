//! Thumbnail regeneration.
//!
//! A rebuild lists the folder once, fingerprints that listing, renders every
//! image and then records the fingerprint as built. Individual image failures
//! are logged to history and skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheDb, FolderHashRecord, HistoryEventType, NewHistoryEntry, RecordUpdate, compute_folder_hash};
use crate::source::{ImageSource, ThumbnailGenerator, normalize_folder_path};

/// Result of a folder rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOutcome {
    pub folder_path: String,
    pub thumbnails_generated: u32,
}

/// Per-folder async locks; at most one rebuild per folder runs at a time.
///
/// An entry lives only while some rebuild of that folder holds or awaits it.
#[derive(Clone, Default)]
struct FolderLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FolderLocks {
    fn get(&self, folder_path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(folder_path.to_string()).or_default().clone()
    }

    /// Drop the entry for `folder_path` once no caller holds it.
    fn release(&self, folder_path: &str) {
        let mut locks = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(folder_path).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(folder_path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

/// Regenerates thumbnails and advances `previous_hash`.
#[derive(Clone)]
pub struct Rebuilder {
    db: CacheDb,
    source: Arc<dyn ImageSource>,
    generator: Arc<dyn ThumbnailGenerator>,
    locks: FolderLocks,
}

impl Rebuilder {
    pub fn new(db: CacheDb, source: Arc<dyn ImageSource>, generator: Arc<dyn ThumbnailGenerator>) -> Self {
        Self { db, source, generator, locks: FolderLocks::default() }
    }

    /// Regenerate every thumbnail of `folder_path`.
    ///
    /// The empty path is the gallery root. On success the record holds
    /// `previous_hash == current_hash` (the fingerprint of the listing used
    /// for this rebuild), `last_built_at = now` and the number of thumbnails
    /// generated, and a `rebuild` history entry is appended.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the path cannot be normalized
    /// - `Rebuild` if the folder cannot be listed, or if it holds images and
    ///   none of them could be rendered; the record is left stale
    /// - `Database` if the store is unavailable
    pub async fn rebuild_folder_thumbnails(&self, folder_path: &str) -> Result<RebuildOutcome, Error> {
        let folder_path = normalize_folder_path(folder_path)?;
        let lock = self.locks.get(&folder_path);
        let result = {
            let _guard = lock.lock().await;
            self.rebuild_locked(&folder_path).await
        };
        drop(lock);
        self.locks.release(&folder_path);
        result
    }

    async fn rebuild_locked(&self, folder_path: &str) -> Result<RebuildOutcome, Error> {
        let folder_path = folder_path.to_string();
        let images = self
            .source
            .list_images(&folder_path)
            .await
            .map_err(|e| Error::Rebuild(format!("cannot list folder '{folder_path}': {e}")))?;
        let hash = compute_folder_hash(&images);

        let mut generated = 0u32;
        let mut failed = 0usize;
        for image in &images {
            match self.generator.generate(&folder_path, image).await {
                Ok(artifact) => {
                    generated += 1;
                    tracing::trace!(folder = %folder_path, path = %artifact.file_path.display(), "thumbnail written");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(folder = %folder_path, image = %image.name, "thumbnail generation failed: {e}");
                    self.db
                        .append_history(NewHistoryEntry::now(
                            folder_path.clone(),
                            HistoryEventType::Error,
                            format!("thumbnail failed for {}: {e}", image.name),
                        ))
                        .await?;
                }
            }
        }

        if !images.is_empty() && generated == 0 {
            return Err(Error::Rebuild(format!(
                "no thumbnail could be generated for folder '{folder_path}' ({failed} images failed)"
            )));
        }

        let now = Utc::now();
        let count = generated;
        self.db
            .update_record(&folder_path, move |existing| {
                let base = existing.unwrap_or_else(|| FolderHashRecord::new(String::new(), hash.clone(), now));
                RecordUpdate {
                    record: FolderHashRecord {
                        previous_hash: Some(hash.clone()),
                        current_hash: hash,
                        last_scanned_at: now,
                        last_built_at: Some(now),
                        thumbnail_count: count,
                        ..base
                    },
                    change: None,
                    output: (),
                }
            })
            .await?;

        self.db
            .append_history(NewHistoryEntry::now(
                folder_path.clone(),
                HistoryEventType::Rebuild,
                format!("generated {generated} of {} thumbnails", images.len()),
            ))
            .await?;

        tracing::info!(folder = %folder_path, generated, failed, "rebuilt folder thumbnails");

        Ok(RebuildOutcome { folder_path, thumbnails_generated: generated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusService;
    use crate::testing::{FakeGenerator, MemorySource, image};

    struct Fixture {
        db: CacheDb,
        source: Arc<MemorySource>,
        generator: Arc<FakeGenerator>,
        status: StatusService,
        rebuilder: Rebuilder,
    }

    async fn setup() -> Fixture {
        let db = CacheDb::open_in_memory().await.unwrap();
        let source = Arc::new(MemorySource::default());
        let generator = Arc::new(FakeGenerator::default());
        let status = StatusService::new(db.clone(), source.clone(), 100, 4);
        let rebuilder = Rebuilder::new(db.clone(), source.clone(), generator.clone());
        Fixture { db, source, generator, status, rebuilder }
    }

    #[tokio::test]
    async fn test_landscapes_scenario() {
        let f = setup().await;
        f.source.set_folder("landscapes", vec![image("dune.jpg", 100, 1), image("fjord.jpg", 200, 2)]);

        let first = f.status.get_folder_cache_status("landscapes").await.unwrap();
        let h1 = first.current_hash.clone();
        assert!(!first.is_current);
        assert_eq!(first.previous_hash, None);

        let outcome = f.rebuilder.rebuild_folder_thumbnails("landscapes").await.unwrap();
        assert_eq!(outcome.thumbnails_generated, 2);
        let record = f.db.get_record("landscapes").await.unwrap().unwrap();
        assert_eq!(record.previous_hash.as_deref(), Some(h1.as_str()));
        assert_eq!(record.current_hash, h1);
        assert_eq!(record.thumbnail_count, 2);
        assert!(record.last_built_at.is_some());

        f.source.add_image("landscapes", image("glacier.jpg", 300, 3));
        let stale = f.status.get_folder_cache_status("landscapes").await.unwrap();
        let h2 = stale.current_hash.clone();
        assert_ne!(h1, h2);
        assert_eq!(stale.previous_hash.as_deref(), Some(h1.as_str()));
        assert!(!stale.is_current);

        let changes = f.db.list_all().await.unwrap().changes;
        assert_eq!(changes.len(), 1);
        assert_eq!((changes[0].from_hash.as_str(), changes[0].to_hash.as_str()), (h1.as_str(), h2.as_str()));

        let outcome = f.rebuilder.rebuild_folder_thumbnails("landscapes").await.unwrap();
        assert_eq!(outcome.thumbnails_generated, 3);
        let record = f.db.get_record("landscapes").await.unwrap().unwrap();
        assert_eq!(record.previous_hash.as_deref(), Some(h2.as_str()));
        assert_eq!(record.thumbnail_count, 3);
    }

    #[tokio::test]
    async fn test_rebuild_converges_status() {
        let f = setup().await;
        f.source.set_folder("a", vec![image("a.jpg", 1, 1)]);

        f.rebuilder.rebuild_folder_thumbnails("a").await.unwrap();
        let status = f.status.get_folder_cache_status("a").await.unwrap();
        assert!(status.is_current);
        assert_eq!(status.thumbnail_count, 1);
    }

    #[tokio::test]
    async fn test_rebuild_root_folder() {
        let f = setup().await;
        f.source.set_folder("", vec![image("cover.jpg", 1, 1)]);

        let outcome = f.rebuilder.rebuild_folder_thumbnails("").await.unwrap();
        assert_eq!(outcome.folder_path, "");
        assert_eq!(outcome.thumbnails_generated, 1);
        assert!(f.db.get_record("").await.unwrap().unwrap().is_current());
    }

    #[tokio::test]
    async fn test_partial_failures_are_tolerated() {
        let f = setup().await;
        f.source.set_folder(
            "a",
            vec![image("ok.jpg", 1, 1), image("corrupt-1.jpg", 1, 1), image("corrupt-2.jpg", 1, 1)],
        );

        let outcome = f.rebuilder.rebuild_folder_thumbnails("a").await.unwrap();
        assert_eq!(outcome.thumbnails_generated, 1);
        assert_eq!(f.generator.calls(), 3);

        let snapshot = f.db.list_all().await.unwrap();
        let errors = snapshot.history.iter().filter(|h| h.event_type == HistoryEventType::Error).count();
        let rebuilds = snapshot.history.iter().filter(|h| h.event_type == HistoryEventType::Rebuild).count();
        assert_eq!(errors, 2);
        assert_eq!(rebuilds, 1);
        assert_eq!(snapshot.records[0].thumbnail_count, 1);
        assert!(snapshot.records[0].is_current());
    }

    #[tokio::test]
    async fn test_all_images_failed_is_rebuild_error() {
        let f = setup().await;
        f.source.set_folder("a", vec![image("corrupt.jpg", 1, 1)]);
        f.status.get_folder_cache_status("a").await.unwrap();

        let result = f.rebuilder.rebuild_folder_thumbnails("a").await;
        assert!(matches!(result, Err(Error::Rebuild(_))));
        assert!(!f.db.get_record("a").await.unwrap().unwrap().is_current());
    }

    #[tokio::test]
    async fn test_unlistable_folder_is_rebuild_error() {
        let f = setup().await;
        let result = f.rebuilder.rebuild_folder_thumbnails("missing").await;
        assert!(matches!(result, Err(Error::Rebuild(_))));
        assert!(f.db.get_record("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_folder_builds_with_zero_thumbnails() {
        let f = setup().await;
        f.source.set_folder("empty", vec![]);
        let outcome = f.rebuilder.rebuild_folder_thumbnails("empty").await.unwrap();
        assert_eq!(outcome.thumbnails_generated, 0);
        assert!(f.db.get_record("empty").await.unwrap().unwrap().is_current());
    }

    #[tokio::test]
    async fn test_concurrent_rebuild_and_status_keep_record_consistent() {
        let f = setup().await;
        f.source.set_folder("a", vec![image("a.jpg", 1, 1), image("b.jpg", 1, 1)]);

        let mut handles = Vec::new();
        for i in 0..10 {
            let status = f.status.clone();
            let rebuilder = f.rebuilder.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    rebuilder.rebuild_folder_thumbnails("a").await.map(|_| ())
                } else {
                    status.get_folder_cache_status("a").await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = f.db.get_record("a").await.unwrap().unwrap();
        assert!(record.is_current());
        assert_eq!(record.thumbnail_count, 2);
        assert_eq!(record.revision, 10);
        assert_eq!(f.rebuilder.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_folder_locks_released_after_rebuild() {
        let f = setup().await;
        for i in 0..5 {
            f.source.set_folder(&format!("f{i}"), vec![image("a.jpg", 1, 1)]);
            f.rebuilder.rebuild_folder_thumbnails(&format!("f{i}")).await.unwrap();
        }
        let _ = f.rebuilder.rebuild_folder_thumbnails("missing").await;
        assert_eq!(f.rebuilder.locks.len(), 0);

        let held = f.rebuilder.locks.get("busy");
        f.rebuilder.locks.release("busy");
        assert_eq!(f.rebuilder.locks.len(), 1);
        drop(held);
        f.rebuilder.locks.release("busy");
        assert_eq!(f.rebuilder.locks.len(), 0);
    }
}
