//! Background scan loop.
//!
//! The scheduler is a process-scoped service: [`Scheduler::start`] spawns one
//! recurring tokio task that lives as long as the runtime. Starting twice is a
//! no-op. Each tick enumerates the gallery, checks every folder with bounded
//! concurrency and rebuilds the stale ones. Failures are written to history
//! and logged; they never stop the loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};

use crate::cache::{CacheDb, HistoryEventType, NewHistoryEntry};
use crate::rebuild::Rebuilder;
use crate::source::ImageSource;
use crate::status::{ScanOutcome, StatusService};

/// Lifecycle of the scheduler. There is no transition back to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub concurrency: usize,
    pub prune_orphans: bool,
}

/// Counts for one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub scanned: usize,
    pub rebuilt: usize,
    pub failed: usize,
    /// Records whose folder was missing from the enumeration.
    pub orphaned: usize,
}

enum FolderResult {
    Current,
    Rebuilt,
    Failed,
}

struct Inner {
    db: CacheDb,
    source: Arc<dyn ImageSource>,
    status: StatusService,
    rebuilder: Rebuilder,
    config: SchedulerConfig,
    running: AtomicBool,
}

/// Periodic scanner; cheap to clone, all clones share one loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        db: CacheDb, source: Arc<dyn ImageSource>, status: StatusService, rebuilder: Rebuilder, config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                source,
                status,
                rebuilder,
                config,
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.running.load(Ordering::SeqCst) { SchedulerState::Running } else { SchedulerState::Stopped }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Start the background loop on the current tokio runtime.
    ///
    /// Returns `true` if this call started it and `false` if it was already
    /// running. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("scheduler already running; start ignored");
            return false;
        }

        let scheduler = self.clone();
        let period = self.inner.config.interval;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let summary = scheduler.run_tick().await;
                tracing::info!(
                    scanned = summary.scanned,
                    rebuilt = summary.rebuilt,
                    failed = summary.failed,
                    orphaned = summary.orphaned,
                    "scheduler tick finished"
                );
            }
        });

        tracing::info!(interval_secs = period.as_secs(), concurrency = self.inner.config.concurrency, "scheduler started");
        true
    }

    /// Run one scan over the whole gallery.
    pub async fn run_tick(&self) -> TickSummary {
        let inner = &self.inner;
        let mut summary = TickSummary::default();

        let folders = match inner.source.list_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                tracing::error!("scheduler could not enumerate folders: {e}");
                self.record(NewHistoryEntry::now("", HistoryEventType::Error, format!("folder enumeration failed: {e}")))
                    .await;
                summary.failed += 1;
                return summary;
            }
        };

        let semaphore = Arc::new(Semaphore::new(inner.config.concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for folder in folders.iter().cloned() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let scheduler = self.clone();
            join_set.spawn(async move {
                let _permit = permit;
                scheduler.process_folder(&folder).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            summary.scanned += 1;
            match joined {
                Ok(FolderResult::Current) => {}
                Ok(FolderResult::Rebuilt) => summary.rebuilt += 1,
                Ok(FolderResult::Failed) => summary.failed += 1,
                Err(e) => {
                    tracing::error!("scheduler folder task failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        summary.orphaned = self.handle_orphans(&folders).await;
        summary
    }

    async fn process_folder(&self, folder: &str) -> FolderResult {
        let inner = &self.inner;

        let check = match inner.status.check_folder(folder).await {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!(folder, "scan failed: {e}");
                self.record(NewHistoryEntry::now(folder, HistoryEventType::Error, format!("scan failed: {e}")))
                    .await;
                return FolderResult::Failed;
            }
        };

        match check.outcome {
            ScanOutcome::New => {
                self.record(NewHistoryEntry::now(folder, HistoryEventType::Scan, "new folder discovered"))
                    .await;
            }
            ScanOutcome::Changed => {
                let detail = format!(
                    "contents changed: {} -> {}",
                    check.prior_hash.as_deref().unwrap_or("-"),
                    check.status.current_hash
                );
                self.record(NewHistoryEntry::now(folder, HistoryEventType::Scan, detail)).await;
            }
            ScanOutcome::Unchanged => {}
        }

        if check.status.is_current {
            return FolderResult::Current;
        }

        match inner.rebuilder.rebuild_folder_thumbnails(folder).await {
            Ok(_) => FolderResult::Rebuilt,
            Err(e) => {
                tracing::warn!(folder, "rebuild failed: {e}");
                self.record(NewHistoryEntry::now(folder, HistoryEventType::Error, format!("rebuild failed: {e}")))
                    .await;
                FolderResult::Failed
            }
        }
    }

    /// Records whose folder no longer exists are either pruned or left stale.
    async fn handle_orphans(&self, folders: &[String]) -> usize {
        let inner = &self.inner;
        let records = match inner.db.list_records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("could not list records for orphan check: {e}");
                return 0;
            }
        };

        let present: HashSet<&str> = folders.iter().map(String::as_str).collect();
        let mut orphaned = 0;
        for record in records.iter().filter(|r| !present.contains(r.folder_path.as_str())) {
            orphaned += 1;
            if !inner.config.prune_orphans {
                tracing::debug!(folder = %record.folder_path, "folder missing on disk; record kept");
                continue;
            }
            match inner.db.delete_record(&record.folder_path).await {
                Ok(_) => {
                    self.record(NewHistoryEntry::now(
                        record.folder_path.clone(),
                        HistoryEventType::Scan,
                        "record pruned: folder no longer exists",
                    ))
                    .await;
                }
                Err(e) => tracing::error!(folder = %record.folder_path, "could not prune record: {e}"),
            }
        }
        orphaned
    }

    async fn record(&self, entry: NewHistoryEntry) {
        if let Err(e) = self.inner.db.append_history(entry).await {
            tracing::error!("could not append scheduler history: {e}");
        }
    }
}
