//! Task-per-directory parallel tree walker.

use std::any::Any;
use std::fs::{self, File, Metadata};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use dupsift_core::{EntryKind, FileEntry, ScanConfig, ScanWarning, SizeClusters};

use crate::inode::{InodeKey, InodeTracker};
use crate::pending::PendingTasks;
use crate::progress::{ScanProgress, WalkStats};
use crate::scheduler::{SpawnError, TaskScheduler};

/// Files between two progress broadcasts.
const PROGRESS_INTERVAL: u64 = 1000;

/// Shared state of one walk.
///
/// Every directory becomes one task on the scheduler. A task lists its
/// directory, adds regular files to the shared [`SizeClusters`] map and
/// submits one new task per subdirectory; nothing recurses on the call
/// stack.
pub(crate) struct TreeWalker {
    config: ScanConfig,
    clusters: Arc<SizeClusters>,
    scheduler: Arc<dyn TaskScheduler>,
    pending: PendingTasks,
    stats: WalkStats,
    inodes: Option<InodeTracker>,
    warnings: Sender<ScanWarning>,
    progress_tx: broadcast::Sender<ScanProgress>,
    started: Instant,
}

impl TreeWalker {
    pub fn new(
        config: ScanConfig,
        clusters: Arc<SizeClusters>,
        scheduler: Arc<dyn TaskScheduler>,
        warnings: Sender<ScanWarning>,
        progress_tx: broadcast::Sender<ScanProgress>,
    ) -> Self {
        let inodes = config.skip_hardlinks.then(InodeTracker::new);
        Self {
            config,
            clusters,
            scheduler,
            pending: PendingTasks::new(),
            stats: WalkStats::default(),
            inodes,
            warnings,
            progress_tx,
            started: Instant::now(),
        }
    }

    pub fn pending(&self) -> &PendingTasks {
        &self.pending
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    /// Register and submit a walk task for `dir`.
    ///
    /// The task is counted as pending before the scheduler sees it, and
    /// released again if the scheduler refuses it.
    pub fn submit(self: &Arc<Self>, dir: PathBuf) -> Result<(), SpawnError> {
        self.pending.register();
        let walker = Arc::clone(self);
        let result = self.scheduler.spawn(Box::new(move || walker.run(dir)));
        if result.is_err() {
            self.pending.complete();
        }
        result
    }

    /// Publish a progress snapshot to subscribers, if any.
    pub fn publish_progress(&self, current_path: PathBuf) {
        let _ = self
            .progress_tx
            .send(self.stats.progress(current_path, self.elapsed()));
    }

    fn run(self: Arc<Self>, dir: PathBuf) {
        self.guarded(&dir, || self.walk_dir(&dir));
        self.pending.complete();
    }

    /// Run `work`, turning a panic into a logged, counted task failure.
    fn guarded(&self, dir: &Path, work: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
            let reason = panic_message(payload.as_ref());
            error!(path = %dir.display(), %reason, "walk task failed");
            WalkStats::bump(&self.stats.failed_tasks);
            let _ = self.warnings.send(ScanWarning::task_failed(dir, reason));
        }
    }

    fn walk_dir(self: &Arc<Self>, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "skipping unreadable directory");
                self.skip(ScanWarning::read_error(dir, &err));
                return;
            }
        };
        WalkStats::bump(&self.stats.dirs);

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(path = %dir.display(), error = %err, "skipping unreadable entry");
                    self.skip(ScanWarning::read_error(dir, &err));
                    continue;
                }
            };

            if self.config.is_excluded(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            let metadata = if self.config.follow_symlinks {
                fs::metadata(&path)
            } else {
                entry.metadata()
            };
            let metadata = match metadata {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping entry without metadata");
                    self.skip(ScanWarning::metadata_error(&path, &err));
                    continue;
                }
            };

            match EntryKind::from_metadata(&metadata) {
                EntryKind::Directory => {
                    if let Err(err) = self.submit(path.clone()) {
                        warn!(path = %path.display(), error = %err, "could not submit directory, continuing");
                        WalkStats::bump(&self.stats.failed_submissions);
                        let _ = self.warnings.send(ScanWarning::submit_failed(&path, err));
                    }
                }
                EntryKind::File { len } => {
                    // Files the process cannot open are never clustered.
                    if let Err(err) = File::open(&path) {
                        debug!(path = %path.display(), error = %err, "skipping unreadable file");
                        self.skip(ScanWarning::read_error(&path, &err));
                        continue;
                    }
                    self.record_file(path, len, &metadata);
                }
                EntryKind::Other => {}
            }
        }
    }

    fn record_file(&self, path: PathBuf, len: u64, metadata: &Metadata) {
        if let Some(ref inodes) = self.inodes {
            if let Some(key) = InodeKey::for_hardlinked(metadata) {
                if !inodes.track(key) {
                    WalkStats::bump(&self.stats.hardlinks);
                    return;
                }
            }
        }

        self.clusters.add_grouped_element(len, FileEntry::new(path.clone(), len));
        self.stats
            .bytes
            .fetch_add(len, std::sync::atomic::Ordering::Relaxed);

        if WalkStats::bump(&self.stats.files) % PROGRESS_INTERVAL == 0 {
            self.publish_progress(path);
        }
    }

    fn skip(&self, warning: ScanWarning) {
        WalkStats::bump(&self.stats.skipped);
        let _ = self.warnings.send(warning);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
