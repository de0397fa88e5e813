//! Scan progress reporting and walk statistics.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files clustered so far.
    pub files_scanned: u64,
    /// Number of directories listed so far.
    pub dirs_scanned: u64,
    /// Total bytes of the files clustered so far.
    pub bytes_scanned: u64,
    /// Path of the most recently clustered file.
    pub current_path: PathBuf,
    /// Number of skipped entries and failures.
    pub errors_count: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome statistics for one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Regular files added to the cluster map.
    pub files_clustered: u64,
    /// Total bytes of those files.
    pub bytes_clustered: u64,
    /// Directories successfully listed, including the root.
    pub dirs_walked: u64,
    /// Entries skipped because they could not be read.
    pub entries_skipped: u64,
    /// Files skipped as additional hardlinks of an already clustered inode.
    pub hardlinks_skipped: u64,
    /// Subdirectories the scheduler refused.
    pub failed_submissions: u64,
    /// Walk tasks that failed unexpectedly.
    pub failed_tasks: u64,
    /// Size clusters left after singletons were removed.
    pub candidate_clusters: usize,
    /// Files in those clusters.
    pub candidate_files: usize,
    /// Whether the scan stopped waiting before every task finished.
    pub timed_out: bool,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanSummary {
    /// Check whether any part of the tree may be missing from the result.
    pub fn is_complete(&self) -> bool {
        self.entries_skipped == 0
            && self.failed_submissions == 0
            && self.failed_tasks == 0
            && !self.timed_out
    }
}

/// Counters shared by all walk tasks of one scan.
#[derive(Debug, Default)]
pub(crate) struct WalkStats {
    pub files: AtomicU64,
    pub bytes: AtomicU64,
    pub dirs: AtomicU64,
    pub skipped: AtomicU64,
    pub hardlinks: AtomicU64,
    pub failed_submissions: AtomicU64,
    pub failed_tasks: AtomicU64,
}

impl WalkStats {
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn errors(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
            + self.failed_submissions.load(Ordering::Relaxed)
            + self.failed_tasks.load(Ordering::Relaxed)
    }

    pub fn progress(&self, current_path: PathBuf, elapsed: Duration) -> ScanProgress {
        ScanProgress {
            files_scanned: self.files.load(Ordering::Relaxed),
            dirs_scanned: self.dirs.load(Ordering::Relaxed),
            bytes_scanned: self.bytes.load(Ordering::Relaxed),
            current_path,
            errors_count: self.errors(),
            elapsed,
        }
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            files_clustered: self.files.load(Ordering::Relaxed),
            bytes_clustered: self.bytes.load(Ordering::Relaxed),
            dirs_walked: self.dirs.load(Ordering::Relaxed),
            entries_skipped: self.skipped.load(Ordering::Relaxed),
            hardlinks_skipped: self.hardlinks.load(Ordering::Relaxed),
            failed_submissions: self.failed_submissions.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            ..ScanSummary::default()
        }
    }
}
