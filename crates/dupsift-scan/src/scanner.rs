//! Size-clustering scan driver.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::unbounded;
use tokio::sync::broadcast;
use tracing::{info, warn};

use dupsift_core::{ClusterMap, ScanConfig, ScanError, ScanWarning, SizeClusters};

use crate::progress::{ScanProgress, ScanSummary};
use crate::scheduler::{TaskScheduler, walk_pool};
use crate::walker::TreeWalker;

/// Result of a completed (or abandoned) scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Canonical root that was scanned.
    pub root: PathBuf,
    /// Size clusters with at least two members.
    pub clusters: SizeClusters,
    /// Counters describing how complete the walk was.
    pub summary: ScanSummary,
    /// Non-fatal problems met along the way.
    pub warnings: Vec<ScanWarning>,
}

/// Walks a directory tree in parallel and clusters every file by size.
pub struct LengthScanner {
    scheduler: Option<Arc<dyn TaskScheduler>>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl LengthScanner {
    /// Create a scanner that builds its own pool per scan from
    /// [`ScanConfig::threads`].
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            scheduler: None,
            progress_tx,
        }
    }

    /// Create a scanner that runs walk tasks on `scheduler`.
    pub fn with_scheduler(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            scheduler: Some(scheduler),
            ..Self::new()
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `config.root` and return its candidate duplicate clusters.
    ///
    /// Only configuration problems are errors. Unreadable entries, refused
    /// submissions and failed tasks make the result less complete and are
    /// reported through [`ScanOutcome::summary`] and
    /// [`ScanOutcome::warnings`].
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanOutcome, ScanError> {
        let root = validate_root(&config.root)?;
        let scheduler: Arc<dyn TaskScheduler> = match self.scheduler {
            Some(ref scheduler) => Arc::clone(scheduler),
            None => Arc::new(
                walk_pool(config.threads).map_err(|e| ScanError::Scheduler {
                    message: e.to_string(),
                })?,
            ),
        };
        self.run(config, root, scheduler)
    }

    fn run(
        &self,
        config: &ScanConfig,
        root: PathBuf,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();
        let deadline = config.timeout.map(|timeout| start + timeout);
        let clusters: Arc<SizeClusters> = Arc::new(ClusterMap::new());
        let (warnings_tx, warnings_rx) = unbounded();

        let mut walk_config = config.clone();
        walk_config.root = root.clone();
        let walker = Arc::new(TreeWalker::new(
            walk_config,
            Arc::clone(&clusters),
            scheduler,
            warnings_tx,
            self.progress_tx.clone(),
        ));

        info!(root = %root.display(), "starting size scan");
        walker
            .submit(root.clone())
            .map_err(|e| ScanError::Scheduler {
                message: e.to_string(),
            })?;

        let finished = walker.pending().wait(deadline);
        if !finished {
            warn!(
                root = %root.display(),
                outstanding = walker.pending().outstanding(),
                "scan timed out, abandoning outstanding walk tasks"
            );
        }

        let candidates = clusters.remove_uniques();
        walker.publish_progress(root.clone());

        let mut summary = walker.stats().summary();
        summary.candidate_clusters = candidates.len();
        summary.candidate_files = candidates.member_count();
        summary.timed_out = !finished;
        summary.duration = start.elapsed();

        info!(
            files = summary.files_clustered,
            dirs = summary.dirs_walked,
            clusters = summary.candidate_clusters,
            skipped = summary.entries_skipped,
            failed_tasks = summary.failed_tasks,
            "size scan finished in {:.2}s",
            summary.duration.as_secs_f64()
        );

        Ok(ScanOutcome {
            root,
            clusters: candidates,
            summary,
            warnings: warnings_rx.try_iter().collect(),
        })
    }
}

impl Default for LengthScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan `root` on `scheduler` and return size clusters with ≥ 2 members.
///
/// Fails before doing any work if `scheduler` is `None` or `root` is not
/// a readable directory.
pub fn scan(
    root: impl AsRef<Path>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
) -> Result<SizeClusters, ScanError> {
    let scheduler = scheduler.ok_or(ScanError::MissingScheduler)?;
    let config = ScanConfig::new(root.as_ref());
    LengthScanner::with_scheduler(scheduler)
        .scan(&config)
        .map(|outcome| outcome.clusters)
}

/// Check that `root` exists, is a directory and can be listed.
fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    if root.as_os_str().is_empty() {
        return Err(ScanError::InvalidConfig {
            message: "Root path cannot be empty".to_string(),
        });
    }
    let root = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
    if !root.is_dir() {
        return Err(ScanError::NotADirectory { path: root });
    }
    fs::read_dir(&root).map_err(|e| ScanError::io(&root, e))?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::scheduler::GlobalPool;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "tset").unwrap();
        fs::write(root.join("dir2/file5.txt"), "unique length").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let scanner = LengthScanner::new();
        let outcome = scanner.scan(&ScanConfig::new(temp.path())).unwrap();

        assert_eq!(outcome.summary.files_clustered, 5);
        assert_eq!(outcome.summary.dirs_walked, 4);
        assert_eq!(outcome.clusters.len(), 2);
        assert_eq!(outcome.clusters.get(&5).unwrap().len(), 2);
        assert_eq!(outcome.clusters.get(&4).unwrap().len(), 2);
        assert!(!outcome.clusters.contains_key(&13));
        assert!(outcome.summary.is_complete());
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["dir2".to_string()])
            .build()
            .unwrap();

        let outcome = LengthScanner::new().scan(&config).unwrap();

        assert_eq!(outcome.summary.files_clustered, 3);
        assert!(!outcome.clusters.contains_key(&4));
    }

    #[test]
    fn test_entries_are_absolute() {
        let temp = create_test_tree();
        let outcome = LengthScanner::with_scheduler(Arc::new(GlobalPool))
            .scan(&ScanConfig::new(temp.path()))
            .unwrap();

        for (_, cluster) in outcome.clusters.iter() {
            assert!(cluster.iter().all(|entry| entry.path.is_absolute()));
        }
    }

    #[test]
    fn test_missing_scheduler() {
        let temp = TempDir::new().unwrap();
        let err = scan(temp.path(), None).unwrap_err();
        assert!(matches!(err, ScanError::MissingScheduler));
    }

    #[test]
    fn test_validate_root_errors() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            validate_root(&temp.path().join("missing")),
            Err(ScanError::NotFound { .. })
        ));
        assert!(matches!(
            validate_root(&file),
            Err(ScanError::NotADirectory { .. })
        ));
        assert!(matches!(
            validate_root(Path::new("")),
            Err(ScanError::InvalidConfig { .. })
        ));
    }
}
