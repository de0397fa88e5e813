use dupsift_scan::{
    GlobalPool, LengthScanner, ScanConfig, ScanError, SpawnError, Task, TaskScheduler,
    WarningKind, scan, walk_pool,
};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn write_len(path: &Path, len: usize) {
    fs::write(path, vec![b'x'; len]).unwrap();
}

fn names(outcome_cluster: &dupsift_scan::Sequence<dupsift_scan::FileEntry>) -> BTreeSet<String> {
    outcome_cluster.iter().map(|entry| entry.name()).collect()
}

/// Accepts the first `limit` tasks, rejects the rest.
struct RejectAfter {
    accepted: AtomicUsize,
    limit: usize,
}

impl TaskScheduler for RejectAfter {
    fn spawn(&self, task: Task) -> Result<(), SpawnError> {
        if self.accepted.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return Err(SpawnError::Rejected {
                reason: "queue full".to_string(),
            });
        }
        rayon::spawn(task);
        Ok(())
    }
}

/// Runs each task on its own thread after a delay.
struct Sluggish(Duration);

impl TaskScheduler for Sluggish {
    fn spawn(&self, task: Task) -> Result<(), SpawnError> {
        let delay = self.0;
        thread::spawn(move || {
            thread::sleep(delay);
            task();
        });
        Ok(())
    }
}

#[test]
fn test_size_clusters_across_subdirectories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_len(&root.join("a"), 10);
    write_len(&root.join("b"), 10);
    write_len(&root.join("c"), 20);
    fs::create_dir(root.join("d")).unwrap();
    write_len(&root.join("d/e"), 10);

    let clusters = scan(root, Some(Arc::new(GlobalPool))).unwrap();

    assert_eq!(clusters.len(), 1);
    assert!(!clusters.contains_key(&20));
    let cluster = clusters.get(&10).unwrap();
    assert_eq!(
        names(&cluster),
        BTreeSet::from(["a".to_string(), "b".to_string(), "e".to_string()])
    );
}

#[test]
fn test_empty_root_yields_empty_map() {
    let temp = TempDir::new().unwrap();
    let outcome = LengthScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

    assert!(outcome.clusters.is_empty());
    assert_eq!(outcome.summary.files_clustered, 0);
    assert_eq!(outcome.summary.dirs_walked, 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_and_singleton_yield_empty_map() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let locked = temp.path().join("locked");
    write_len(&locked, 5);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    write_len(&temp.path().join("normal"), 5);
    let privileged = fs::File::open(&locked).is_ok();

    let outcome = LengthScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    // Privileged users can open the file regardless of its mode.
    if privileged {
        assert_eq!(outcome.clusters.get(&5).unwrap().len(), 2);
    } else {
        assert!(outcome.clusters.is_empty());
        assert_eq!(outcome.summary.entries_skipped, 1);
        assert!(
            outcome
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::PermissionDenied)
        );
    }
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_joins_its_length_cluster() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let outside = TempDir::new().unwrap();
    write_len(&outside.path().join("target"), 10);
    write_len(&root.join("a"), 10);
    symlink(outside.path().join("target"), root.join("link")).unwrap();
    fs::create_dir(outside.path().join("dir")).unwrap();
    write_len(&outside.path().join("dir/inner"), 10);
    symlink(outside.path().join("dir"), root.join("dirlink")).unwrap();

    let followed = LengthScanner::new().scan(&ScanConfig::new(root)).unwrap();
    assert_eq!(
        names(&followed.clusters.get(&10).unwrap()),
        BTreeSet::from(["a".to_string(), "inner".to_string(), "link".to_string()])
    );

    let config = ScanConfig::builder()
        .root(root)
        .follow_symlinks(false)
        .build()
        .unwrap();
    let unfollowed = LengthScanner::new().scan(&config).unwrap();
    assert!(unfollowed.clusters.is_empty());
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_does_not_abort_walk() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_len(&root.join("a"), 3);
    write_len(&root.join("b"), 3);
    let locked = root.join("locked");
    fs::create_dir(&locked).unwrap();
    write_len(&locked.join("c"), 3);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let result = LengthScanner::new().scan(&ScanConfig::new(root));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let outcome = result.unwrap();
    let cluster = outcome.clusters.get(&3).unwrap();
    assert!(cluster.len() >= 2);
    assert!(names(&cluster).is_superset(&BTreeSet::from(["a".to_string(), "b".to_string()])));
}

#[test]
fn test_every_file_lands_in_its_length_cluster() {
    let temp = TempDir::new().unwrap();
    let mut expected: HashMap<u64, usize> = HashMap::new();

    for dir in 0..6 {
        let mut path = temp.path().to_path_buf();
        for level in 0..=dir % 3 {
            path.push(format!("level{level}-{dir}"));
        }
        fs::create_dir_all(&path).unwrap();
        for file in 0..12 {
            let len = (file % 4) * 100 + dir;
            write_len(&path.join(format!("f{file}")), len);
            *expected.entry(len as u64).or_default() += 1;
        }
    }
    expected.retain(|_, count| *count > 1);

    let pool: Arc<dyn TaskScheduler> = Arc::new(walk_pool(4).unwrap());
    let outcome = LengthScanner::with_scheduler(pool)
        .scan(&ScanConfig::new(temp.path()))
        .unwrap();

    assert_eq!(outcome.summary.files_clustered, 72);
    assert_eq!(outcome.clusters.len(), expected.len());
    for (len, cluster) in outcome.clusters.iter() {
        assert_eq!(Some(&cluster.len()), expected.get(&len));
        assert!(cluster.iter().all(|entry| entry.len == len));
        assert!(cluster.len() >= 2);
    }

    let distinct: BTreeSet<_> = outcome
        .clusters
        .iter()
        .flat_map(|(_, cluster)| cluster.to_vec())
        .collect();
    assert_eq!(distinct.len(), outcome.summary.candidate_files);
}

#[test]
fn test_refused_submission_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_len(&root.join("a"), 4);
    write_len(&root.join("b"), 4);
    fs::create_dir(root.join("sub")).unwrap();
    write_len(&root.join("sub/c"), 4);

    let scheduler = Arc::new(RejectAfter {
        accepted: AtomicUsize::new(0),
        limit: 1,
    });
    let outcome = LengthScanner::with_scheduler(scheduler)
        .scan(&ScanConfig::new(root))
        .unwrap();

    assert_eq!(outcome.summary.failed_submissions, 1);
    assert_eq!(outcome.clusters.get(&4).unwrap().len(), 2);
    assert!(!outcome.summary.is_complete());
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::SubmitFailed)
    );
}

#[test]
fn test_rejected_root_is_a_scheduler_error() {
    let temp = TempDir::new().unwrap();
    let scheduler = Arc::new(RejectAfter {
        accepted: AtomicUsize::new(0),
        limit: 0,
    });

    let err = LengthScanner::with_scheduler(scheduler)
        .scan(&ScanConfig::new(temp.path()))
        .unwrap_err();

    assert!(matches!(err, ScanError::Scheduler { .. }));
}

#[test]
fn test_configuration_errors_before_any_work() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("file.txt");
    write_len(&file, 1);

    let scheduler = Arc::new(RejectAfter {
        accepted: AtomicUsize::new(0),
        limit: usize::MAX,
    });
    let scanner = LengthScanner::with_scheduler(scheduler.clone());

    assert!(matches!(
        scanner.scan(&ScanConfig::new(temp.path().join("missing"))),
        Err(ScanError::NotFound { .. })
    ));
    assert!(matches!(
        scanner.scan(&ScanConfig::new(&file)),
        Err(ScanError::NotADirectory { .. })
    ));
    assert!(matches!(
        scan(temp.path(), None),
        Err(ScanError::MissingScheduler)
    ));
    assert_eq!(scheduler.accepted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_timeout_abandons_outstanding_tasks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("slow")).unwrap();
    write_len(&root.join("slow/a"), 2);
    write_len(&root.join("slow/b"), 2);

    let config = ScanConfig::builder()
        .root(root)
        .timeout(Some(Duration::from_millis(50)))
        .build()
        .unwrap();
    let outcome = LengthScanner::with_scheduler(Arc::new(Sluggish(Duration::from_millis(400))))
        .scan(&config)
        .unwrap();

    assert!(outcome.summary.timed_out);
    assert!(outcome.clusters.is_empty());
}

#[cfg(unix)]
#[test]
fn test_skip_hardlinks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_len(&root.join("original"), 8);
    fs::hard_link(root.join("original"), root.join("link")).unwrap();

    let all = LengthScanner::new().scan(&ScanConfig::new(root)).unwrap();
    assert_eq!(all.clusters.get(&8).unwrap().len(), 2);

    let config = ScanConfig::builder()
        .root(root)
        .skip_hardlinks(true)
        .build()
        .unwrap();
    let deduped = LengthScanner::new().scan(&config).unwrap();
    assert!(deduped.clusters.is_empty());
    assert_eq!(deduped.summary.hardlinks_skipped, 1);
}

#[test]
fn test_progress_subscribers_receive_final_snapshot() {
    let temp = TempDir::new().unwrap();
    write_len(&temp.path().join("a"), 1);

    let scanner = LengthScanner::new();
    let mut progress_rx = scanner.subscribe();
    scanner.scan(&ScanConfig::new(temp.path())).unwrap();

    let progress = progress_rx.try_recv().unwrap();
    assert_eq!(progress.files_scanned, 1);
    assert_eq!(progress.dirs_scanned, 1);
}
