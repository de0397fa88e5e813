//! Parallel size-clustering scanner for dupsift.
//!
//! This crate walks a directory tree with one task per directory on a
//! shared worker pool and clusters every regular file by its byte length.
//! Clusters with a single member cannot contain duplicates and are removed
//! before the result is returned.
//!
//! # Overview
//!
//! - **Task per directory** on any [`TaskScheduler`] (a rayon pool by default)
//! - **Lock-free clustering** into a [`SizeClusters`] map shared by all tasks
//! - **Best effort**: unreadable entries, refused submissions and failed
//!   tasks are counted in the [`ScanSummary`], never fatal
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use dupsift_scan::{LengthScanner, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let outcome = LengthScanner::new().scan(&config).unwrap();
//!
//! for (size, files) in outcome.clusters.into_clusters() {
//!     println!("{size} bytes: {} candidates", files.len());
//! }
//! ```
//!
//! # Custom Scheduler
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dupsift_scan::{scan, walk_pool, TaskScheduler};
//!
//! let pool: Arc<dyn TaskScheduler> = Arc::new(walk_pool(8).unwrap());
//! let clusters = scan("/path/to/scan", Some(pool)).unwrap();
//! println!("{} size clusters", clusters.len());
//! ```

mod inode;
mod pending;
mod progress;
mod scanner;
mod scheduler;
mod walker;

pub use inode::{InodeKey, InodeTracker};
pub use progress::{ScanProgress, ScanSummary};
pub use scanner::{LengthScanner, ScanOutcome, scan};
pub use scheduler::{GlobalPool, SpawnError, Task, TaskScheduler, walk_pool};

// Re-export core types for convenience
pub use dupsift_core::{
    ClusterMap, EntryKind, FileEntry, ScanConfig, ScanError, ScanWarning, Sequence, SizeClusters,
    WarningKind,
};
