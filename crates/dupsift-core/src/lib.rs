//! Core types for dupsift.
//!
//! This crate provides the data structures shared by the scanner and the
//! content verifier:
//!
//! - [`Sequence`]: an immutable, structurally shared LIFO sequence
//! - [`ClusterMap`]: a lock-free multi-producer map from a discriminator
//!   key to the sequence of values sharing it
//! - [`FileEntry`] and [`EntryKind`]: what a directory walk produces
//! - [`ScanConfig`], [`ScanError`] and the [`DuplicateCallback`] protocol
//!
//! ```rust
//! use dupsift_core::ClusterMap;
//!
//! let map = ClusterMap::new();
//! map.add_grouped_element(10u64, "a.txt");
//! map.add_grouped_element(10, "b.txt");
//! map.add_grouped_element(20, "c.txt");
//!
//! let candidates = map.remove_uniques();
//! assert_eq!(candidates.len(), 1);
//! assert_eq!(candidates.get(&10).unwrap().len(), 2);
//! ```

mod callback;
mod cluster;
mod config;
mod entry;
mod error;
mod sequence;

pub use callback::DuplicateCallback;
pub use cluster::ClusterMap;
pub use config::{ScanConfig, ScanConfigBuilder};
pub use entry::{EntryKind, FileEntry};
pub use error::{EmptySequenceError, ScanError, ScanWarning, WarningKind};
pub use sequence::{Iter, Sequence};

/// Size-keyed clusters of files, the output of a scan.
pub type SizeClusters = ClusterMap<u64, FileEntry>;
