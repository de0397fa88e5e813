//! Content verification for dupsift.
//!
//! The scan stage only proves that files share a length. This crate splits
//! each size cluster into groups of byte-identical files and reports them
//! through a [`DuplicateCallback`]:
//!
//! 1. Compute a partial hash (first + last 4KB) for every cluster member
//! 2. Compute a full BLAKE3 hash for partial-hash matches
//!
//! ```rust,ignore
//! use dupsift_analyze::{ContentVerifier, DuplicateCollector};
//! use dupsift_scan::{LengthScanner, ScanConfig};
//!
//! let outcome = LengthScanner::new().scan(&ScanConfig::new("/path/to/scan")).unwrap();
//!
//! let mut collector = DuplicateCollector::new();
//! ContentVerifier::new().verify(&outcome.clusters, &mut collector);
//! let report = collector.into_report();
//!
//! println!("Found {} duplicate groups", report.groups.len());
//! println!("Wasted space: {} bytes", report.total_wasted_space);
//! ```

mod duplicates;

pub use duplicates::{
    ContentHash, ContentVerifier, DuplicateCollector, DuplicateGroup, DuplicateReport,
    VerifyConfig, VerifyConfigBuilder, VerifyStats,
};

// Re-export core types
pub use dupsift_core::{DuplicateCallback, FileEntry, Sequence, SizeClusters};
