//! Content verification of size clusters.
//!
//! Each size cluster from the scanner is split into groups of
//! byte-identical files:
//! 1. Compute a partial hash (first + last 4KB) to split the cluster cheaply
//! 2. Compute a full BLAKE3 hash for files whose partial hashes match
//!
//! Clusters are verified in parallel; results are reported through a
//! [`DuplicateCallback`] on the caller's thread.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use derive_builder::Builder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use dupsift_core::{DuplicateCallback, FileEntry, Sequence, SizeClusters};

/// Files above this size are hashed through a memory map.
const MMAP_THRESHOLD: u64 = 128 * 1024;

/// BLAKE3 content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Configuration for content verification.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct VerifyConfig {
    /// Minimum file size to verify (smaller clusters are skipped).
    #[builder(default = "0")]
    pub min_size: u64,

    /// Maximum file size to verify (larger clusters are skipped).
    #[builder(default = "u64::MAX")]
    pub max_size: u64,

    /// Split clusters by partial hash before computing full hashes.
    #[builder(default = "true")]
    pub quick_compare: bool,

    /// Number of bytes for partial hash from start of file.
    #[builder(default = "4096")]
    pub partial_hash_head: usize,

    /// Number of bytes for partial hash from end of file.
    #[builder(default = "4096")]
    pub partial_hash_tail: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
            quick_compare: true,
            partial_hash_head: 4096,
            partial_hash_tail: 4096,
        }
    }
}

impl VerifyConfig {
    /// Create a new config builder.
    pub fn builder() -> VerifyConfigBuilder {
        VerifyConfigBuilder::default()
    }
}

/// Totals from one verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyStats {
    /// Size clusters examined.
    pub clusters_verified: usize,
    /// Size clusters skipped by the size limits.
    pub clusters_skipped: usize,
    /// Files that could not be read.
    pub failed_files: usize,
    /// Files without a byte-identical partner.
    pub unique_files: usize,
    /// Confirmed duplicate groups.
    pub duplicate_groups: usize,
    /// Files in those groups.
    pub duplicate_files: usize,
}

/// Outcome of verifying a single size cluster.
#[derive(Debug, Default)]
struct ClusterVerdict {
    groups: Vec<Sequence<FileEntry>>,
    failed: usize,
    unique: usize,
}

impl ClusterVerdict {
    fn absorb(&mut self, other: ClusterVerdict) {
        self.groups.extend(other.groups);
        self.failed += other.failed;
        self.unique += other.unique;
    }
}

/// Splits size clusters into groups of identical files.
pub struct ContentVerifier {
    config: VerifyConfig,
}

impl ContentVerifier {
    /// Create a new verifier with default config.
    pub fn new() -> Self {
        Self {
            config: VerifyConfig::default(),
        }
    }

    /// Create a new verifier with custom config.
    pub fn with_config(config: VerifyConfig) -> Self {
        Self { config }
    }

    /// Verify every cluster and report the results to `callback`.
    ///
    /// `duplicate_group` is called once per confirmed group, largest files
    /// first; `failed_files` and `unique_files` are each called once at the
    /// end with the totals.
    pub fn verify(&self, clusters: &SizeClusters, callback: &mut dyn DuplicateCallback) -> VerifyStats {
        let mut stats = VerifyStats::default();

        let mut candidates: Vec<(u64, Sequence<FileEntry>)> = Vec::new();
        for (size, files) in clusters.iter() {
            if size < self.config.min_size || size > self.config.max_size || files.len() < 2 {
                stats.clusters_skipped += 1;
            } else {
                candidates.push((size, files));
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        stats.clusters_verified = candidates.len();

        let verdicts: Vec<ClusterVerdict> = candidates
            .par_iter()
            .map(|(size, files)| {
                debug!(size, files = files.len(), "verifying size cluster");
                if self.config.quick_compare {
                    self.verify_partial(files)
                } else {
                    self.verify_full(files.iter())
                }
            })
            .collect();

        for verdict in verdicts {
            for group in &verdict.groups {
                stats.duplicate_groups += 1;
                stats.duplicate_files += group.len();
                callback.duplicate_group(group);
            }
            stats.failed_files += verdict.failed;
            stats.unique_files += verdict.unique;
        }

        callback.failed_files(stats.failed_files);
        callback.unique_files(stats.unique_files);
        stats
    }

    /// Split by partial hash, then confirm each partial match by full hash.
    fn verify_partial(&self, files: &Sequence<FileEntry>) -> ClusterVerdict {
        let hashed: Vec<(&FileEntry, Option<[u8; 32]>)> = files
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|entry| (entry, self.compute_partial_hash(&entry.path).ok()))
            .collect();

        let mut verdict = ClusterVerdict::default();
        let mut partial_groups: HashMap<[u8; 32], Vec<&FileEntry>> = HashMap::new();
        for (entry, hash) in hashed {
            match hash {
                Some(hash) => partial_groups.entry(hash).or_default().push(entry),
                None => verdict.failed += 1,
            }
        }

        for candidates in partial_groups.into_values() {
            if candidates.len() < 2 {
                verdict.unique += candidates.len();
                continue;
            }
            verdict.absorb(self.verify_full(candidates.into_iter()));
        }
        verdict
    }

    /// Group by full content hash.
    fn verify_full<'a>(&self, files: impl Iterator<Item = &'a FileEntry>) -> ClusterVerdict {
        let hashed: Vec<(&FileEntry, Option<ContentHash>)> = files
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|entry| (entry, self.compute_full_hash(&entry.path).ok()))
            .collect();

        let mut verdict = ClusterVerdict::default();
        let mut groups: HashMap<ContentHash, Sequence<FileEntry>> = HashMap::new();
        for (entry, hash) in hashed {
            match hash {
                Some(hash) => {
                    let group = groups.entry(hash).or_default();
                    *group = group.add(entry.clone());
                }
                None => verdict.failed += 1,
            }
        }

        for group in groups.into_values() {
            if group.len() >= 2 {
                verdict.groups.push(group);
            } else {
                verdict.unique += group.len();
            }
        }
        verdict
    }

    /// Compute a partial hash (first + last N bytes).
    fn compute_partial_hash(&self, path: &Path) -> io::Result<[u8; 32]> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut hasher = Hasher::new();

        let head_size = (self.config.partial_hash_head as u64).min(file_size);
        let mut head_buf = vec![0u8; head_size as usize];
        file.read_exact(&mut head_buf)?;
        hasher.update(&head_buf);

        if file_size > head_size {
            let tail_size = (self.config.partial_hash_tail as u64).min(file_size - head_size);
            if tail_size > 0 {
                file.seek(SeekFrom::End(-(tail_size as i64)))?;
                let mut tail_buf = vec![0u8; tail_size as usize];
                file.read_exact(&mut tail_buf)?;
                hasher.update(&tail_buf);
            }
        }

        hasher.update(&file_size.to_le_bytes());

        Ok(*hasher.finalize().as_bytes())
    }

    /// Compute full BLAKE3 hash of a file.
    fn compute_full_hash(&self, path: &Path) -> io::Result<ContentHash> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut hasher = Hasher::new();
        if file_size > MMAP_THRESHOLD {
            hasher.update_mmap_rayon(path)?;
        } else {
            io::copy(&mut file, &mut hasher)?;
        }

        Ok(ContentHash::new(*hasher.finalize().as_bytes()))
    }
}

impl Default for ContentVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A group of files sharing the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Size of each file in bytes.
    pub size: u64,

    /// Paths to all duplicate files.
    pub paths: Vec<PathBuf>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    /// Build a group from the sequence reported by the verifier.
    pub fn from_sequence(group: &Sequence<FileEntry>) -> Self {
        let size = group.peek().map(|entry| entry.len).unwrap_or(0);
        let mut paths: Vec<PathBuf> = group.iter().map(|entry| entry.path.to_path_buf()).collect();
        paths.sort();
        Self {
            size,
            wasted_bytes: size * (paths.len() as u64).saturating_sub(1),
            paths,
        }
    }

    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Check if keeping one file, how many could be deleted.
    pub fn deletable_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Collected results of a verification run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups of duplicate files, sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Number of files that could not be read.
    pub failed_files: usize,

    /// Number of files with no identical partner.
    pub unique_files: usize,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Get total number of duplicate files across all groups.
    pub fn total_duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }

    /// Keep only the `max_groups` groups wasting the most space.
    ///
    /// `total_wasted_space` is recomputed over the groups kept.
    pub fn truncate(&mut self, max_groups: usize) {
        self.groups.truncate(max_groups);
        self.total_wasted_space = self.groups.iter().map(|g| g.wasted_bytes).sum();
    }
}

/// [`DuplicateCallback`] that accumulates a [`DuplicateReport`].
#[derive(Debug, Default)]
pub struct DuplicateCollector {
    report: DuplicateReport,
}

impl DuplicateCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish collecting and return the report, largest waste first.
    pub fn into_report(mut self) -> DuplicateReport {
        self.report
            .groups
            .sort_by(|a, b| b.wasted_bytes.cmp(&a.wasted_bytes).then_with(|| a.paths.cmp(&b.paths)));
        self.report.total_wasted_space = self.report.groups.iter().map(|g| g.wasted_bytes).sum();
        self.report
    }
}

impl DuplicateCallback for DuplicateCollector {
    fn failed_files(&mut self, count: usize) {
        self.report.failed_files += count;
    }

    fn duplicate_group(&mut self, group: &Sequence<FileEntry>) {
        self.report.groups.push(DuplicateGroup::from_sequence(group));
    }

    fn unique_files(&mut self, count: usize) {
        self.report.unique_files += count;
    }
}
