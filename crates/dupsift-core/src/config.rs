//! Scan configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a size-clustering scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directory to scan.
    pub root: PathBuf,

    /// Classify symlinks by their target. When disabled, symlinks are
    /// skipped.
    ///
    /// No cycle detection is performed when this is enabled.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub follow_symlinks: bool,

    /// Entry names to skip. Supports a leading or trailing `*` wildcard.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Worker threads for the default pool (0 = one per CPU).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Include hidden entries (names starting with `.`).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Cluster only the first path seen for each hardlinked inode.
    #[builder(default = "false")]
    #[serde(default)]
    pub skip_hardlinks: bool,

    /// Stop waiting for outstanding walk tasks after this long.
    #[builder(default)]
    #[serde(default)]
    pub timeout: Option<Duration>,
}

fn default_true() -> bool {
    true
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                Err("Root path cannot be empty".to_string())
            }
            Some(_) => match self.timeout {
                Some(Some(timeout)) if timeout.is_zero() => {
                    Err("Timeout must be greater than zero".to_string())
                }
                _ => Ok(()),
            },
            None => Err("Root path is required".to_string()),
        }
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: true,
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
            skip_hardlinks: false,
            timeout: None,
        }
    }

    /// Check if an entry name matches one of the ignore patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                name.starts_with(prefix)
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                name.ends_with(suffix)
            } else {
                name == pattern
            }
        })
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check whether an entry name is excluded by either rule.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.should_skip_hidden(name) || self.should_ignore(name)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
