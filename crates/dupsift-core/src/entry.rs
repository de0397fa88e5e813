//! File system entry types produced while walking a tree.

use std::fs::{FileType, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

/// Classification of a listed directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    /// Regular file with its byte length.
    File {
        /// Length in bytes.
        len: u64,
    },
    /// Directory.
    Directory,
    /// Anything else: unfollowed symlinks, sockets, devices, fifos.
    Other,
}

impl EntryKind {
    /// Classify from metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self::from_parts(metadata.file_type(), metadata.len())
    }

    fn from_parts(file_type: FileType, len: u64) -> Self {
        if file_type.is_file() {
            Self::File { len }
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// A regular file found during a walk.
///
/// Cloning is cheap: the path is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileEntry {
    /// Absolute path of the file.
    pub path: Arc<Path>,
    /// Length in bytes at the time it was listed.
    pub len: u64,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new(path: impl Into<PathBuf>, len: u64) -> Self {
        Self {
            path: Arc::from(path.into()),
            len,
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, lossily converted.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}
