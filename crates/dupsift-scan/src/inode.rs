//! Inode tracking so hardlinks are clustered once.

use std::fs::Metadata;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use dashmap::DashSet;

/// Identity of a file on disk, independent of the path used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeKey {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeKey {
    /// Create a new inode key.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }

    /// Key for a file with more than one hardlink, `None` otherwise.
    #[cfg(unix)]
    pub fn for_hardlinked(metadata: &Metadata) -> Option<Self> {
        (metadata.nlink() > 1).then(|| Self::new(metadata.ino(), metadata.dev()))
    }

    #[cfg(not(unix))]
    pub fn for_hardlinked(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Concurrent set of inodes already clustered during a walk.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<InodeKey>,
}

impl InodeTracker {
    /// Create a new inode tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track an inode. Returns `true` if this is the first time seeing it.
    pub fn track(&self, key: InodeKey) -> bool {
        self.seen.insert(key)
    }

    /// Number of distinct inodes tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no inodes have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_new_inode() {
        let tracker = InodeTracker::new();
        let key = InodeKey::new(12345, 1);

        assert!(tracker.track(key));
        assert!(!tracker.track(key));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_different_devices() {
        let tracker = InodeTracker::new();

        assert!(tracker.track(InodeKey::new(12345, 1)));
        assert!(tracker.track(InodeKey::new(12345, 2)));
    }

    #[cfg(unix)]
    #[test]
    fn test_single_link_file_has_no_key() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let metadata = temp.as_file().metadata().unwrap();
        assert!(InodeKey::for_hardlinked(&metadata).is_none());
    }
}
