//! Reporting protocol for the content-verification stage.

use crate::entry::FileEntry;
use crate::sequence::Sequence;

/// Receives the results of comparing size clusters by content.
///
/// The size-clustering scan never calls this itself; it produces the
/// clusters a verifier consumes before reporting here.
pub trait DuplicateCallback {
    /// `count` files could not be read or compared.
    fn failed_files(&mut self, count: usize);

    /// One group of files with byte-identical content.
    fn duplicate_group(&mut self, group: &Sequence<FileEntry>);

    /// `count` files turned out to have no identical partner.
    fn unique_files(&mut self, count: usize);
}
