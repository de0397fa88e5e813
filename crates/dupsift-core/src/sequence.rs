//! Immutable, structurally shared last-in-first-out sequence.
//!
//! A [`Sequence`] is a singly linked chain of reference-counted nodes.
//! [`Sequence::add`] allocates one node pointing at the current head and
//! returns a new sequence; the receiver is never touched, so any number of
//! versions can share a common tail and be read from many threads at once.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::EmptySequenceError;

struct Node<T> {
    value: T,
    next: Option<Arc<Node<T>>>,
}

/// Persistent LIFO sequence with O(1) `add`, `peek` and `len`.
///
/// Iteration yields the most recently added element first. Storing an
/// absent payload is done with `Sequence<Option<U>>`: `add(None)` produces a
/// one-element sequence whose `peek` is `Ok(&None)`.
pub struct Sequence<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

impl<T> Sequence<T> {
    /// The empty sequence.
    pub const fn empty() -> Self {
        Self { head: None, len: 0 }
    }

    /// Alias for [`Sequence::empty`].
    pub const fn new() -> Self {
        Self::empty()
    }

    /// Return a new sequence with `value` on top. `self` is left unchanged.
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The most recently added value.
    pub fn peek(&self) -> Result<&T, EmptySequenceError> {
        self.head
            .as_deref()
            .map(|node| &node.value)
            .ok_or(EmptySequenceError)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of elements. Same as [`Sequence::len`].
    pub fn size(&self) -> usize {
        self.len
    }

    /// Check if the sequence holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate from the most recently added element to the oldest.
    ///
    /// Every call starts a fresh pass over the same chain.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
            remaining: self.len,
        }
    }

    /// Check whether two sequences share the same head node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Clone> Sequence<T> {
    /// Clone the elements out in iteration order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Clone for Sequence<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// Unlink uniquely owned nodes one at a time so dropping a long chain
// does not recurse once per node.
impl<T> Drop for Sequence<T> {
    fn drop(&mut self) {
        let mut head = self.head.take();
        while let Some(node) = head {
            match Arc::into_inner(node) {
                Some(mut node) => head = node.next.take(),
                None => break,
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Sequence<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && (self.ptr_eq(other) || self.iter().eq(other.iter()))
    }
}

impl<T: Eq> Eq for Sequence<T> {}

/// Builds a sequence by adding each item in turn, so the last item yielded
/// by the source ends up on top.
impl<T> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |sequence, value| sequence.add(value))
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Serialize> Serialize for Sequence<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len))?;
        for value in self {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// Borrowing iterator over a [`Sequence`], newest element first.
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            self.remaining -= 1;
            &node.value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            next: self.next,
            remaining: self.remaining,
        }
    }
}
