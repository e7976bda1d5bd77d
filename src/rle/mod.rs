//! Run-length encoding primitives. Nearly everything stored by the causal
//! graph is a run of some kind - runs of local versions, runs of sequence
//! numbers, runs of graph entries. These traits let all of those share the
//! same splitting / merging / searching machinery.

use std::fmt::Debug;
use smallvec::SmallVec;

use crate::lvrange::LVRange;

pub mod rle_vec;

pub use rle_vec::RleVec;

/// The number of child items packed into this entry.
pub trait HasLength {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// An entry which can be merged with an adjacent entry.
pub trait MergableSpan: Clone {
    /// Can `other` be appended to the end of self? `can_append` is always
    /// called immediately before `append`.
    fn can_append(&self, other: &Self) -> bool;

    /// self = self + other.
    fn append(&mut self, other: Self);

    /// self = other + self. Only called when `other.can_append(self)`.
    #[inline(always)]
    fn prepend(&mut self, mut other: Self) {
        other.append(self.clone());
        *self = other;
    }
}

/// An entry which can be split in two at some internal offset.
pub trait SplitableSpan: Clone {
    /// Truncate the entry at `at`, returning the jettisoned tail. Afterwards
    /// `self.len() == at`. `at` must obey `0 < at < len`.
    fn truncate(&mut self, at: usize) -> Self;

    /// The inverse of truncate - keep items from `at..len` in self, returning
    /// the head `0..at`.
    #[inline(always)]
    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        let mut other = self.clone();
        *self = other.truncate(at);
        other
    }
}

/// An entry which contains a run of items which can be looked up by value.
pub trait Searchable {
    type Item: Copy + Debug;

    /// If the entry contains the item, returns the offset into the entry.
    fn get_offset(&self, loc: Self::Item) -> Option<usize>;

    fn at_offset(&self, offset: usize) -> Self::Item;
}

/// Entries in an [`RleVec`] are positioned by their key.
pub trait HasRleKey {
    fn rle_key(&self) -> usize;
}

pub trait RleSpanHelpers: HasRleKey + HasLength {
    fn end(&self) -> usize {
        self.rle_key() + self.len()
    }

    fn last(&self) -> usize {
        debug_assert!(!self.is_empty());
        self.end() - 1
    }

    fn span(&self) -> LVRange {
        LVRange::new(self.rle_key(), self.end())
    }
}

impl<V: HasRleKey + HasLength> RleSpanHelpers for V {}

/// A (key, value) pair where the key names the position of the first item in
/// the contained run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KVPair<V>(pub usize, pub V);

impl<V> HasRleKey for KVPair<V> {
    fn rle_key(&self) -> usize {
        self.0
    }
}

impl<V: HasLength> HasLength for KVPair<V> {
    fn len(&self) -> usize {
        self.1.len()
    }
}

impl<V: HasLength + MergableSpan> MergableSpan for KVPair<V> {
    fn can_append(&self, other: &Self) -> bool {
        other.0 == self.end() && self.1.can_append(&other.1)
    }

    fn append(&mut self, other: Self) {
        self.1.append(other.1);
    }

    fn prepend(&mut self, other: Self) {
        self.1.prepend(other.1);
        self.0 = other.0;
    }
}

impl<V: HasLength + SplitableSpan> SplitableSpan for KVPair<V> {
    fn truncate(&mut self, at: usize) -> Self {
        let remainder = self.1.truncate(at);
        KVPair(self.0 + at, remainder)
    }
}

impl<V: Searchable> Searchable for KVPair<V> {
    type Item = V::Item;

    fn get_offset(&self, loc: Self::Item) -> Option<usize> {
        self.1.get_offset(loc)
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.1.at_offset(offset)
    }
}

/// Push onto a list-like container, RLE-compacting into the last entry where
/// possible.
pub trait AppendRle<T: MergableSpan> {
    /// Returns true if the item was merged into the previous last item.
    fn push_rle(&mut self, item: T) -> bool;

    /// Push to a list which is sorted in reverse order. The new item is
    /// prepended to the last entry when they're adjacent.
    fn push_reversed_rle(&mut self, item: T) -> bool;
}

impl<T: MergableSpan> AppendRle<T> for Vec<T> {
    fn push_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }

        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }

        self.push(item);
        false
    }
}

impl<T: MergableSpan, const N: usize> AppendRle<T> for SmallVec<T, N> {
    fn push_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }

        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }

        self.push(item);
        false
    }
}

/// Verify an implementation of [`SplitableSpan`] / [`MergableSpan`] against
/// the expected algebra. Call with an entry of length >= 2.
#[cfg(test)]
pub(crate) fn test_splitable_methods_valid<E>(entry: E)
    where E: SplitableSpan + MergableSpan + HasLength + Debug + Eq
{
    assert!(entry.len() >= 2, "call this with a larger entry");
    for i in 1..entry.len() {
        let mut start = entry.clone();
        let end = start.truncate(i);

        assert_eq!(start.len(), i);
        assert_eq!(end.len(), entry.len() - i);
        assert!(start.can_append(&end));

        let mut merge_append = start.clone();
        merge_append.append(end.clone());
        assert_eq!(merge_append, entry);

        let mut merge_prepend = end.clone();
        merge_prepend.prepend(start.clone());
        assert_eq!(merge_prepend, entry);

        let mut end2 = entry.clone();
        let start2 = end2.truncate_keeping_right(i);
        assert_eq!(end2, end);
        assert_eq!(start2, start);
    }
}
