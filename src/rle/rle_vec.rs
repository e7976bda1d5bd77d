use std::cmp::Ordering::*;
use std::fmt::Debug;

use humansize::{format_size, DECIMAL};

use crate::lvrange::LVRange;
use crate::rle::{AppendRle, HasLength, HasRleKey, MergableSpan, RleSpanHelpers, Searchable, SplitableSpan};

/// A vec of run-length-encoded entries, ordered (and binary searched) by each
/// entry's key.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RleVec<V: HasLength + MergableSpan + Sized>(pub Vec<V>);

impl<V: HasLength + MergableSpan + Sized> RleVec<V> {
    pub fn new() -> Self { Self(Vec::new()) }

    /// Append a new value to the end of the RLE list. O(1) - the new item
    /// extends the last entry where possible.
    ///
    /// Returns true if the item was merged into the previous item.
    pub fn push(&mut self, val: V) -> bool {
        self.0.push_rle(val)
    }

    /// Returns one past the end of the last key.
    pub fn end(&self) -> usize where V: HasRleKey {
        if let Some(v) = self.last_entry() {
            v.end()
        } else {
            0
        }
    }

    pub fn last_entry(&self) -> Option<&V> { self.0.last() }

    pub fn num_entries(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, V> { self.0.iter() }

    pub fn print_stats(&self, name: &str) {
        let size = std::mem::size_of::<V>();
        println!("-------- {} RLE --------", name);
        println!("number of {} byte entries: {}", size, self.0.len());
        println!("allocated size: {}", format_size(self.0.capacity() * size, DECIMAL));
        println!("(used size: {})", format_size(self.0.len() * size, DECIMAL));
    }
}

impl<V: HasLength + MergableSpan + HasRleKey + Clone + Sized> RleVec<V> {
    /// Find the index of the entry containing the requested item via binary
    /// search. Err() gives the index the item would insert at.
    pub fn find_index(&self, needle: usize) -> Result<usize, usize> {
        self.0.binary_search_by(|entry| {
            let key = entry.rle_key();
            if needle < key { Greater }
            else if needle >= key + entry.len() { Less }
            else { Equal }
        })
    }

    /// Find the index of the entry containing needle, or of the next entry
    /// (or self.0.len()) when no entry contains it.
    pub fn find_next_index(&self, needle: usize) -> usize {
        self.find_index(needle).unwrap_or_else(|i| i)
    }

    pub fn find(&self, needle: usize) -> Option<&V> {
        self.find_index(needle).ok().map(|idx| &self.0[idx])
    }

    /// Like find(), for lists with no gaps between entries.
    pub fn find_packed(&self, needle: usize) -> &V {
        self.find(needle).unwrap()
    }

    /// Returns Some((entry, offset into the entry)).
    pub fn find_with_offset(&self, needle: usize) -> Option<(&V, usize)> {
        self.find_index(needle).ok().map(|idx| {
            let entry = &self.0[idx];
            (entry, needle - entry.rle_key())
        })
    }

    pub fn find_packed_with_offset(&self, needle: usize) -> (&V, usize) {
        self.find_with_offset(needle).unwrap()
    }

    /// Like find, except a miss returns the (half open) range of keys around
    /// the needle which are empty.
    ///
    /// Returns (Ok(entry) | Err(empty span), offset into the entry / span).
    pub fn find_sparse(&self, needle: usize) -> (Result<&V, LVRange>, usize) {
        match self.find_index(needle) {
            Ok(idx) => {
                let entry = &self.0[idx];
                (Ok(entry), needle - entry.rle_key())
            }
            Err(idx) => {
                let next_key = if let Some(entry) = self.0.get(idx) {
                    entry.rle_key()
                } else {
                    usize::MAX
                };

                if idx == 0 {
                    (Err((0..next_key).into()), needle)
                } else {
                    let end = self.0[idx - 1].end();
                    (Err((end..next_key).into()), needle - end)
                }
            }
        }
    }

    pub fn contains_needle(&self, needle: usize) -> bool {
        !self.is_empty() && self.find_index(needle).is_ok()
    }

    /// Insert an item at its key position. O(n) in the number of subsequent
    /// entries. The inserted item must not overlap any existing entry.
    pub fn insert(&mut self, val: V) {
        // Data is usually appended to the end, so check that case first.
        if self.last_entry()
            .map(|last| last.end() <= val.rle_key())
            .unwrap_or(true)
        {
            self.push(val);
            return;
        }

        let idx = self.find_index(val.rle_key()).expect_err("item already exists");

        // Extend the neighbouring entries if we can.
        if idx >= 1 {
            let prev = &mut self.0[idx - 1];
            if prev.can_append(&val) {
                prev.append(val);
                return;
            }
        }

        if idx < self.0.len() {
            let next = &mut self.0[idx];
            debug_assert!(val.rle_key() + val.len() <= next.rle_key(), "items overlap");

            if val.can_append(next) {
                next.prepend(val);
                return;
            }
        }

        self.0.insert(idx, val);
    }

    /// Iterate over entries overlapping `range`, each cloned and trimmed to
    /// the range. Requires the list to be packed over the requested range.
    pub fn iter_range(&self, range: LVRange) -> impl Iterator<Item = V> + '_
        where V: SplitableSpan
    {
        let idx = self.find_next_index(range.start);
        self.0[idx..].iter()
            .take_while(move |e| e.rle_key() < range.end)
            .map(move |e| {
                let mut e = e.clone();
                if e.rle_key() < range.start {
                    e.truncate_keeping_right(range.start - e.rle_key());
                }
                if e.end() > range.end {
                    e.truncate(range.end - e.rle_key());
                }
                e
            })
    }
}

impl<V: HasLength + MergableSpan + HasRleKey + Searchable + Clone> RleVec<V> {
    /// Look up the single item at the requested position in a packed list.
    pub fn get(&self, needle: usize) -> V::Item {
        let (entry, offset) = self.find_packed_with_offset(needle);
        entry.at_offset(offset)
    }
}

impl<V: HasLength + MergableSpan + Sized> Default for RleVec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: HasLength + MergableSpan + Sized> FromIterator<V> for RleVec<V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let mut rle = Self::new();
        for item in iter {
            rle.push(item);
        }
        rle
    }
}
