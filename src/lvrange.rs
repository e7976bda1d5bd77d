use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::ops::Range;

use crate::LV;
use crate::rle::{HasLength, HasRleKey, MergableSpan, Searchable, SplitableSpan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An internal replacement for `Range<usize>`. Unlike std's range this is
/// Copy, which we lean on constantly - ranges of local versions and sequence
/// numbers are passed around everywhere. Convert to / from `Range<usize>`
/// with `.into()`.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LVRange {
    pub start: usize,
    pub end: usize,
}

impl LVRange {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        LVRange { start, end }
    }

    #[inline]
    pub fn new_from_len(start: usize, len: usize) -> Self {
        LVRange { start, end: start + len }
    }

    pub fn last(&self) -> usize {
        debug_assert!(!self.is_empty());
        self.end - 1
    }

    pub fn contains(&self, item: usize) -> bool {
        self.start <= item && item < self.end
    }

    pub fn is_empty(&self) -> bool {
        debug_assert!(self.start <= self.end);
        self.start == self.end
    }

    pub fn intersect(&self, other: &Self) -> Option<LVRange> {
        let result = LVRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        };
        if result.start <= result.end { Some(result) } else { None }
    }

    pub fn partial_cmp_lv(&self, lv: LV) -> Ordering {
        if lv < self.start { Ordering::Less }
        else if lv >= self.end { Ordering::Greater }
        else { Ordering::Equal }
    }

    pub fn iter(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<usize> for LVRange {
    fn from(start: usize) -> Self {
        LVRange { start, end: start + 1 }
    }
}

impl From<Range<usize>> for LVRange {
    fn from(range: Range<usize>) -> Self {
        LVRange { start: range.start, end: range.end }
    }
}

impl From<LVRange> for Range<usize> {
    fn from(range: LVRange) -> Self {
        range.start..range.end
    }
}

impl HasLength for LVRange {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

impl SplitableSpan for LVRange {
    fn truncate(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange { start: split, end: self.end };
        self.end = split;
        other
    }

    #[inline]
    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange { start: self.start, end: split };
        self.start = split;
        other
    }
}

impl MergableSpan for LVRange {
    fn can_append(&self, other: &Self) -> bool {
        other.start == self.end
    }

    fn append(&mut self, other: Self) {
        self.end = other.end;
    }

    fn prepend(&mut self, other: Self) {
        self.start = other.start;
    }
}

impl Searchable for LVRange {
    type Item = usize;

    fn get_offset(&self, loc: Self::Item) -> Option<usize> {
        if loc >= self.start && loc < self.end {
            Some(loc - self.start)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.start + offset
    }
}

impl HasRleKey for LVRange {
    fn rle_key(&self) -> usize {
        self.start
    }
}

/// Synthetic op ids used by the merge path start here. The range is disjoint
/// from any real LV a document could contain.
pub(crate) const PLACEHOLDER_START: usize = usize::MAX / 4;

pub(crate) fn is_placeholder(lv: LV) -> bool {
    lv >= PLACEHOLDER_START
}

struct Placeholder(usize);

impl Debug for Placeholder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Placeholder({})", self.0))
    }
}

pub(crate) fn debug_lv_raw<F: FnOnce(&dyn Debug) -> R, R>(val: LV, f: F) -> R {
    match val {
        usize::MAX => f(&"NONE"),
        start @ (PLACEHOLDER_START..) => f(&Placeholder(start - PLACEHOLDER_START)),
        start => f(&start),
    }
}

impl Debug for LVRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "V ")?;
        debug_lv_raw(self.start, |v| v.fmt(f))?;
        write!(f, "..")?;
        debug_lv_raw(self.end, |v| v.fmt(f))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::rle::test_splitable_methods_valid;
    use super::LVRange;

    #[test]
    fn splitable_lvrange() {
        test_splitable_methods_valid(LVRange::new(10, 20));
    }

    #[test]
    fn intersect() {
        let a = LVRange::new(0, 10);
        let b = LVRange::new(5, 20);
        assert_eq!(a.intersect(&b), Some(LVRange::new(5, 10)));
        assert_eq!(a.intersect(&LVRange::new(20, 30)), None);
    }
}
