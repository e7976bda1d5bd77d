use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::LV;
use crate::lvrange::{debug_lv_raw, LVRange};

/// A frontier names a version of the document: the set of local versions with
/// no children in the local causal graph. Frontiers are always sorted
/// ascending and contain no duplicates. An empty frontier is the root version
/// (the document before any operations).
///
/// Almost all frontiers contain a single element.
#[derive(Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frontier(pub SmallVec<LV, 2>);

/// Borrowed form of a frontier. Most query methods take one of these so
/// callers don't need to build a `Frontier` to ask questions.
pub type FrontierRef<'a> = &'a [LV];

pub(crate) fn frontier_is_sorted(f: &[LV]) -> bool {
    if f.len() >= 2 {
        let mut last = f[0];
        for v in &f[1..] {
            debug_assert!(*v != last);
            if last > *v { return false; }
            last = *v;
        }
    }
    true
}

pub(crate) fn debug_assert_frontier_sorted(f: &[LV]) {
    debug_assert!(frontier_is_sorted(f));
}

pub fn local_frontier_eq(a: FrontierRef, b: FrontierRef) -> bool {
    debug_assert_frontier_sorted(a);
    debug_assert_frontier_sorted(b);
    a == b
}

impl Frontier {
    /// The root version - the (empty) frontier before any operations exist.
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    pub fn new_1(v: LV) -> Self {
        let mut f = SmallVec::new();
        f.push(v);
        Self(f)
    }

    pub fn from_sorted(data: &[LV]) -> Self {
        debug_assert_frontier_sorted(data);
        Self(data.into())
    }

    pub fn from_unsorted(data: &[LV]) -> Self {
        let mut arr: SmallVec<LV, 2> = data.into();
        if !frontier_is_sorted(&arr) {
            arr.sort_unstable();
        }
        Self(arr)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_ref(&self) -> FrontierRef<'_> {
        &self.0
    }

    pub(crate) fn replace_with_1(&mut self, v: LV) {
        self.0.truncate(1);
        if self.0.is_empty() {
            self.0.push(v);
        } else {
            self.0[0] = v;
        }
    }

    pub(crate) fn debug_check_sorted(&self) {
        debug_assert_frontier_sorted(&self.0);
    }

    /// Insert a new version, keeping the set sorted. The version must not be
    /// an ancestor of any current member.
    pub(crate) fn insert_sorted(&mut self, new_item: LV) {
        // A linear scan might actually beat the binary search here, but
        // frontiers are so small it makes no difference.
        let new_idx = self.0.binary_search(&new_item).unwrap_err();
        self.0.insert(new_idx, new_item);
        self.debug_check_sorted();
    }

    /// Advance this frontier by a run of operations spanning `span` whose
    /// first operation has the named parents.
    ///
    /// This never checks ancestry transitively. That's sound because
    /// operations are only ever appended in causal order, so each member of
    /// `parents` is either in the frontier or an ancestor of some member.
    pub fn advance_by_known_run(&mut self, parents: FrontierRef, span: LVRange) {
        debug_assert!(!span.is_empty());

        // Short circuit the common case of time advancing linearly.
        if parents.len() == 1 && self.0.len() == 1 && parents[0] == self.0[0] {
            self.0[0] = span.last();
            return;
        } else if self.as_ref() == parents {
            self.replace_with_1(span.last());
            return;
        }

        debug_assert!(!self.0.contains(&span.start));
        self.debug_check_sorted();

        self.0.retain(|v| !parents.contains(v)); // Usually removes all elements.
        self.insert_sorted(span.last());
    }
}

impl Deref for Frontier {
    type Target = [LV];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FrontierRef<'_>> for Frontier {
    fn from(f: FrontierRef) -> Self {
        Self::from_sorted(f)
    }
}

impl FromIterator<LV> for Frontier {
    fn from_iter<T: IntoIterator<Item = LV>>(iter: T) -> Self {
        let arr: SmallVec<LV, 2> = iter.into_iter().collect();
        let mut f = Self(arr);
        if !frontier_is_sorted(&f.0) {
            f.0.sort_unstable();
        }
        f
    }
}

impl Debug for Frontier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for v in self.0.iter() {
            debug_lv_raw(*v, |d| { list.entry(d); });
        }
        list.finish()
    }
}
