//! Storage for the parents information - the causal DAG itself - plus the
//! ancestry queries built on it.

pub(crate) mod tools;
mod check;

use crate::{Frontier, LV};
use crate::frontier::FrontierRef;
use crate::lvrange::LVRange;
use crate::rle::{HasLength, HasRleKey, MergableSpan, RleVec, SplitableSpan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata for a run of operations: the LV span and the parents of the
/// first version in the span. Within the run, each following operation's
/// parent is implicitly the operation before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GraphEntryInternal {
    pub span: LVRange,

    /// Parents of span.start. Empty when the run starts at the document root,
    /// one entry for a plain change, two or more when the run starts with a
    /// merge.
    pub parents: Frontier,
}

/// The causal graph's parent storage. Entries are packed - they cover
/// `0..next_lv()` contiguously.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Graph(pub(crate) RleVec<GraphEntryInternal>);

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_entries(&self) -> usize {
        self.0.num_entries()
    }

    pub fn next_lv(&self) -> usize {
        if let Some(last) = self.0.last_entry() {
            last.span.end
        } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parents_at(&self, v: LV) -> Frontier {
        let entry = self.0.find_packed(v);
        entry.with_parents(v, |p| p.into())
    }

    /// Add an entry for the specified version range with the named parents.
    /// Extends the last entry when the new data is a linear continuation.
    pub(crate) fn push(&mut self, parents: FrontierRef, range: LVRange) {
        debug_assert_eq!(range.start, self.next_lv());

        if let Some(last) = self.0.0.last_mut() {
            if parents.len() == 1
                && parents[0] == last.last_lv()
                && last.span.can_append(&range)
            {
                last.span.append(range);
                return;
            }
        }

        self.0.0.push(GraphEntryInternal {
            span: range,
            parents: parents.into(),
        });
    }

    /// Iterate the entry slices overlapping `range`, in LV order. Slices
    /// which don't start on an entry boundary get their implicit parent
    /// (the version right before the slice) synthesized.
    pub fn iter_range(&self, range: LVRange) -> impl Iterator<Item = GraphEntrySimple> + '_ {
        let idx = self.0.find_next_index(range.start);
        self.0.0[idx..].iter()
            .take_while(move |e| e.span.start < range.end)
            .map(move |e| {
                let mut e = GraphEntrySimple::from(e);
                if e.span.start < range.start {
                    e.truncate_keeping_right(range.start - e.span.start);
                }
                if e.span.end > range.end {
                    e.truncate(range.end - e.span.start);
                }
                e
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = GraphEntrySimple> + '_ {
        self.0.iter().map(|e| e.into())
    }
}

impl GraphEntryInternal {
    pub fn with_parents<F: FnOnce(FrontierRef) -> G, G>(&self, v: LV, f: F) -> G {
        if v > self.span.start {
            f(&[v - 1])
        } else {
            f(self.parents.as_ref())
        }
    }

    pub fn contains(&self, v: LV) -> bool {
        self.span.contains(v)
    }

    pub fn last_lv(&self) -> LV {
        self.span.last()
    }
}

impl HasLength for GraphEntryInternal {
    fn len(&self) -> usize {
        self.span.len()
    }
}

impl MergableSpan for GraphEntryInternal {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.last_lv()
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
    }
}

impl HasRleKey for GraphEntryInternal {
    fn rle_key(&self) -> usize {
        self.span.start
    }
}

/// A plain (span, parents) pair - the external / splittable view of a graph
/// entry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphEntrySimple {
    pub span: LVRange,
    pub parents: Frontier,
}

impl MergableSpan for GraphEntrySimple {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.span.last()
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
    }
}

impl HasLength for GraphEntrySimple {
    fn len(&self) -> usize { self.span.len() }
}

impl HasRleKey for GraphEntrySimple {
    fn rle_key(&self) -> usize { self.span.start }
}

impl SplitableSpan for GraphEntrySimple {
    fn truncate(&mut self, at: usize) -> Self {
        debug_assert!(at >= 1);

        GraphEntrySimple {
            span: self.span.truncate(at),
            parents: Frontier::new_1(self.span.start + at - 1),
        }
    }
}

impl From<GraphEntryInternal> for GraphEntrySimple {
    fn from(entry: GraphEntryInternal) -> Self {
        Self { span: entry.span, parents: entry.parents }
    }
}

impl From<&GraphEntryInternal> for GraphEntrySimple {
    fn from(entry: &GraphEntryInternal) -> Self {
        Self { span: entry.span, parents: entry.parents.clone() }
    }
}

impl Graph {
    pub(crate) fn from_simple_items(slice: &[GraphEntrySimple]) -> Self {
        let mut graph = Self::new();
        for e in slice {
            graph.push(e.parents.as_ref(), e.span);
        }
        graph
    }
}
