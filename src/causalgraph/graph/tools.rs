//! Ancestry tools for the causal graph: diffing versions, walking conflicts
//! back to a common ancestor, finding dominators and testing fast-forwards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::{smallvec, SmallVec};

use crate::{Frontier, LV};
use crate::causalgraph::graph::Graph;
use crate::causalgraph::graph::tools::DiffFlag::*;
use crate::frontier::{debug_assert_frontier_sorted, local_frontier_eq, FrontierRef};
use crate::lvrange::LVRange;
use crate::rle::{AppendRle, SplitableSpan};

/// The diff and conflict walks tag each queue entry with which side(s) of the
/// walk have reached it. The ordering must not disturb the heap's sort.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DiffFlag { OnlyA, OnlyB, Shared }

impl Graph {
    /// Does the run containing `a` also contain `b`? A cheap (incomplete)
    /// ancestry test used to short circuit the common linear-history case.
    pub(crate) fn is_direct_descendant_coarse(&self, a: LV, b: LV) -> bool {
        a == b || (a > b && self.0.find_packed(a).contains(b))
    }

    /// Compare two versions, if they're comparable. Returns None when the
    /// versions are concurrent.
    pub fn version_cmp(&self, v1: LV, v2: LV) -> Option<Ordering> {
        match v1.cmp(&v2) {
            Ordering::Equal => Some(Ordering::Equal),
            Ordering::Less => {
                if self.version_contains(&[v2], v1) {
                    Some(Ordering::Less)
                } else {
                    None
                }
            }
            Ordering::Greater => {
                if self.version_contains(&[v1], v2) {
                    Some(Ordering::Greater)
                } else {
                    None
                }
            }
        }
    }

    /// Does the version named by `frontier` contain (dominate) `target`?
    pub fn version_contains(&self, frontier: FrontierRef, target: LV) -> bool {
        if frontier.contains(&target) { return true; }
        if frontier.is_empty() { return false; }

        // A priority queue walking from the highest versions down lets us
        // discard whole runs at a time, and prune any branch which has
        // dropped below the target.
        let mut queue = BinaryHeap::new();

        for &v in frontier {
            if v > target { queue.push(v); }
        }

        while let Some(v) = queue.pop() {
            debug_assert!(v > target);

            let entry = self.0.find_packed(v);
            if entry.span.start <= target { return true; }

            while let Some(&next) = queue.peek() {
                if next >= entry.span.start {
                    queue.pop();
                } else { break; }
            }

            for &p in entry.parents.iter() {
                #[allow(clippy::comparison_chain)]
                if p == target { return true; }
                else if p > target { queue.push(p); }
                // If p < target it can't be a descendant of target; discard.
            }
        }

        false
    }
}

/// (ranges only in a's history, ranges only in b's history).
pub type DiffResult = (SmallVec<LVRange, 4>, SmallVec<LVRange, 4>);

impl Graph {
    /// Returns (ranges only in a's history, ranges only in b's history).
    /// Both lists are in ascending LV order with adjacent ranges coalesced.
    pub fn diff(&self, a: FrontierRef, b: FrontierRef) -> DiffResult {
        debug_assert_frontier_sorted(a);
        debug_assert_frontier_sorted(b);

        // Most calls hit one of these cheap cases.
        if local_frontier_eq(a, b) { return (smallvec![], smallvec![]); }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                return (smallvec![(b + 1..a + 1).into()], smallvec![]);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                return (smallvec![], smallvec![(a + 1..b + 1).into()]);
            }
        }

        self.diff_slow(a, b)
    }

    fn diff_slow(&self, a: FrontierRef, b: FrontierRef) -> DiffResult {
        let mut only_a: SmallVec<LVRange, 4> = smallvec![];
        let mut only_b: SmallVec<LVRange, 4> = smallvec![];

        // Marks the inclusive range [start..=end] with the given flag.
        let mark_run = |start: LV, end: LV, flag: DiffFlag| {
            let target = match flag {
                OnlyA => &mut only_a,
                OnlyB => &mut only_b,
                Shared => { return; }
            };

            target.push_reversed_rle(LVRange::new(start, end + 1));
        };

        self.diff_slow_internal(a, b, mark_run);

        // The walk visits from the top down; flip to ascending order.
        only_a.reverse();
        only_b.reverse();
        (only_a, only_b)
    }

    fn diff_slow_internal<F>(&self, a: FrontierRef, b: FrontierRef, mut mark_run: F)
        where F: FnMut(LV, LV, DiffFlag)
    {
        // Sorted highest to lowest.
        let mut queue: BinaryHeap<(LV, DiffFlag)> = BinaryHeap::new();
        for &v in a {
            queue.push((v, OnlyA));
        }
        for &v in b {
            queue.push((v, OnlyB));
        }

        let mut num_shared_entries = 0;

        while let Some((mut v, mut flag)) = queue.pop() {
            if flag == Shared { num_shared_entries -= 1; }

            // Merge duplicate heap entries for the same version.
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v != v { break; }

                if *peek_flag != flag { flag = Shared; }
                if *peek_flag == Shared { num_shared_entries -= 1; }
                queue.pop();
            }

            let entry = self.0.find_packed(v);

            // Two cases: the next queued item is inside this entry's run (mark
            // down to it and merge flags), or it isn't (mark the whole run and
            // queue the entry's parents).
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v < entry.span.start { break; }

                if *peek_flag != flag {
                    mark_run(*peek_v + 1, v, flag);
                    v = *peek_v;
                    flag = Shared;
                }
                if *peek_flag == Shared { num_shared_entries -= 1; }
                queue.pop();
            }

            mark_run(entry.span.start, v, flag);

            for &p in entry.parents.iter() {
                queue.push((p, flag));
                if flag == Shared { num_shared_entries += 1; }
            }

            // Everything remaining is shared; nothing left to mark.
            if queue.len() == num_shared_entries { break; }
        }
    }

    /// Is `to` a fast-forward from `from` - ie, does `to` subsume everything
    /// in `from`'s view? (This is the loose, diff-based test. It does not
    /// imply new operations can be applied positionally - see
    /// [`can_fast_forward`](Self::can_fast_forward).)
    pub fn is_fast_forward(&self, from: FrontierRef, to: FrontierRef) -> bool {
        self.diff(from, to).0.is_empty()
    }

    /// The strict fast-forward test: true iff the operations in `to`'s view
    /// and not in `from`'s form a linear extension of `from`, so each can be
    /// applied at its recorded position with no concurrency resolution.
    ///
    /// This implies [`is_fast_forward`](Self::is_fast_forward), but not vice
    /// versa: a frontier can subsume another in the diff sense while still
    /// containing branches which are concurrent with each other.
    pub fn can_fast_forward(&self, from: FrontierRef, to: FrontierRef) -> bool {
        self.fast_forward_spans(from, to).is_some()
    }

    /// When `to` linearly extends `from`, returns the version ranges to
    /// apply, ascending. Otherwise None.
    pub(crate) fn fast_forward_spans(&self, from: FrontierRef, to: FrontierRef)
        -> Option<SmallVec<LVRange, 4>>
    {
        if local_frontier_eq(from, to) { return Some(smallvec![]); }

        let (only_from, only_to) = self.diff(from, to);
        if !only_from.is_empty() { return None; }

        let mut expect_parents = Frontier::from_sorted(from);
        for range in &only_to {
            for e in self.iter_range(*range) {
                if e.parents.as_ref() != expect_parents.as_ref() { return None; }
                expect_parents.replace_with_1(e.span.last());
            }
        }

        Some(only_to)
    }
}

// *** Conflicts ***

impl Graph {
    fn find_conflicting_slow<V>(&self, a: FrontierRef, b: FrontierRef, mut visit: V) -> Frontier
        where V: FnMut(LVRange, DiffFlag)
    {
        // Sorted highest to lowest, with merge points (multi-element
        // versions) kept intact until we process them.
        #[derive(Debug, PartialEq, Eq, Clone)]
        struct VersionPoint {
            // For merges this is the highest version.
            last: LV,
            merged_with: SmallVec<LV, 1>, // Always sorted. Usually empty.
        }

        impl Ord for VersionPoint {
            #[inline(always)]
            fn cmp(&self, other: &Self) -> Ordering {
                // wrapping_add(1) maps the root sentinel (usize::MAX) below
                // every real version.
                self.last.wrapping_add(1).cmp(&other.last.wrapping_add(1))
                    .then_with(|| other.merged_with.is_empty().cmp(&self.merged_with.is_empty()))
            }
        }

        impl PartialOrd for VersionPoint {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl From<LV> for VersionPoint {
            fn from(v: LV) -> Self {
                Self { last: v, merged_with: SmallVec::new() }
            }
        }

        impl From<FrontierRef<'_>> for VersionPoint {
            fn from(version: FrontierRef) -> Self {
                Self {
                    last: *version.last().unwrap_or(&usize::MAX),
                    merged_with: if version.len() > 1 {
                        version[..version.len() - 1].into()
                    } else {
                        SmallVec::new()
                    },
                }
            }
        }

        // The heap delivers the highest version points first.
        let mut queue: BinaryHeap<(VersionPoint, DiffFlag)> = BinaryHeap::new();
        queue.push((a.into(), OnlyA));
        queue.push((b.into(), OnlyB));

        // Loop until the walk has collapsed to a single version point.
        'outer: loop {
            let (time, mut flag) = queue.pop().unwrap();
            let t = time.last;

            if t == usize::MAX { break Frontier::root(); }

            // Discard duplicate entries, merging their flags.
            while let Some((peek_time, peek_flag)) = queue.peek() {
                if *peek_time == time {
                    if *peek_flag != flag { flag = Shared; }
                    queue.pop();
                } else { break; }
            }

            if queue.is_empty() {
                // In this order because time.last > time.merged_with.
                let mut frontier = Frontier::from_sorted(time.merged_with.as_slice());
                frontier.0.push(t);
                frontier.debug_check_sorted();
                break frontier;
            }

            // If this node is a merger, shatter it. time.last is handled
            // directly this iteration.
            if !time.merged_with.is_empty() {
                for t in time.merged_with {
                    queue.push((t.into(), flag));
                }
            }

            let entry = self.0.find_packed(t);
            let mut range = LVRange { start: entry.span.start, end: t + 1 };

            // Consume all other queued items within this entry's run.
            loop {
                if let Some((peek_time, _)) = queue.peek() {
                    if peek_time.last != usize::MAX && peek_time.last >= entry.span.start {
                        // The next item is within this run. Consume it.
                        let (peek_time, next_flag) = queue.pop().unwrap();

                        // Only emit inner items when they aren't duplicates.
                        if peek_time.last + 1 < range.end {
                            // + 1 because the merge point itself is not in
                            // the conflicting set.
                            let offset = peek_time.last + 1 - entry.span.start;
                            debug_assert!(offset > 0);
                            let rem = range.truncate(offset);
                            visit(rem, flag);
                        }

                        if next_flag != flag { flag = Shared; }

                        if !peek_time.merged_with.is_empty() {
                            // A merge point which uses part of this entry.
                            // The covered span is already emitted; queue the
                            // other legs.
                            for t in peek_time.merged_with {
                                queue.push((t.into(), next_flag));
                            }
                        }
                    } else {
                        // Emit the remainder of this run and step to its
                        // parents. Pushing the parents as a (possibly merged)
                        // version point means we stop cleanly at merges.
                        visit(range, flag);
                        queue.push((entry.parents.as_ref().into(), flag));
                        break;
                    }
                } else {
                    break 'outer Frontier::new_1(range.last());
                }
            }
        }
    }

    /// Walk `a` and `b` backwards through the graph to their common ancestor,
    /// reporting each covered run as belonging to only-a, only-b or both.
    /// Runs are visited in reverse LV order. Returns the common ancestor -
    /// the version every reported run descends from.
    pub(crate) fn find_conflicting<V>(&self, a: FrontierRef, b: FrontierRef, mut visit: V) -> Frontier
        where V: FnMut(LVRange, DiffFlag)
    {
        if local_frontier_eq(a, b) {
            return a.into();
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                visit((b + 1..a + 1).into(), OnlyA);
                return Frontier::new_1(b);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                visit((a + 1..b + 1).into(), OnlyB);
                return Frontier::new_1(a);
            }
        }

        self.find_conflicting_slow(a, b, visit)
    }
}

// *** Dominators ***

impl Graph {
    /// Visit the passed versions in descending order, tagging each with
    /// whether it's a dominator - ie, not an ancestor of any other version in
    /// the set.
    pub(crate) fn find_dominators_full<F, I>(&self, versions_iter: I, mut visit: F)
        where F: FnMut(LV, bool), I: Iterator<Item = LV>
    {
        if let Some(max_size) = versions_iter.size_hint().1 {
            if max_size <= 1 {
                // A single item dominates itself.
                for v in versions_iter {
                    visit(v, true);
                }
                return;
            }
        }

        // The LSB of each heap entry encodes whether this version was one of
        // the inputs. Parent (non-input) entries for a version sort above the
        // input entry for the same version, so we see them first.
        fn enc_input(v: LV) -> usize { v << 1 }
        fn enc_parent(v: LV) -> usize { (v << 1) + 1 }
        fn dec(v_enc: usize) -> (bool, LV) {
            (v_enc % 2 == 0, v_enc >> 1)
        }

        let mut queue: BinaryHeap<usize> = versions_iter.map(|v| {
            assert!(v < usize::MAX / 2, "version too large");
            enc_input(v)
        }).collect();
        let mut inputs_remaining = queue.len();

        let mut last_emitted = usize::MAX;

        while let Some(v_enc) = queue.pop() {
            let (is_input, v) = dec(v_enc);

            if is_input {
                // Nothing higher reached this version, so it dominates.
                visit(v, true);
                last_emitted = v;
                inputs_remaining -= 1;
            }

            let entry = self.0.find_packed(v);

            // Drain all queued versions inside this entry's run - they're all
            // ancestors of v.
            while let Some(&v2_enc) = queue.peek() {
                let (is_input2, v2) = dec(v2_enc);
                if v2 < entry.span.start { break; }
                queue.pop();

                if is_input2 {
                    if last_emitted != v2 {
                        visit(v2, false);
                        last_emitted = v2;
                    }
                    inputs_remaining -= 1;
                }
            }

            if inputs_remaining == 0 { break; }

            for &p in entry.parents.iter() {
                queue.push(enc_parent(p));
            }
        }
    }

    /// The subset of `versions` whose members aren't ancestors of any other
    /// member, as a (sorted) frontier.
    pub fn find_dominators(&self, versions: &[LV]) -> Frontier {
        if versions.len() <= 1 {
            return Frontier::from_sorted(versions);
        }

        let mut result_rev: SmallVec<LV, 2> = smallvec![];
        self.find_dominators_full(versions.iter().copied(), |v, dominates| {
            if dominates {
                result_rev.push(v);
            }
        });

        result_rev.reverse();
        Frontier(result_rev)
    }

    /// Merge two versions into the version containing them both. Both inputs
    /// must already be valid frontiers.
    pub fn find_dominators_2(&self, v_1: FrontierRef, v_2: FrontierRef) -> Frontier {
        if v_1.is_empty() { return v_2.into(); }
        if v_2.is_empty() { return v_1.into(); }

        if v_1.len() == 1 && v_2.len() == 1 {
            let a = v_1[0];
            let b = v_2[0];
            return match self.version_cmp(a, b) {
                None => {
                    // Versions are concurrent.
                    if a < b { Frontier::from_sorted(&[a, b]) }
                    else { Frontier::from_sorted(&[b, a]) }
                }
                Some(Ordering::Equal) | Some(Ordering::Less) => Frontier::new_1(b),
                Some(Ordering::Greater) => Frontier::new_1(a),
            };
        }

        let mut result_rev: SmallVec<LV, 2> = smallvec![];
        let iter = v_1.iter().copied().chain(v_2.iter().copied());
        self.find_dominators_full(iter, |v, dominates| {
            if dominates {
                result_rev.push(v);
            }
        });

        result_rev.reverse();
        Frontier(result_rev)
    }
}

#[cfg(test)]
mod tests {
    use crate::causalgraph::graph::GraphEntrySimple;
    use super::*;

    // The graph looks like this:
    //
    //   0..=2
    //  /     \
    // 3..=5  6..=8
    //  \     /
    //   9..=10
    //  and a separate root: 11..=12
    fn fancy_graph() -> Graph {
        Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..3).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (3..6).into(), parents: Frontier::new_1(2) },
            GraphEntrySimple { span: (6..9).into(), parents: Frontier::new_1(2) },
            GraphEntrySimple { span: (9..11).into(), parents: Frontier::from_sorted(&[5, 8]) },
            GraphEntrySimple { span: (11..13).into(), parents: Frontier::root() },
        ])
    }

    #[test]
    fn version_contains_smoke() {
        let g = fancy_graph();
        assert!(g.version_contains(&[10], 0));
        assert!(g.version_contains(&[10], 5));
        assert!(g.version_contains(&[10], 8));
        assert!(g.version_contains(&[5], 2));
        assert!(!g.version_contains(&[5], 6));
        assert!(!g.version_contains(&[8], 3));
        assert!(!g.version_contains(&[10], 11));
        assert!(!g.version_contains(&[], 0));
        assert!(g.version_contains(&[3, 6], 6));
    }

    #[test]
    fn version_cmp_smoke() {
        let g = fancy_graph();
        assert_eq!(g.version_cmp(2, 2), Some(Ordering::Equal));
        assert_eq!(g.version_cmp(2, 10), Some(Ordering::Less));
        assert_eq!(g.version_cmp(10, 2), Some(Ordering::Greater));
        assert_eq!(g.version_cmp(4, 7), None);
        assert_eq!(g.version_cmp(0, 11), None);
    }

    #[test]
    fn diff_linear_and_branching() {
        let g = fancy_graph();

        // Linear.
        let (a, b) = g.diff(&[1], &[2]);
        assert!(a.is_empty());
        assert_eq!(b.as_slice(), &[(2..3).into()]);

        // Branching.
        let (a, b) = g.diff(&[5], &[8]);
        assert_eq!(a.as_slice(), &[(3..6).into()]);
        assert_eq!(b.as_slice(), &[(6..9).into()]);

        // One side dominates.
        let (a, b) = g.diff(&[10], &[5]);
        assert_eq!(a.as_slice(), &[(6..11).into()]);
        assert!(b.is_empty());

        // Totally disjoint histories.
        let (a, b) = g.diff(&[2], &[12]);
        assert_eq!(a.as_slice(), &[(0..3).into()]);
        assert_eq!(b.as_slice(), &[(11..13).into()]);

        // Equal frontiers.
        let (a, b) = g.diff(&[9], &[9]);
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn diff_vs_contains_agrees() {
        let g = fancy_graph();
        for a in 0..g.next_lv() {
            for b in (a + 1)..g.next_lv() {
                let (only_a, _) = g.diff(&[a], &[b]);
                assert_eq!(g.version_contains(&[b], a), only_a.is_empty(),
                    "mismatch between diff and version_contains at ({}, {})", a, b);
            }
        }
    }

    #[test]
    fn find_conflicting_returns_common_ancestor() {
        let g = fancy_graph();

        let mut visited = vec![];
        let common = g.find_conflicting(&[5], &[8], |range, flag| {
            visited.push((range, flag));
        });
        assert_eq!(common.as_ref(), &[2]);
        // Visits arrive in reverse LV order.
        visited.reverse();
        assert_eq!(visited, vec![
            ((3..6).into(), OnlyA),
            ((6..9).into(), OnlyB),
        ]);

        // Direct descendant fast path.
        let mut visited = vec![];
        let common = g.find_conflicting(&[0], &[2], |range, flag| {
            visited.push((range, flag));
        });
        assert_eq!(common.as_ref(), &[0]);
        assert_eq!(visited, vec![((1..3).into(), OnlyB)]);

        // Disjoint roots walk down to the document root.
        let common = g.find_conflicting(&[2], &[12], |_, _| {});
        assert!(common.is_root());
    }

    #[test]
    fn find_conflicting_through_merge() {
        let g = fancy_graph();

        // From the merge point vs one of its legs.
        let mut visited = vec![];
        let common = g.find_conflicting(&[10], &[4], |range, flag| {
            visited.push((range, flag));
        });
        assert_eq!(common.as_ref(), &[2]);
        visited.reverse();
        assert_eq!(visited, vec![
            ((3..5).into(), Shared),
            ((5..6).into(), OnlyA),
            ((6..9).into(), OnlyA),
            ((9..11).into(), OnlyA),
        ]);
    }

    #[test]
    fn dominators_smoke() {
        let g = fancy_graph();
        assert_eq!(g.find_dominators(&[0, 1, 2]).as_ref(), &[2]);
        assert_eq!(g.find_dominators(&[5, 8]).as_ref(), &[5, 8]);
        assert_eq!(g.find_dominators(&[5, 8, 10]).as_ref(), &[10]);
        assert_eq!(g.find_dominators(&[2, 12]).as_ref(), &[2, 12]);
        assert_eq!(g.find_dominators(&[9, 10, 11]).as_ref(), &[10, 11]);
        assert!(g.find_dominators(&[]).is_root());
    }

    #[test]
    fn dominators_2_smoke() {
        let g = fancy_graph();
        assert_eq!(g.find_dominators_2(&[5], &[8]).as_ref(), &[5, 8]);
        assert_eq!(g.find_dominators_2(&[5], &[10]).as_ref(), &[10]);
        assert_eq!(g.find_dominators_2(&[], &[3]).as_ref(), &[3]);
        assert_eq!(g.find_dominators_2(&[5, 8], &[10]).as_ref(), &[10]);
    }

    #[test]
    fn fast_forward_predicates_differ() {
        // 0 1 2, then two concurrent runs (3, 4) which merge at 5.
        let g = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..3).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (3..4).into(), parents: Frontier::new_1(2) },
            GraphEntrySimple { span: (4..5).into(), parents: Frontier::new_1(2) },
            GraphEntrySimple { span: (5..6).into(), parents: Frontier::from_sorted(&[3, 4]) },
        ]);

        // Everything in [2]'s view is still reachable from [5]...
        assert!(g.is_fast_forward(&[2], &[5]));
        // ...but the interior contains concurrency, so the ops can't be
        // applied positionally.
        assert!(!g.can_fast_forward(&[2], &[5]));

        // A linear tail passes both tests.
        assert!(g.is_fast_forward(&[0], &[2]));
        assert!(g.can_fast_forward(&[0], &[2]));
        assert_eq!(g.fast_forward_spans(&[0], &[2]).unwrap().as_slice(),
            &[(1..3).into()]);

        // Concurrent frontiers pass neither.
        assert!(!g.is_fast_forward(&[3], &[4]));
        assert!(!g.can_fast_forward(&[3], &[4]));

        // Equal frontiers trivially fast-forward.
        assert!(g.can_fast_forward(&[3], &[3]));
    }
}
