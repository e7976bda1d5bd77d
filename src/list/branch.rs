use std::ops::Range;

use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::causalgraph::graph::tools::DiffFlag;
use crate::{AgentId, Frontier, LV, Result};
use crate::frontier::{local_frontier_eq, FrontierRef};
use crate::list::operation::ListOpKind;
use crate::list::snapshot::{NullSink, SnapshotSink};
use crate::list::{ListBranch, ListOpLog};
use crate::lvrange::LVRange;
use crate::rle::AppendRle;
use crate::walker::Tracker;

impl<T> ListBranch<T> {
    /// A new (empty) branch at the root version.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            version: Frontier::root(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn local_version(&self) -> FrontierRef<'_> {
        self.version.as_ref()
    }

    /// Bring this branch up to `merge_version`, replaying whatever subset of
    /// the log is needed. When the new operations linearly extend the
    /// branch's version they're applied directly; otherwise the conflicting
    /// region is replayed through a fresh edit context.
    pub fn merge(&mut self, oplog: &ListOpLog<T>, merge_version: FrontierRef)
        where T: Clone
    {
        assert!(merge_version.iter().all(|&v| v < oplog.len()),
            "merge version is not in the operation log");
        merge_changes_into_snapshot(oplog, &mut self.version, &mut self.content, merge_version);
    }
}

impl<T: Clone> ListBranch<T> {
    fn assert_at_tip(&self, oplog: &ListOpLog<T>) {
        assert!(local_frontier_eq(self.version.as_ref(), oplog.cg.version.as_ref()),
            "local edits require the branch to be at the log's version - merge first");
    }

    /// Insert through this branch, appending to the log and splicing the
    /// snapshot in one step. The branch must be at the log's version.
    pub fn insert(&mut self, oplog: &mut ListOpLog<T>, agent: AgentId, pos: usize, content: &[T]) -> LV {
        self.assert_at_tip(oplog);
        assert!(pos <= self.content.len(), "insert past end of document");

        let v = oplog.add_insert(agent, pos, content);
        for (i, c) in content.iter().enumerate() {
            self.content.insert(pos + i, c.clone());
        }
        self.version.replace_with_1(v);
        v
    }

    /// Delete through this branch. The branch must be at the log's version.
    pub fn delete(&mut self, oplog: &mut ListOpLog<T>, agent: AgentId, del_range: Range<usize>) -> Result<LV> {
        self.assert_at_tip(oplog);
        assert!(del_range.end <= self.content.len(), "delete past end of document");

        let v = oplog.add_delete(agent, del_range.clone())?;
        self.content.drain(del_range);
        self.version.replace_with_1(v);
        Ok(v)
    }
}

impl<T> Default for ListBranch<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The merge engine shared by every snapshot flavor (vecs, ropes, version
///-only merges through a null sink).
pub(crate) fn merge_changes_into_snapshot<T: Clone, S: SnapshotSink<T>>(
    oplog: &ListOpLog<T>,
    version: &mut Frontier,
    content: &mut S,
    merge_version: FrontierRef,
) {
    // Fast path: when the new operations linearly extend our version, each
    // op's recorded position is already a position in this snapshot. No
    // concurrency resolution needed.
    if let Some(spans) = oplog.cg.graph.fast_forward_spans(version.as_ref(), merge_version) {
        for span in spans {
            for lv in span.iter() {
                let op = &oplog.ops[lv];
                match op.kind {
                    ListOpKind::Ins => {
                        content.insert_item(op.pos, op.content.clone().unwrap());
                    }
                    ListOpKind::Del => {
                        content.remove_item(op.pos);
                    }
                }
            }
        }

        *version = oplog.cg.graph.find_dominators_2(version.as_ref(), merge_version);
        return;
    }

    // Slow path. Split the graph between our version and the merge target
    // into the conflict region (everything from the common ancestor up to
    // our version - already reflected in the snapshot) and the new region.
    let mut new_ops: SmallVec<LVRange, 4> = smallvec![];
    let mut conflict_ops: SmallVec<LVRange, 4> = smallvec![];

    let common_ancestor = oplog.cg.graph.find_conflicting(
        version.as_ref(), merge_version,
        |span, flag| {
            // Visits arrive in reverse order.
            let target = if flag == DiffFlag::OnlyB { &mut new_ops } else { &mut conflict_ops };
            target.push_reversed_rle(span);
        });
    new_ops.reverse();
    conflict_ops.reverse();

    debug!(?common_ancestor, conflict_spans = conflict_ops.len(),
        new_spans = new_ops.len(), "replaying merge");

    // Items inserted before the common ancestor are represented by
    // placeholders: the replayed ops only address positions inside the
    // already-known region, so stand-ins which preserve item order are
    // enough, and one per possible version is always enough of them.
    let placeholder_len = version.last().map_or(0, |&v| v + 1);
    let mut tracker = Tracker::new_at(oplog.len(), common_ancestor, placeholder_len);

    // First rebuild the walk's state over the conflict region without
    // touching the snapshot (the snapshot already contains those edits)...
    for &span in conflict_ops.iter() {
        tracker.apply_range(oplog, Option::<&mut NullSink>::None, span);
    }

    // ...then replay the new operations into the snapshot for real.
    for &span in new_ops.iter() {
        tracker.apply_range(oplog, Some(&mut *content), span);
    }

    *version = oplog.cg.graph.find_dominators_2(version.as_ref(), merge_version);
}

#[cfg(test)]
mod tests {
    use crate::list::ListOpLog;

    #[test]
    fn empty_checkout() {
        let oplog = ListOpLog::<char>::new();
        let branch = oplog.checkout();
        assert!(branch.is_empty());
        assert!(branch.local_version().is_empty());
    }

    #[test]
    fn branch_at_old_version() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        let after_ins = oplog.add_insert_str(seph, 0, "hi there");
        let after_del = oplog.add_delete(seph, 2..2 + " there".len()).unwrap();

        let b1 = oplog.checkout_at(&[after_ins]);
        assert_eq!(b1.content().iter().collect::<String>(), "hi there");
        assert_eq!(b1.local_version(), &[after_ins]);

        let b2 = oplog.checkout_at(&[after_del]);
        assert_eq!(b2.content().iter().collect::<String>(), "hi");
    }

    #[test]
    fn incremental_merge_matches_checkout() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        let mike = oplog.get_or_create_agent_id("mike");

        let a = oplog.add_insert_str_at(seph, &[], 0, "aaa");
        let b = oplog.add_insert_str_at(mike, &[], 0, "bbb");

        // Merge one branch at a time into the same snapshot.
        let mut branch = oplog.checkout_at(&[a]);
        branch.merge(&oplog, &[a, b]);

        let direct = oplog.checkout();
        assert_eq!(branch, direct);
    }

    #[test]
    fn concurrent_inserts_order_by_agent() {
        // Two peers typing from an empty document. The result interleaves
        // whole runs, ordered by agent name.
        let mut oplog = ListOpLog::new();
        let a = oplog.get_or_create_agent_id("alice");
        let b = oplog.get_or_create_agent_id("bob");

        oplog.add_insert_str_at(a, &[], 0, "Hello");
        oplog.add_insert_str_at(b, &[], 0, "World");

        assert_eq!(oplog.checkout_simple_string(), "HelloWorld");
    }

    #[test]
    fn insert_vs_delete_of_region() {
        // Common ancestor "hello"; one peer appends "!", the other deletes
        // the whole word. The append survives.
        let mut oplog = ListOpLog::new();
        let a = oplog.get_or_create_agent_id("alice");
        let b = oplog.get_or_create_agent_id("bob");

        let base = oplog.add_insert_str(a, 0, "hello");
        oplog.add_insert_str_at(a, &[base], 5, "!");
        oplog.add_delete_at(b, &[base], 0..5).unwrap();

        assert_eq!(oplog.checkout_simple_string(), "!");
    }

    #[test]
    fn three_concurrent_inserts() {
        let mut oplog = ListOpLog::new();
        let a = oplog.get_or_create_agent_id("alice");
        let b = oplog.get_or_create_agent_id("bob");
        let c = oplog.get_or_create_agent_id("carol");

        let base = oplog.add_insert_str(a, 0, "x");
        oplog.add_insert_str_at(a, &[base], 1, "A");
        oplog.add_insert_str_at(b, &[base], 1, "B");
        oplog.add_insert_str_at(c, &[base], 1, "C");

        assert_eq!(oplog.checkout_simple_string(), "xABC");
    }

    #[test]
    fn same_position_tie_break_flips_with_names() {
        for (first, second, expect) in [
            ("alice", "bob", "aXYb"),
            ("bob", "alice", "aYXb"),
        ] {
            let mut oplog = ListOpLog::new();
            let f = oplog.get_or_create_agent_id(first);
            let s = oplog.get_or_create_agent_id(second);

            let base = oplog.add_insert_str(f, 0, "ab");
            oplog.add_insert_str_at(f, &[base], 1, "X");
            oplog.add_insert_str_at(s, &[base], 1, "Y");

            assert_eq!(oplog.checkout_simple_string(), expect);
        }
    }

    #[test]
    fn concurrent_double_delete_converges() {
        let mut oplog = ListOpLog::new();
        let a = oplog.get_or_create_agent_id("alice");
        let b = oplog.get_or_create_agent_id("bob");

        let base = oplog.add_insert_str(a, 0, "abc");
        oplog.add_delete_at(a, &[base], 1..2).unwrap();
        oplog.add_delete_at(b, &[base], 1..2).unwrap();

        // 'b' is deleted once in everyone's view, not twice.
        assert_eq!(oplog.checkout_simple_string(), "ac");
        oplog.dbg_check(true);
    }

    #[test]
    fn fast_forward_merge_equals_full_checkout() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.add_insert_str(seph, 0, "abc");

        let mut branch = oplog.checkout();
        assert_eq!(branch.content().iter().collect::<String>(), "abc");

        // Append more and bring the branch up via the linear path.
        oplog.add_insert_str(seph, 3, "def");
        branch.merge(&oplog, oplog.local_version());

        assert_eq!(branch.content().iter().collect::<String>(), "abcdef");
        assert_eq!(branch, oplog.checkout());
    }

    #[test]
    fn branch_local_edits() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");

        let mut branch = oplog.checkout();
        branch.insert(&mut oplog, seph, 0, &['a', 'b', 'c']);
        branch.delete(&mut oplog, seph, 0..1).unwrap();
        branch.insert(&mut oplog, seph, 2, &['!']);

        assert_eq!(branch.content(), &['b', 'c', '!']);
        assert_eq!(branch, oplog.checkout());
        oplog.dbg_check(true);
    }

    #[test]
    #[should_panic(expected = "merge first")]
    fn stale_branch_rejects_local_edits() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.add_insert_str(seph, 0, "abc");

        let mut branch = oplog.checkout();
        oplog.add_insert_str(seph, 3, "d");

        // The branch hasn't merged the new op, so editing through it would
        // corrupt the version bookkeeping.
        branch.insert(&mut oplog, seph, 0, &['x']);
    }

    #[test]
    fn large_sequential_document() {
        // A long run of sequential typing replays through the linear path.
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");

        let mut expected = String::new();
        let alphabet: Vec<char> = "abcdefghijklmnopqrstuvwxyz".chars().collect();
        for i in 0..50_000 {
            let c = alphabet[i % alphabet.len()];
            oplog.add_insert(seph, i, &[c]);
            expected.push(c);
        }

        assert_eq!(oplog.checkout_simple_string(), expected);
    }
}
