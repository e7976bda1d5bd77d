use std::cmp::Ordering;

use tracing::trace;

use crate::LV;
use crate::list::operation::ListOpKind;
use crate::list::snapshot::SnapshotSink;
use crate::list::ListOpLog;
use crate::lvrange::LVRange;
use crate::walker::item::{Item, DELETED_ONCE, INSERTED, NOT_INSERTED_YET, NO_ITEM};
use crate::walker::ost::{DocCursor, NodeIdx};
use crate::walker::{CursorHint, Tracker};

impl Tracker {
    /// Apply one operation at the walk's current version, mutating the
    /// snapshot (when one is attached) at the op's final-document position.
    ///
    /// The walk must already be positioned at the op's parents.
    fn apply_op<T: Clone, S: SnapshotSink<T>>(
        &mut self,
        oplog: &ListOpLog<T>,
        to: Option<&mut S>,
        lv: LV,
    ) {
        let op = &oplog.ops[lv];

        match op.kind {
            ListOpKind::Del => {
                let mut cursor = self.cursor_at(op.pos);

                // The author deleted the item at `pos` in their view. Items
                // not visible at the walk's current version sit between the
                // cursor and that item; skip over them.
                let mut n = self.node_at_cursor(cursor);
                loop {
                    let item = self.items.item(n);
                    if item.cur_state.is_inserted() { break; }

                    cursor.end_pos += item.end_state.is_inserted() as usize;
                    cursor.idx += 1;
                    n = self.items.successor(n);
                    assert!(n.exists(), "delete found no visible item");
                }

                let item = self.items.item_mut(n);
                item.cur_state.delete();
                let was_in_doc = item.end_state.is_inserted();
                item.end_state = DELETED_ONCE;
                let target = item.op_id;
                self.items.refresh_counts(n);

                if was_in_doc {
                    if let Some(to) = to {
                        to.remove_item(cursor.end_pos);
                    }
                }
                // A concurrent delete of the same item leaves the document
                // untouched - the item is already gone from the end state.

                self.del_targets[lv] = target;
                self.hint = None;
            }

            ListOpKind::Ins => {
                let mut cursor = self.cursor_at(op.pos);

                let origin_left = if cursor.idx == 0 { NO_ITEM } else {
                    self.items.item(self.items.node_at_index(cursor.idx - 1)).op_id
                };

                // Fugue's right parent: scan for the first item at or after
                // the cursor which the author could see. If it hangs off the
                // same left origin as us, it's our right parent; otherwise
                // we're an end-of-block insert and have none.
                let right_parent = {
                    let mut n = if cursor.idx < self.items.len() {
                        self.items.node_at_index(cursor.idx)
                    } else {
                        NodeIdx::NONE
                    };
                    let mut found = NO_ITEM;
                    while n.exists() {
                        let item = self.items.item(n);
                        if item.cur_state != NOT_INSERTED_YET {
                            if item.origin_left == origin_left {
                                found = item.op_id;
                            }
                            break;
                        }
                        n = self.items.successor(n);
                    }
                    found
                };

                let item = Item {
                    op_id: lv,
                    cur_state: INSERTED,
                    end_state: INSERTED,
                    origin_left,
                    right_parent,
                };

                self.integrate(oplog, &item, &mut cursor);

                let node = self.items.insert_at(cursor.idx, item);
                self.nodes_by_lv[lv] = node;

                if let Some(to) = to {
                    // The content was validated when the op entered the log.
                    to.insert_item(cursor.end_pos, op.content.clone().unwrap());
                }

                self.hint = Some(CursorHint {
                    pos: op.pos + 1,
                    cursor: DocCursor {
                        idx: cursor.idx + 1,
                        end_pos: cursor.end_pos + 1,
                    },
                });
            }
        }
    }

    fn node_at_cursor(&self, cursor: DocCursor) -> NodeIdx {
        assert!(cursor.idx < self.items.len(), "cursor ran off the document");
        self.items.node_at_index(cursor.idx)
    }

    fn index_of_op(&self, op_id: LV) -> isize {
        if op_id == NO_ITEM {
            -1
        } else {
            self.items.index_of_node(self.node_for_op(op_id)) as isize
        }
    }

    /// Resolve where a new item lands among concurrent inserts at the same
    /// position (Fugue / YjsMod). The cursor is moved to the final insertion
    /// point.
    ///
    /// Items the walk hasn't inserted yet at this version are exactly the
    /// ones concurrent with `new_item`; we scan across them comparing
    /// origins, with ties broken by the deterministic agent order.
    fn integrate<T>(&mut self, oplog: &ListOpLog<T>, new_item: &Item, cursor: &mut DocCursor) {
        if cursor.idx == self.items.len() { return; }

        let mut scan_node = self.items.node_at_index(cursor.idx);
        if self.items.item(scan_node).cur_state != NOT_INSERTED_YET { return; }

        // While `scanning`, we're tentatively walking through a rival block
        // whose fate isn't decided; the cursor stays parked at the last
        // committed spot until the block resolves.
        let mut scanning = false;
        let mut scan = *cursor;

        let left_idx = cursor.idx as isize - 1;
        let right_idx = if new_item.right_parent == NO_ITEM {
            self.items.len() as isize
        } else {
            self.index_of_op(new_item.right_parent)
        };

        loop {
            if scan.idx == self.items.len() { break; }
            if scan.idx as isize == right_idx { break; }

            let other = *self.items.item(scan_node);
            if other.cur_state != NOT_INSERTED_YET { break; }

            let oleft_idx = self.index_of_op(other.origin_left);

            if oleft_idx < left_idx {
                break;
            } else if oleft_idx == left_idx {
                let oright_idx = if other.right_parent == NO_ITEM {
                    self.items.len() as isize
                } else {
                    self.index_of_op(other.right_parent)
                };

                if oright_idx == right_idx
                    && oplog.cg.tie_break_versions(new_item.op_id, other.op_id) == Ordering::Less
                {
                    break;
                }
                scanning = oright_idx < right_idx;
            }

            scan.end_pos += other.end_state.is_inserted() as usize;
            scan.idx += 1;
            scan_node = self.items.successor(scan_node);

            if !scanning {
                *cursor = scan;
            }
        }
    }

    /// Replay every op in `range` in log order, moving the walk's version to
    /// each op's parents first (retreating and advancing over already-applied
    /// ops as needed).
    pub(crate) fn apply_range<T: Clone, S: SnapshotSink<T>>(
        &mut self,
        oplog: &ListOpLog<T>,
        mut to: Option<&mut S>,
        range: LVRange,
    ) {
        if range.is_empty() { return; }

        trace!(?range, cur_version = ?self.cur_version, "replaying range");

        for entry in oplog.cg.graph.iter_range(range) {
            let (only_ours, only_parents) = oplog.cg.graph
                .diff(self.cur_version.as_ref(), entry.parents.as_ref());

            let moved = !only_ours.is_empty() || !only_parents.is_empty();

            // Retreat from the newest op backwards, then advance oldest
            // first, so state counters unwind in the order they were applied.
            for &r in only_ours.iter().rev() {
                self.retreat_by_range(oplog, r);
            }
            for &r in only_parents.iter() {
                self.advance_by_range(oplog, r);
            }

            if moved {
                self.hint = None;
            }

            for lv in entry.span.iter() {
                self.apply_op(oplog, to.as_deref_mut(), lv);
            }

            self.cur_version.replace_with_1(entry.span.last());
        }
    }
}
