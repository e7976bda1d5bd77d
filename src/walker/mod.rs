//! The replay engine. A [`Tracker`] is the transient edit context built for
//! one checkout or merge: an order-statistic tree of items plus the indexes
//! needed to move the walk's version around the graph. It is discarded as
//! soon as the replay finishes - no per-document CRDT state survives between
//! edits.

mod item;
mod ost;
mod advance_retreat;
mod apply;

use crate::{Frontier, LV};
use crate::lvrange::{is_placeholder, PLACEHOLDER_START};
use crate::walker::item::{Item, INSERTED, NO_ITEM};
use crate::walker::ost::{DocCursor, ItemTree, NodeIdx};

/// Cursor memo from the previous apply. Purely a speedup for runs of
/// sequential typing; correctness never depends on it.
#[derive(Debug, Clone, Copy)]
struct CursorHint {
    pos: usize,
    cursor: DocCursor,
}

#[derive(Debug)]
pub(crate) struct Tracker {
    items: ItemTree,

    /// Tree node for each insert op we've applied, indexed by LV.
    nodes_by_lv: Vec<NodeIdx>,

    /// For each delete op we've applied, the op id of the item it deleted.
    del_targets: Vec<LV>,

    /// Tree nodes of the placeholder items seeded before a partial replay.
    placeholder_nodes: Vec<NodeIdx>,

    /// The version the walk is currently sitting at.
    pub(crate) cur_version: Frontier,

    hint: Option<CursorHint>,
}

impl Tracker {
    /// A tracker seeded for a partial replay starting at `cur_version`.
    ///
    /// `placeholder_len` items are inserted up front to stand in for
    /// everything that could already be in the document at that version.
    /// Placeholders are order-isomorphic to the real items: the ops being
    /// replayed only ever address positions within the already-known region,
    /// so the surplus placeholders form an inert tail.
    pub(crate) fn new_at(num_ops: usize, cur_version: Frontier, placeholder_len: usize) -> Self {
        let mut items = ItemTree::with_capacity(placeholder_len + 32);
        let mut placeholder_nodes = Vec::with_capacity(placeholder_len);

        for i in 0..placeholder_len {
            let item = Item {
                op_id: PLACEHOLDER_START + i,
                cur_state: INSERTED,
                end_state: INSERTED,
                origin_left: NO_ITEM,
                right_parent: NO_ITEM,
            };
            placeholder_nodes.push(items.insert_at(i, item));
        }

        Self {
            items,
            nodes_by_lv: vec![NodeIdx::NONE; num_ops],
            del_targets: vec![NO_ITEM; num_ops],
            placeholder_nodes,
            cur_version,
            hint: None,
        }
    }

    fn node_for_op(&self, op_id: LV) -> NodeIdx {
        let n = if is_placeholder(op_id) {
            self.placeholder_nodes[op_id - PLACEHOLDER_START]
        } else {
            self.nodes_by_lv[op_id]
        };
        assert!(n.exists(), "op {} has no item in the tracker", op_id);
        n
    }

    /// Find the cursor after `target_pos` currently-visible items, using the
    /// hint from the previous apply when the target is just ahead of it.
    fn cursor_at(&self, target_pos: usize) -> DocCursor {
        const HINT_MAX_FWD: usize = 4;

        if let Some(hint) = &self.hint {
            if target_pos >= hint.pos && target_pos - hint.pos <= HINT_MAX_FWD {
                let mut cur_pos = hint.pos;
                let mut cursor = hint.cursor;
                if cur_pos == target_pos { return cursor; }

                let mut n = self.items.node_at_index(cursor.idx);
                loop {
                    debug_assert!(n.exists());
                    let item = self.items.item(n);
                    if item.cur_state.is_inserted() { cur_pos += 1; }
                    if item.end_state.is_inserted() { cursor.end_pos += 1; }
                    cursor.idx += 1;

                    if cur_pos == target_pos { return cursor; }
                    n = self.items.successor(n);
                }
            }
        }

        self.items.find_by_cur_pos(target_pos)
    }
}
