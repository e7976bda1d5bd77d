use std::fmt::{Debug, Formatter};

use crate::LV;
use crate::lvrange::debug_lv_raw;

/// 0 = not inserted yet,
/// 1 = inserted,
/// 2+ = deleted n-1 times.
///
/// Deletes are counted so that duplicate concurrent deletes reconcile
/// cleanly as the walk advances and retreats over them. A u32 is plenty -
/// overflowing it takes ~4 billion deletes of one character.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) struct ItemState(u32);

pub(crate) const NOT_INSERTED_YET: ItemState = ItemState(0);
pub(crate) const INSERTED: ItemState = ItemState(1);
pub(crate) const DELETED_ONCE: ItemState = ItemState(2);

impl ItemState {
    pub(crate) fn is_inserted(self) -> bool {
        self == INSERTED
    }

    pub(crate) fn is_deleted(self) -> bool {
        self.0 >= DELETED_ONCE.0
    }

    pub(crate) fn delete(&mut self) {
        if *self == NOT_INSERTED_YET {
            panic!("invalid delete target - item is not inserted");
        }
        self.0 = self.0.checked_add(1)
            .expect("delete count overflow - refusing to merge");
    }

    pub(crate) fn undelete(&mut self) {
        if !self.is_deleted() {
            panic!("invalid undelete target - item is not deleted");
        }
        self.0 -= 1;
    }

    pub(crate) fn mark_inserted(&mut self) {
        if *self != NOT_INSERTED_YET {
            panic!("invalid insert target - item already inserted");
        }
        *self = INSERTED;
    }

    pub(crate) fn mark_not_inserted_yet(&mut self) {
        if *self != INSERTED {
            panic!("invalid retreat target - item not inserted");
        }
        *self = NOT_INSERTED_YET;
    }
}

/// One item in the replay structure: a single inserted element's op, with its
/// Fugue origins and both state views. `cur_state` tracks visibility at the
/// walk's moving version; `end_state` tracks visibility in the final
/// document.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Item {
    pub op_id: LV,

    pub cur_state: ItemState,
    pub end_state: ItemState,

    /// The item this one was inserted directly after in its author's view,
    /// or usize::MAX for the document start.
    pub origin_left: LV,

    /// The Fugue right parent: set when this item shares its left origin
    /// with the first visible item after it, usize::MAX otherwise.
    pub right_parent: LV,
}

pub(crate) const NO_ITEM: LV = usize::MAX;

impl Debug for Item {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Item");
        debug_lv_raw(self.op_id, |v| { s.field("op_id", v); });
        s.field("cur_state", &self.cur_state);
        s.field("end_state", &self.end_state);
        debug_lv_raw(self.origin_left, |v| { s.field("origin_left", v); });
        debug_lv_raw(self.right_parent, |v| { s.field("right_parent", v); });
        s.finish()
    }
}
