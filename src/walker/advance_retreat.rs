use crate::LV;
use crate::list::operation::ListOpKind;
use crate::list::ListOpLog;
use crate::lvrange::LVRange;
use crate::walker::item::NO_ITEM;
use crate::walker::Tracker;

impl Tracker {
    /// The item an op touched: the op itself for inserts, the deleted item
    /// for deletes.
    fn target_of<T>(&self, oplog: &ListOpLog<T>, lv: LV) -> LV {
        match oplog.ops[lv].kind {
            ListOpKind::Ins => lv,
            ListOpKind::Del => {
                let target = self.del_targets[lv];
                assert_ne!(target, NO_ITEM, "retreat/advance over an unapplied delete");
                target
            }
        }
    }

    /// Move the walk's version forward over one already-applied op.
    /// Only `cur_state` moves; the final document state is untouched.
    pub(crate) fn advance_op<T>(&mut self, oplog: &ListOpLog<T>, lv: LV) {
        let target = self.target_of(oplog, lv);
        let n = self.node_for_op(target);

        let item = self.items.item_mut(n);
        match oplog.ops[lv].kind {
            ListOpKind::Ins => item.cur_state.mark_inserted(),
            ListOpKind::Del => item.cur_state.delete(),
        }
        self.items.refresh_counts(n);
    }

    /// Move the walk's version backward over one already-applied op.
    pub(crate) fn retreat_op<T>(&mut self, oplog: &ListOpLog<T>, lv: LV) {
        let target = self.target_of(oplog, lv);
        let n = self.node_for_op(target);

        let item = self.items.item_mut(n);
        match oplog.ops[lv].kind {
            ListOpKind::Ins => item.cur_state.mark_not_inserted_yet(),
            ListOpKind::Del => item.cur_state.undelete(),
        }
        self.items.refresh_counts(n);
    }

    pub(crate) fn advance_by_range<T>(&mut self, oplog: &ListOpLog<T>, range: LVRange) {
        for lv in range.iter() {
            self.advance_op(oplog, lv);
        }
    }

    /// Retreats run in reverse so that an insert-then-delete of the same item
    /// un-deletes before it un-inserts.
    pub(crate) fn retreat_by_range<T>(&mut self, oplog: &ListOpLog<T>, range: LVRange) {
        for lv in range.iter().rev() {
            self.retreat_op(oplog, lv);
        }
    }
}
