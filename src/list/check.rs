use std::fmt::Debug;

use crate::list::operation::ListOpKind;
use crate::list::{ListCRDT, ListOpLog};

impl<T> ListOpLog<T> {
    /// Panic if the log is internally inconsistent. Testing tool.
    pub fn dbg_check(&self, deep: bool) {
        assert_eq!(self.ops.len(), self.cg.len(),
            "op list and causal graph must stay 1:1");

        for (lv, op) in self.ops.iter().enumerate() {
            match op.kind {
                ListOpKind::Ins => assert!(op.content.is_some(),
                    "insert {} has no content", lv),
                ListOpKind::Del => assert!(op.content.is_none(),
                    "delete {} carries content", lv),
            }
        }

        self.cg.dbg_check(deep);
    }
}

impl<T: Clone + Eq + Debug> ListCRDT<T> {
    /// Panic if the document is internally inconsistent. The deep check
    /// verifies the snapshot against a from-scratch replay.
    pub fn dbg_check(&self, deep: bool) {
        self.oplog.dbg_check(deep);
        self.branch.version.debug_check_sorted();

        if deep {
            let expect = self.oplog.checkout_at(self.branch.local_version());
            assert_eq!(self.branch.content, expect.content,
                "snapshot disagrees with replay");
        }
    }
}
