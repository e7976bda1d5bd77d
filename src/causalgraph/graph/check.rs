use crate::causalgraph::graph::Graph;
use crate::frontier::frontier_is_sorted;

impl Graph {
    /// Panic if the graph is internally inconsistent. Testing tool.
    #[allow(unused)]
    pub(crate) fn dbg_check(&self) {
        let mut expect_start = 0;
        for entry in self.0.iter() {
            assert!(!entry.span.is_empty());
            assert_eq!(entry.span.start, expect_start, "entries must be packed");
            expect_start = entry.span.end;

            assert!(frontier_is_sorted(entry.parents.as_ref()));
            for &p in entry.parents.iter() {
                assert!(p < entry.span.start, "parents must come before the entry");
            }

            // A single parent naming the previous version should have been
            // merged into the previous entry.
            if entry.parents.len() == 1 && entry.span.start > 0 {
                // (Unless the previous entry ends elsewhere - which can't
                // happen in a packed list.)
                assert_ne!(entry.parents[0], entry.span.start - 1,
                    "linear entries should coalesce");
            }
        }
    }
}
