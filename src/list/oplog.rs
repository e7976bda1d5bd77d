use std::ops::Range;

use str_indices::chars::count as count_chars;
use tracing::debug;

use crate::{AgentId, Frontier, LV};
use crate::causalgraph::agent_span::AgentSpan;
use crate::causalgraph::remote_ids::RemoteVersion;
use crate::error::{EgWalkerError, Result};
use crate::frontier::FrontierRef;
use crate::list::operation::{ListOp, ListOpKind};
use crate::list::{ListBranch, ListOpLog};
use crate::rle::HasLength;

impl<T> Default for ListOpLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListOpLog<T> {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            cg: Default::default(),
        }
    }

    /// The number of operations in the log.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.cg.get_or_create_agent_id(name)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.cg.get_agent_name(agent)
    }

    /// The version you'd be at if you merged every operation in the log.
    pub fn local_version(&self) -> FrontierRef<'_> {
        self.cg.version.as_ref()
    }

    /// Append new locally-authored inserts, one op per element, with parents
    /// at the current log version. Returns the last new LV.
    pub fn add_insert(&mut self, agent: AgentId, pos: usize, content: &[T]) -> LV
        where T: Clone
    {
        assert!(!content.is_empty(), "insert must contain content");
        for (i, c) in content.iter().enumerate() {
            self.ops.push(ListOp::ins(pos + i, c.clone()));
        }
        self.cg.assign_local_op(agent, content.len()).last()
    }

    /// Like [`add_insert`](Self::add_insert), editing from an explicit
    /// (usually older) version.
    pub fn add_insert_at(&mut self, agent: AgentId, parents: FrontierRef, pos: usize, content: &[T]) -> LV
        where T: Clone
    {
        assert!(!content.is_empty(), "insert must contain content");
        for (i, c) in content.iter().enumerate() {
            self.ops.push(ListOp::ins(pos + i, c.clone()));
        }
        self.cg.assign_local_op_with_parents(parents, agent, content.len()).last()
    }

    /// Append locally-authored deletes covering `del_range` in the author's
    /// current view. All the ops share the same position - each delete
    /// removes the next item at that spot.
    pub fn add_delete(&mut self, agent: AgentId, del_range: Range<usize>) -> Result<LV> {
        let len = del_range.len();
        if len == 0 {
            return Err(EgWalkerError::InvalidLength);
        }

        for _ in 0..len {
            self.ops.push(ListOp::del(del_range.start));
        }
        Ok(self.cg.assign_local_op(agent, len).last())
    }

    /// The explicit-parents form of [`add_delete`](Self::add_delete).
    pub fn add_delete_at(&mut self, agent: AgentId, parents: FrontierRef, del_range: Range<usize>) -> Result<LV> {
        let len = del_range.len();
        if len == 0 {
            return Err(EgWalkerError::InvalidLength);
        }

        for _ in 0..len {
            self.ops.push(ListOp::del(del_range.start));
        }
        Ok(self.cg.assign_local_op_with_parents(parents, agent, len).last())
    }

    /// Ingest one foreign operation. Returns false (and does nothing) when
    /// the op is already known. The op's parents must already be in the log.
    pub fn push_op(
        &mut self,
        id: RemoteVersion,
        parents: &[RemoteVersion],
        kind: ListOpKind,
        pos: usize,
        content: Option<T>,
    ) -> Result<bool> {
        if kind == ListOpKind::Ins && content.is_none() {
            return Err(EgWalkerError::MissingContent { agent: id.0.into(), seq: id.1 });
        }

        if let Some(agent) = self.cg.get_agent_id(id.0) {
            if self.cg.has_agent_version((agent, id.1)) {
                return Ok(false);
            }
        }

        let parents = self.cg.agent_assignment
            .remote_to_local_frontier(parents.iter().copied())?;

        let agent = self.cg.get_or_create_agent_id(id.0);
        let span = self.cg.merge_and_assign(parents.as_ref(), AgentSpan {
            agent,
            seq_range: (id.1..id.1 + 1).into(),
        })?;

        if span.is_empty() {
            return Ok(false);
        }
        if span.start != self.ops.len() {
            return Err(EgWalkerError::InvariantBroken(
                "operation log and causal graph lengths diverged"));
        }

        self.ops.push(ListOp { kind, pos, content });
        Ok(true)
    }

    /// Pull every operation `other` has which this log doesn't, preserving
    /// each op's identity and parents. Merging is idempotent and
    /// order-independent: two logs which end up with the same op set are
    /// equal.
    pub fn add_missing_operations_from(&mut self, other: &Self) -> Result<()>
        where T: Clone
    {
        // Find the other log's view of what we share, then walk its novel
        // tail in causal order.
        let summary = self.cg.summarize_versions();
        let (common, _remainder) = other.cg.intersect_with_summary(&summary, &[]);
        let (only_ours, only_theirs) = other.cg.graph
            .diff(common.as_ref(), other.cg.version.as_ref());
        debug_assert!(only_ours.is_empty());

        if only_theirs.is_empty() { return Ok(()); }

        debug!(common = ?common, new_spans = only_theirs.len(), "merging foreign operations");

        for range in only_theirs {
            for (entry, src_span) in other.cg.partial_versions_in(range) {
                let added = self.cg.merge_partial_version(&entry)?;
                debug_assert!(added.len() <= src_span.len());

                // merge_partial_version skips any known prefix, so the added
                // region maps to the tail of the source span.
                for lv in (src_span.end - added.len())..src_span.end {
                    self.ops.push(other.ops[lv].clone());
                }
            }
        }

        if self.ops.len() != self.cg.len() {
            return Err(EgWalkerError::InvariantBroken(
                "operation log and causal graph lengths diverged"));
        }
        Ok(())
    }

    /// Materialize the document at the log's current version.
    pub fn checkout(&self) -> ListBranch<T> where T: Clone {
        self.checkout_at(self.cg.version.as_ref())
    }

    /// Materialize the document at an arbitrary version.
    pub fn checkout_at(&self, version: FrontierRef) -> ListBranch<T> where T: Clone {
        let mut branch = ListBranch::new();
        branch.merge(self, version);
        branch
    }

    /// Just the content at the current version.
    pub fn checkout_simple(&self) -> Vec<T> where T: Clone {
        self.checkout().content
    }
}

impl ListOpLog<char> {
    /// Append a locally-typed string as one insert run.
    pub fn add_insert_str(&mut self, agent: AgentId, pos: usize, content: &str) -> LV {
        let len = count_chars(content);
        assert!(len > 0, "insert must contain content");
        for (i, c) in content.chars().enumerate() {
            self.ops.push(ListOp::ins(pos + i, c));
        }
        self.cg.assign_local_op(agent, len).last()
    }

    /// The explicit-parents form of [`add_insert_str`](Self::add_insert_str).
    pub fn add_insert_str_at(&mut self, agent: AgentId, parents: FrontierRef, pos: usize, content: &str) -> LV {
        let len = count_chars(content);
        assert!(len > 0, "insert must contain content");
        for (i, c) in content.chars().enumerate() {
            self.ops.push(ListOp::ins(pos + i, c));
        }
        self.cg.assign_local_op_with_parents(parents, agent, len).last()
    }

    /// Materialize the document as a string, replaying through a rope.
    pub fn checkout_simple_string(&self) -> String {
        let mut content = jumprope::JumpRopeBuf::new();
        let mut version = Frontier::root();
        crate::list::branch::merge_changes_into_snapshot(
            self, &mut version, &mut content, self.cg.version.as_ref());
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::list::ListOpLog;
    use crate::list::operation::ListOpKind;
    use crate::causalgraph::remote_ids::RemoteVersion;
    use crate::error::EgWalkerError;

    #[test]
    fn smoke() {
        let mut oplog = ListOpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.add_insert_str(seph, 0, "hi there");
        let v = oplog.add_delete(seph, 2..2 + " there".len()).unwrap();

        assert_eq!(oplog.checkout_simple_string(), "hi");
        assert_eq!(oplog.local_version(), &[v]);
        oplog.dbg_check(true);
    }

    #[test]
    fn delete_of_nothing_fails() {
        let mut oplog = ListOpLog::<char>::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.add_insert_str(seph, 0, "abc");
        assert_eq!(oplog.add_delete(seph, 1..1), Err(EgWalkerError::InvalidLength));
        // Nothing was mutated.
        assert_eq!(oplog.len(), 3);
        oplog.dbg_check(true);
    }

    #[test]
    fn push_op_skips_duplicates() {
        let mut oplog = ListOpLog::new();
        assert!(oplog.push_op(
            RemoteVersion("seph", 0), &[], ListOpKind::Ins, 0, Some('a')).unwrap());
        assert!(oplog.push_op(
            RemoteVersion("seph", 1), &[RemoteVersion("seph", 0)],
            ListOpKind::Ins, 1, Some('b')).unwrap());

        // Replaying the same op is a no-op.
        assert!(!oplog.push_op(
            RemoteVersion("seph", 0), &[], ListOpKind::Ins, 0, Some('a')).unwrap());
        assert_eq!(oplog.len(), 2);

        assert_eq!(oplog.checkout_simple_string(), "ab");
        oplog.dbg_check(true);
    }

    #[test]
    fn push_op_requires_content() {
        let mut oplog = ListOpLog::<char>::new();
        let err = oplog.push_op(RemoteVersion("seph", 0), &[], ListOpKind::Ins, 0, None);
        assert_eq!(err, Err(EgWalkerError::MissingContent { agent: "seph".into(), seq: 0 }));

        // Unknown parents are rejected too.
        let err = oplog.push_op(
            RemoteVersion("seph", 0), &[RemoteVersion("mike", 3)],
            ListOpKind::Ins, 0, Some('x'));
        assert_eq!(err, Err(EgWalkerError::InvalidRemoteVersion { agent: "mike".into(), seq: 3 }));
    }

    #[test]
    fn merge_oplogs_smoke() {
        let mut a = ListOpLog::new();
        let mut b = ListOpLog::new();
        assert_eq!(a, b);

        let seph = a.get_or_create_agent_id("seph");
        a.add_insert_str(seph, 0, "hi");
        b.add_missing_operations_from(&a).unwrap();
        b.dbg_check(true);
        assert_eq!(a, b);

        // Now append concurrent edits to both and merge both ways.
        a.add_insert_str(seph, 0, "aaa");
        let mike = b.get_or_create_agent_id("mike");
        b.add_delete(mike, 0..2).unwrap();

        a.add_missing_operations_from(&b).unwrap();
        b.add_missing_operations_from(&a).unwrap();
        a.dbg_check(true);
        b.dbg_check(true);

        assert_eq!(a.checkout_simple_string(), b.checkout_simple_string());

        // Idempotent.
        let a2 = a.clone();
        a.add_missing_operations_from(&b).unwrap();
        assert_eq!(a, a2);
    }

    #[test]
    fn merge_is_commutative() {
        let mut base = ListOpLog::new();
        let seph = base.get_or_create_agent_id("seph");
        base.add_insert_str(seph, 0, "base");

        let mut x = base.clone();
        let mut y = base.clone();
        let mut z = base.clone();

        let m = y.get_or_create_agent_id("mike");
        y.add_insert_str(m, 4, "!");
        let k = z.get_or_create_agent_id("kaarina");
        z.add_delete(k, 0..1).unwrap();

        let mut x2 = x.clone();
        x.add_missing_operations_from(&y).unwrap();
        x.add_missing_operations_from(&z).unwrap();

        x2.add_missing_operations_from(&z).unwrap();
        x2.add_missing_operations_from(&y).unwrap();

        assert_eq!(x.checkout_simple_string(), x2.checkout_simple_string());
        x.dbg_check(true);
        x2.dbg_check(true);
    }
}
