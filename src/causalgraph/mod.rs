//! The causal graph: a run-length-compressed record of every operation's
//! identity ((agent, seq) pair) and parents, plus the version frontier of
//! everything it contains.

pub mod agent_span;
pub mod agent_assignment;
pub mod graph;
pub mod summary;
pub mod remote_ids;

use std::cmp::Ordering;

use crate::{AgentId, Frontier, LV};
use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::causalgraph::graph::{Graph, GraphEntrySimple};
use crate::causalgraph::summary::VersionSummary;
use crate::error::{EgWalkerError, Result};
use crate::frontier::{debug_assert_frontier_sorted, FrontierRef};
use crate::lvrange::LVRange;
use crate::rle::{HasLength, RleSpanHelpers, SplitableSpan};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CausalGraph {
    /// Maps local versions to and from stable (agent, seq) identities.
    pub agent_assignment: AgentAssignment,

    /// The parents of every operation - the DAG itself.
    pub graph: Graph,

    /// The version frontier of the whole graph: every version with no
    /// children. This could be recomputed on demand, but it's tiny and
    /// needed constantly.
    pub version: Frontier,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next local version - equivalently, the number of operations known.
    pub fn len(&self) -> usize {
        let len = self.agent_assignment.len();
        debug_assert_eq!(len, self.graph.next_lv());
        len
    }

    pub fn is_empty(&self) -> bool {
        self.agent_assignment.is_empty()
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.agent_assignment.get_or_create_agent_id(name)
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.agent_assignment.get_agent_id(name)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.agent_assignment.get_agent_name(agent)
    }

    pub fn num_agents(&self) -> AgentId {
        self.agent_assignment.num_agents()
    }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize {
        self.agent_assignment.next_seq_for_agent(agent)
    }

    pub fn has_agent_version(&self, id: AgentVersion) -> bool {
        self.agent_assignment.has_agent_version(id)
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        self.agent_assignment.lv_to_agent_version(v)
    }

    pub fn lv_span_to_agent_span(&self, v: LVRange) -> AgentSpan {
        self.agent_assignment.lv_span_to_agent_span(v)
    }

    pub fn try_agent_version_to_lv(&self, id: AgentVersion) -> Option<LV> {
        self.agent_assignment.try_agent_version_to_lv(id)
    }

    pub fn agent_version_to_lv(&self, id: AgentVersion) -> Result<LV> {
        self.agent_assignment.agent_version_to_lv(id)
    }

    /// The deterministic total order on versions used to break ties between
    /// concurrent operations: agent name first, then sequence number.
    pub fn tie_break_versions(&self, a: LV, b: LV) -> Ordering {
        self.agent_assignment.tie_break_versions(a, b)
    }

    pub fn summarize_versions(&self) -> VersionSummary {
        self.agent_assignment.summarize_versions()
    }

    /// The graph entry containing `v`, with the offset of `v` inside it.
    pub fn find_entry_containing(&self, v: LV) -> Result<(GraphEntrySimple, usize)> {
        if v >= self.len() {
            return Err(EgWalkerError::InvalidVersion(v));
        }
        let (e, offset) = self.graph.0.find_packed_with_offset(v);
        Ok((e.into(), offset))
    }

    /// Allocate `num` new operations for a local agent. Parents are the
    /// current graph version; the version advances over the new span.
    pub fn assign_local_op(&mut self, agent: AgentId, num: usize) -> LVRange {
        debug_assert!(num > 0);
        let start = self.len();
        let span = LVRange::new_from_len(start, num);

        self.agent_assignment.assign_next_seq(agent, span);

        let parents = std::mem::take(&mut self.version);
        self.graph.push(parents.as_ref(), span);
        self.version = Frontier::new_1(span.last());

        span
    }

    /// Like [`assign_local_op`](Self::assign_local_op), with explicit
    /// parents. Used when a local agent edits from an older version.
    pub fn assign_local_op_with_parents(&mut self, parents: FrontierRef, agent: AgentId, num: usize) -> LVRange {
        debug_assert!(num > 0);
        let start = self.len();
        let span = LVRange::new_from_len(start, num);

        self.agent_assignment.assign_next_seq(agent, span);
        self.graph.push(parents, span);
        self.version.advance_by_known_run(parents, span);

        span
    }

    /// Add a (possibly foreign) run of operations to the graph. Any prefix of
    /// the run which is already known is skipped; the remainder is appended
    /// with its causal parents preserved.
    ///
    /// Returns the local LV range added - empty when the whole run was
    /// already known.
    pub fn merge_and_assign(&mut self, parents: FrontierRef, mut span: AgentSpan) -> Result<LVRange> {
        debug_assert_frontier_sorted(parents);
        debug_assert!(!span.seq_range.is_empty());

        let start = self.len();
        let mut parents = Frontier::from_sorted(parents);

        // Trim the prefix of the span we already know. The causal parent of
        // the first novel operation becomes the last skipped operation.
        loop {
            let client = &self.agent_assignment.client_data[span.agent as usize];
            let (found, offset) = client.lv_for_seq.find_sparse(span.seq_range.start);

            match found {
                Ok(entry) => {
                    let known_here = entry.len() - offset;
                    if known_here >= span.seq_range.len() {
                        // The entire span is already known.
                        return Ok((start..start).into());
                    }

                    let last_known_lv = entry.1.start + offset + known_here - 1;
                    span.seq_range.truncate_keeping_right(known_here);
                    parents = Frontier::new_1(last_known_lv);
                }
                Err(gap) => {
                    if span.seq_range.end > gap.end {
                        // The tail of the span collides with sequence numbers
                        // this agent has already allocated elsewhere.
                        return Err(EgWalkerError::DuplicateAgentSeq {
                            agent: self.agent_assignment.get_agent_name(span.agent).into(),
                            seq: gap.end,
                        });
                    }
                    break;
                }
            }
        }

        let lv_span = LVRange::new_from_len(start, span.seq_range.len());

        self.agent_assignment.assign_span(span.agent, span.seq_range, lv_span);
        self.graph.push(parents.as_ref(), lv_span);
        self.version.advance_by_known_run(parents.as_ref(), lv_span);

        Ok(lv_span)
    }

    /// Panic if the graph is internally inconsistent. Testing tool. The deep
    /// form recomputes the version frontier from scratch.
    pub fn dbg_check(&self, deep: bool) {
        assert_eq!(self.agent_assignment.len(), self.graph.next_lv());

        self.graph.dbg_check();

        // The assignment mappings must agree with each other.
        let mut expect_lv = 0;
        for e in self.agent_assignment.client_with_lv.iter() {
            assert_eq!(e.0, expect_lv, "assignment entries must be packed");
            expect_lv = e.end();

            let client = &self.agent_assignment.client_data[e.1.agent as usize];
            let (entry, offset) = client.lv_for_seq
                .find_with_offset(e.1.seq_range.start)
                .expect("assigned seq missing from client map");
            assert_eq!(entry.1.start + offset, e.0, "seq map disagrees with LV map");
        }

        for (agent, client) in self.agent_assignment.client_data.iter().enumerate() {
            let mut last_seq_end = None;
            for e in client.lv_for_seq.iter() {
                // Runs are ordered by seq and never overlap.
                if let Some(end) = last_seq_end {
                    assert!(e.0 >= end, "client runs overlap");
                }
                last_seq_end = Some(e.end());

                // And they map back through the LV table.
                let span = self.lv_span_to_agent_span(e.1);
                assert_eq!(span.agent as usize, agent);
                assert_eq!(span.seq_range, e.span());
                assert_eq!(span.len(), e.len());
            }
        }

        self.version.debug_check_sorted();
        for &v in self.version.iter() {
            assert!(v < self.len());
        }

        if deep {
            // No member of the frontier is an ancestor of another.
            let v = &self.version.0;
            for i in 0..v.len() {
                let mut rest = v.clone();
                let removed = rest.remove(i);
                assert!(!self.graph.version_contains(&rest, removed),
                    "frontier member {} is redundant", removed);
            }

            // The frontier is exactly the set of childless versions.
            let mut heads: Vec<LV> = self.graph.iter().map(|e| e.span.last()).collect();
            for e in self.graph.iter() {
                for &p in e.parents.iter() {
                    heads.retain(|&h| h != p);
                }
            }
            heads.sort_unstable();
            assert_eq!(heads, self.version.to_vec(), "stored frontier is stale");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ops_advance_version() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");

        let span = cg.assign_local_op(a, 3);
        assert_eq!(span, (0..3).into());
        assert_eq!(cg.version.as_ref(), &[2]);

        let span = cg.assign_local_op(a, 2);
        assert_eq!(span, (3..5).into());
        assert_eq!(cg.version.as_ref(), &[4]);
        assert_eq!(cg.next_seq_for_agent(a), 5);

        cg.dbg_check(true);
    }

    #[test]
    fn merge_and_assign_skips_known_prefix() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");

        let added = cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..5).into() }).unwrap();
        assert_eq!(added, (0..5).into());

        // Entirely known: no-op.
        let added = cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..5).into() }).unwrap();
        assert!(added.is_empty());
        assert_eq!(cg.len(), 5);

        // Partially known: the overlap is skipped and the novel tail hangs
        // off the end of the known prefix.
        let added = cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (3..8).into() }).unwrap();
        assert_eq!(added, (5..8).into());
        assert_eq!(cg.graph.parents_at(5).as_ref(), &[4]);
        assert_eq!(cg.version.as_ref(), &[7]);

        cg.dbg_check(true);
    }

    #[test]
    fn merge_and_assign_rejects_seq_collisions() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");

        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (10..15).into() }).unwrap();

        // A run which starts in the gap but collides with the existing
        // allocation is corrupt.
        let err = cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (8..12).into() });
        assert_eq!(err, Err(EgWalkerError::DuplicateAgentSeq { agent: "a".into(), seq: 10 }));

        // But filling the gap exactly is fine (concurrent branches may ship
        // an agent's runs out of order).
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..10).into() }).unwrap();
        cg.dbg_check(true);
    }

    #[test]
    fn find_entry_containing_validates() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.assign_local_op(a, 3);

        let (e, offset) = cg.find_entry_containing(1).unwrap();
        assert_eq!(e.span, (0..3).into());
        assert_eq!(offset, 1);

        assert_eq!(cg.find_entry_containing(3), Err(EgWalkerError::InvalidVersion(3)));
    }

    #[test]
    fn tie_break_orders_by_name_then_seq() {
        let mut cg = CausalGraph::new();
        let b = cg.get_or_create_agent_id("bob");
        let a = cg.get_or_create_agent_id("alice");

        cg.assign_local_op_with_parents(&[], b, 1);
        cg.assign_local_op_with_parents(&[], a, 2);

        // alice's ops (LVs 1, 2) order before bob's (LV 0).
        assert_eq!(cg.tie_break_versions(1, 0), Ordering::Less);
        assert_eq!(cg.tie_break_versions(0, 2), Ordering::Greater);
        assert_eq!(cg.tie_break_versions(1, 2), Ordering::Less);
        assert_eq!(cg.tie_break_versions(1, 1), Ordering::Equal);
    }
}
