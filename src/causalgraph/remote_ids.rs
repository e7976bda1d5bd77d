//! Conversion between local versions and the identities you can pass to a
//! remote peer, plus the in-memory wire form of a causal graph diff.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::{CausalGraph, Frontier, LV};
use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::agent_span::AgentSpan;
use crate::error::{EgWalkerError, Result};
use crate::lvrange::LVRange;
use crate::rle::{HasLength, SplitableSpan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An (agent, seq) pair in a form you can hand to another peer.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersionOwned(pub SmartString, pub usize);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RemoteVersion<'a>(pub &'a str, pub usize);

impl<'a> From<&'a RemoteVersionOwned> for RemoteVersion<'a> {
    fn from(rv: &'a RemoteVersionOwned) -> Self {
        RemoteVersion(rv.0.as_str(), rv.1)
    }
}

impl<'a> From<RemoteVersion<'a>> for RemoteVersionOwned {
    fn from(rv: RemoteVersion) -> Self {
        RemoteVersionOwned(rv.0.into(), rv.1)
    }
}

impl<'a> RemoteVersion<'a> {
    pub fn to_owned(self) -> RemoteVersionOwned {
        self.into()
    }
}

pub type RemoteFrontier<'a> = SmallVec<RemoteVersion<'a>, 2>;
pub type RemoteFrontierOwned = SmallVec<RemoteVersionOwned, 2>;

/// One record of a serialized causal graph diff: a run of operations from one
/// agent, and the parents of the run's first operation. This is the transport
/// format between peers' graphs. No byte encoding is prescribed - the
/// optional `serde` feature maps it to whatever format the embedder picks.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialVersionEntry {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<RemoteVersionOwned, 2>,
}

impl AgentAssignment {
    pub fn try_remote_to_local_version(&self, rv: RemoteVersion) -> Option<LV> {
        let agent = self.get_agent_id(rv.0)?;
        self.client_data[agent as usize].try_seq_to_lv(rv.1)
    }

    pub fn remote_to_local_version(&self, rv: RemoteVersion) -> Result<LV> {
        self.try_remote_to_local_version(rv).ok_or_else(|| {
            EgWalkerError::InvalidRemoteVersion { agent: rv.0.into(), seq: rv.1 }
        })
    }

    pub fn local_to_remote_version(&self, v: LV) -> RemoteVersion<'_> {
        let (agent, seq) = self.lv_to_agent_version(v);
        RemoteVersion(self.get_agent_name(agent), seq)
    }

    pub fn local_to_remote_version_owned(&self, v: LV) -> RemoteVersionOwned {
        self.local_to_remote_version(v).to_owned()
    }

    pub fn remote_to_local_frontier<'a, B: 'a, I>(&self, ids_iter: I) -> Result<Frontier>
        where RemoteVersion<'a>: From<B>, I: Iterator<Item = B> + 'a
    {
        ids_iter
            .map(|rv| self.remote_to_local_version(rv.into()))
            .collect()
    }

    pub fn local_to_remote_frontier(&'_ self, local_frontier: &[LV]) -> RemoteFrontier<'_> {
        local_frontier
            .iter()
            .map(|&lv| self.local_to_remote_version(lv))
            .collect()
    }

    pub fn local_to_remote_frontier_owned(&self, local_frontier: &[LV]) -> RemoteFrontierOwned {
        local_frontier
            .iter()
            .map(|&lv| self.local_to_remote_version_owned(lv))
            .collect()
    }
}

impl CausalGraph {
    /// Express the operations in `range` as wire diff entries, paired with
    /// the local LV span each entry covers. Entries split wherever the agent
    /// or the parents structure changes.
    pub(crate) fn partial_versions_in(&self, range: LVRange) -> Vec<(PartialVersionEntry, LVRange)> {
        let mut result = vec![];

        for e in self.graph.iter_range(range) {
            let mut span = e.span;
            let mut first = true;

            while !span.is_empty() {
                let agent_span = self.agent_assignment.lv_span_to_agent_span(span);
                let len = agent_span.len();
                debug_assert!(len > 0);

                let parents: SmallVec<RemoteVersionOwned, 2> = if first {
                    e.parents.iter()
                        .map(|&p| self.agent_assignment.local_to_remote_version_owned(p))
                        .collect()
                } else {
                    let mut p = SmallVec::new();
                    p.push(self.agent_assignment.local_to_remote_version_owned(span.start - 1));
                    p
                };

                result.push((
                    PartialVersionEntry {
                        agent: self.agent_assignment.get_agent_name(agent_span.agent).into(),
                        seq: agent_span.seq_range.start,
                        len,
                        parents,
                    },
                    LVRange::new_from_len(span.start, len),
                ));

                if len == span.len() { break; }
                span.truncate_keeping_right(len);
                first = false;
            }
        }

        result
    }

    /// Serialize the named version ranges (as returned by
    /// [`Graph::diff`](crate::causalgraph::graph::Graph::diff)) into wire
    /// diff entries.
    pub fn serialize_diff(&self, ranges: &[LVRange]) -> Vec<PartialVersionEntry> {
        ranges.iter()
            .flat_map(|r| self.partial_versions_in(*r))
            .map(|(e, _)| e)
            .collect()
    }

    /// Ingest a single wire diff entry. Returns the local LV range actually
    /// added - empty when everything in the entry was already known.
    pub(crate) fn merge_partial_version(&mut self, e: &PartialVersionEntry) -> Result<LVRange> {
        let parents = self.agent_assignment
            .remote_to_local_frontier(e.parents.iter())?;
        let agent = self.get_or_create_agent_id(&e.agent);
        self.merge_and_assign(parents.as_ref(), AgentSpan {
            agent,
            seq_range: (e.seq..e.seq + e.len).into(),
        })
    }

    /// Ingest a serialized diff. Entries must arrive in causal order (as
    /// produced by [`serialize_diff`](Self::serialize_diff)). Returns the
    /// local LV range that was added; already-known entries are skipped.
    pub fn merge_partial_versions(&mut self, entries: &[PartialVersionEntry]) -> Result<LVRange> {
        let start = self.len();

        for e in entries {
            self.merge_partial_version(e)?;
        }

        Ok((start..self.len()).into())
    }
}

#[cfg(test)]
mod tests {
    use crate::CausalGraph;
    use crate::causalgraph::agent_span::AgentSpan;
    use super::*;

    #[test]
    fn remote_version_round_trip() {
        let mut cg = CausalGraph::new();
        cg.get_or_create_agent_id("seph");
        cg.get_or_create_agent_id("mike");
        cg.merge_and_assign(&[], AgentSpan { agent: 0, seq_range: (0..2).into() }).unwrap();
        cg.merge_and_assign(&[], AgentSpan { agent: 1, seq_range: (0..4).into() }).unwrap();

        assert_eq!(cg.agent_assignment.remote_to_local_version(RemoteVersion("seph", 0)).unwrap(), 0);
        assert_eq!(cg.agent_assignment.remote_to_local_version(RemoteVersion("seph", 1)).unwrap(), 1);
        assert_eq!(cg.agent_assignment.remote_to_local_version(RemoteVersion("mike", 0)).unwrap(), 2);

        for lv in 0..cg.len() {
            let rv = cg.agent_assignment.local_to_remote_version(lv);
            assert_eq!(cg.agent_assignment.remote_to_local_version(rv).unwrap(), lv);
        }

        assert_eq!(
            cg.agent_assignment.remote_to_local_version(RemoteVersion("seph", 5)),
            Err(EgWalkerError::InvalidRemoteVersion { agent: "seph".into(), seq: 5 })
        );
    }

    #[test]
    fn remote_frontier_can_be_empty() {
        let cg = CausalGraph::new();
        assert!(cg.agent_assignment
            .remote_to_local_frontier(std::iter::empty::<RemoteVersion>())
            .unwrap()
            .is_root());
    }

    #[test]
    fn diff_round_trips_between_graphs() {
        let mut a = CausalGraph::new();
        a.get_or_create_agent_id("seph");
        a.get_or_create_agent_id("mike");
        a.merge_and_assign(&[], AgentSpan { agent: 0, seq_range: (0..3).into() }).unwrap();
        a.merge_and_assign(&[], AgentSpan { agent: 1, seq_range: (0..2).into() }).unwrap();
        a.merge_and_assign(&[2, 4], AgentSpan { agent: 0, seq_range: (3..6).into() }).unwrap();

        // Serialize everything in a, apply to an empty graph.
        let (_, everything) = a.graph.diff(&[], a.version.as_ref());
        let entries = a.serialize_diff(&everything);

        let mut b = CausalGraph::new();
        let added = b.merge_partial_versions(&entries).unwrap();
        assert_eq!(added, (0..a.len()).into());
        assert_eq!(a, b);

        // A second application is a no-op.
        let added = b.merge_partial_versions(&entries).unwrap();
        assert!(added.is_empty());
        assert_eq!(a, b);
    }
}
