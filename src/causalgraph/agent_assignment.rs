use std::cmp::Ordering;

use smartstring::alias::String as SmartString;

use crate::{AgentId, LV};
use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::error::{EgWalkerError, Result};
use crate::lvrange::LVRange;
use crate::rle::{HasLength, KVPair, RleVec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ClientData {
    /// The client's name / unique id.
    pub(crate) name: SmartString,

    /// An in-order RLE list of all operations from this client, mapping runs
    /// of sequence numbers to the runs of local versions they were assigned.
    ///
    /// A single agent may edit multiple branches concurrently, in which case
    /// foreign runs can arrive in any order relative to their sequence
    /// numbers. The list supports interior insertion for that, but runs never
    /// overlap.
    pub(crate) lv_for_seq: RleVec<KVPair<LVRange>>,
}

/// The two-way mapping between local versions and globally stable
/// (agent, seq) identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentAssignment {
    /// Maps local version ranges to (agent, seq range). Packed - entries
    /// cover every assigned LV.
    pub(crate) client_with_lv: RleVec<KVPair<AgentSpan>>,

    /// Per-client data, indexed by AgentId. Maps the other way.
    pub(crate) client_data: Vec<ClientData>,
}

impl ClientData {
    pub fn get_next_seq(&self) -> usize {
        self.lv_for_seq.end()
    }

    pub fn is_empty(&self) -> bool {
        self.lv_for_seq.is_empty()
    }

    #[inline]
    pub(crate) fn try_seq_to_lv(&self, seq: usize) -> Option<LV> {
        let (entry, offset) = self.lv_for_seq.find_with_offset(seq)?;
        Some(entry.1.start + offset)
    }

    /// Note the returned span may be shorter than the requested range.
    pub(crate) fn try_seq_to_lv_span(&self, seq_range: LVRange) -> Option<LVRange> {
        let (KVPair(_, entry), offset) = self.lv_for_seq.find_with_offset(seq_range.start)?;

        let start = entry.start + offset;
        let end = usize::min(entry.end, start + seq_range.len());
        Some(LVRange { start, end })
    }
}

impl AgentAssignment {
    pub fn new() -> Self { Self::default() }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data.iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as AgentId)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if let Some(id) = self.get_agent_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                lv_for_seq: RleVec::new(),
            });
            (self.client_data.len() - 1) as AgentId
        }
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.client_data[agent as usize].name.as_str()
    }

    pub fn num_agents(&self) -> AgentId {
        self.client_data.len() as AgentId
    }

    pub fn len(&self) -> usize {
        self.client_with_lv.end()
    }

    pub fn is_empty(&self) -> bool {
        self.client_with_lv.is_empty()
    }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize {
        self.client_data[agent as usize].get_next_seq()
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        debug_assert_ne!(v, usize::MAX);
        self.client_with_lv.get(v)
    }

    /// Note the returned span length is min(requested, run length at v).
    pub fn lv_span_to_agent_span(&self, v: LVRange) -> AgentSpan {
        debug_assert_ne!(v.start, usize::MAX);

        let (loc, offset) = self.client_with_lv.find_packed_with_offset(v.start);
        let start = loc.1.seq_range.start + offset;
        let end = usize::min(loc.1.seq_range.end, start + v.len());
        AgentSpan {
            agent: loc.1.agent,
            seq_range: LVRange { start, end },
        }
    }

    pub fn try_agent_version_to_lv(&self, (agent, seq): AgentVersion) -> Option<LV> {
        debug_assert_ne!(agent, AgentId::MAX);

        self.client_data.get(agent as usize).and_then(|c| {
            c.try_seq_to_lv(seq)
        })
    }

    pub fn agent_version_to_lv(&self, id: AgentVersion) -> Result<LV> {
        self.try_agent_version_to_lv(id).ok_or_else(|| {
            EgWalkerError::InvalidRemoteVersion {
                agent: self.get_agent_name(id.0).into(),
                seq: id.1,
            }
        })
    }

    /// Does the graph already contain the named identity?
    pub fn has_agent_version(&self, (agent, seq): AgentVersion) -> bool {
        self.client_data.get(agent as usize)
            .map_or(false, |c| c.lv_for_seq.contains_needle(seq))
    }

    /// Assign the next run of sequence numbers for this agent to `span`.
    pub(crate) fn assign_next_seq(&mut self, agent: AgentId, span: LVRange) {
        debug_assert_eq!(span.start, self.len());

        let client_data = &mut self.client_data[agent as usize];

        let next_seq = client_data.get_next_seq();
        client_data.lv_for_seq.push(KVPair(next_seq, span));

        self.client_with_lv.push(KVPair(span.start, AgentSpan {
            agent,
            seq_range: LVRange { start: next_seq, end: next_seq + span.len() },
        }));
    }

    /// Assign a specific (possibly out-of-order) run of sequence numbers for
    /// this agent to `lv_span`. The seq range must not overlap anything
    /// already assigned.
    pub(crate) fn assign_span(&mut self, agent: AgentId, seq_range: LVRange, lv_span: LVRange) {
        debug_assert_eq!(seq_range.len(), lv_span.len());
        debug_assert_eq!(lv_span.start, self.len());

        let client_data = &mut self.client_data[agent as usize];
        client_data.lv_for_seq.insert(KVPair(seq_range.start, lv_span));

        self.client_with_lv.push(KVPair(lv_span.start, AgentSpan { agent, seq_range }));
    }

    /// The deterministic total order used to break ties between concurrent
    /// operations: order agents by name, then by sequence number.
    pub(crate) fn tie_break_agent_versions(&self, v1: AgentVersion, v2: AgentVersion) -> Ordering {
        if v1 == v2 { Ordering::Equal }
        else {
            let c1 = &self.client_data[v1.0 as usize];
            let c2 = &self.client_data[v2.0 as usize];

            c1.name.cmp(&c2.name)
                .then(v1.1.cmp(&v2.1))
        }
    }

    pub(crate) fn tie_break_versions(&self, v1: LV, v2: LV) -> Ordering {
        if v1 == v2 { Ordering::Equal }
        else {
            self.tie_break_agent_versions(
                self.lv_to_agent_version(v1),
                self.lv_to_agent_version(v2),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_ids_are_interned() {
        let mut aa = AgentAssignment::new();
        let seph = aa.get_or_create_agent_id("seph");
        let mike = aa.get_or_create_agent_id("mike");
        assert_ne!(seph, mike);
        assert_eq!(seph, aa.get_or_create_agent_id("seph"));
        assert_eq!(aa.get_agent_name(mike), "mike");
        assert_eq!(aa.get_agent_id("unknown"), None);
    }

    #[test]
    fn assignment_round_trips() {
        let mut aa = AgentAssignment::new();
        let a = aa.get_or_create_agent_id("a");
        let b = aa.get_or_create_agent_id("b");

        aa.assign_next_seq(a, (0..3).into());
        aa.assign_next_seq(b, (3..5).into());
        aa.assign_next_seq(a, (5..8).into());

        assert_eq!(aa.len(), 8);
        assert_eq!(aa.lv_to_agent_version(0), (a, 0));
        assert_eq!(aa.lv_to_agent_version(4), (b, 1));
        assert_eq!(aa.lv_to_agent_version(7), (a, 5));

        for lv in 0..aa.len() {
            let id = aa.lv_to_agent_version(lv);
            assert_eq!(aa.try_agent_version_to_lv(id), Some(lv));
        }

        assert_eq!(aa.next_seq_for_agent(a), 6);
        assert!(aa.has_agent_version((b, 1)));
        assert!(!aa.has_agent_version((b, 2)));
    }

    #[test]
    fn out_of_order_spans() {
        let mut aa = AgentAssignment::new();
        let a = aa.get_or_create_agent_id("a");

        // An agent which edited another branch first can arrive with its later
        // seqs before its earlier ones.
        aa.assign_span(a, (10..12).into(), (0..2).into());
        aa.assign_span(a, (0..5).into(), (2..7).into());

        assert_eq!(aa.try_agent_version_to_lv((a, 11)), Some(1));
        assert_eq!(aa.try_agent_version_to_lv((a, 3)), Some(5));
        assert_eq!(aa.try_agent_version_to_lv((a, 7)), None);
        assert_eq!(aa.next_seq_for_agent(a), 12);
    }
}
