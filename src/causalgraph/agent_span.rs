use crate::AgentId;
use crate::lvrange::LVRange;
use crate::rle::{HasLength, MergableSpan, Searchable, SplitableSpan};

/// The globally stable identity of one operation: which agent issued it, and
/// where it sits in that agent's (strictly increasing) sequence.
pub type AgentVersion = (AgentId, usize);

/// A run of operations from a single agent with contiguous sequence numbers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AgentSpan {
    pub agent: AgentId,
    pub seq_range: LVRange,
}

impl AgentSpan {
    pub fn new(agent: AgentId, seq_range: LVRange) -> Self {
        Self { agent, seq_range }
    }
}

impl From<AgentVersion> for AgentSpan {
    fn from((agent, seq): AgentVersion) -> Self {
        AgentSpan {
            agent,
            seq_range: seq.into(),
        }
    }
}

impl HasLength for AgentSpan {
    fn len(&self) -> usize {
        self.seq_range.len()
    }
}

impl MergableSpan for AgentSpan {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent && self.seq_range.can_append(&other.seq_range)
    }

    fn append(&mut self, other: Self) {
        self.seq_range.append(other.seq_range);
    }

    fn prepend(&mut self, other: Self) {
        self.seq_range.prepend(other.seq_range);
    }
}

impl SplitableSpan for AgentSpan {
    fn truncate(&mut self, at: usize) -> Self {
        AgentSpan {
            agent: self.agent,
            seq_range: self.seq_range.truncate(at),
        }
    }
}

impl Searchable for AgentSpan {
    type Item = AgentVersion;

    fn get_offset(&self, (agent, seq): AgentVersion) -> Option<usize> {
        if self.agent == agent {
            self.seq_range.get_offset(seq)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> AgentVersion {
        (self.agent, self.seq_range.at_offset(offset))
    }
}
