use smartstring::alias::String as SmartString;
use thiserror::Error;

use crate::LV;

/// Errors surfaced at the crate boundary. All of these are fatal for the call
/// which produced them: the causal graph and operation log are only mutated
/// once a call's full contract can be met, so a caller which sees an error
/// can keep using the document it already had.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum EgWalkerError {
    /// A local version was named which is outside the causal graph.
    #[error("local version {0} is not present in the causal graph")]
    InvalidVersion(LV),

    /// An (agent, seq) pair was named which is unknown to the causal graph.
    #[error("version ({agent}, {seq}) is not present in the causal graph")]
    InvalidRemoteVersion { agent: SmartString, seq: usize },

    /// Deletes must name at least one item.
    #[error("deleted length must be non-zero")]
    InvalidLength,

    /// Inserts must carry the inserted content.
    #[error("insert operation ({agent}, {seq}) is missing content")]
    MissingContent { agent: SmartString, seq: usize },

    /// An (agent, seq) identity was claimed a second time with a different
    /// shape. The incoming data is corrupt (or the agent id was reused).
    #[error("agent {agent} reassigned seq {seq}, which is already allocated")]
    DuplicateAgentSeq { agent: SmartString, seq: usize },

    /// Internal consistency failure. The operation log or causal graph being
    /// read is corrupt; the document which produced this must be discarded.
    #[error("invariant broken: {0}")]
    InvariantBroken(&'static str),
}

pub type Result<T> = std::result::Result<T, EgWalkerError>;
