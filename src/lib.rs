//! An event-graph walker (eg-walker) sequence CRDT.
//!
//! Documents are stored as an append-only log of original insert / delete
//! operations plus a causal graph recording each operation's identity and
//! parents. Nothing else persists between edits: when concurrent history
//! shows up, a transient walker replays the conflicting region of the graph
//! (and only that region) to work out where everything lands, then throws
//! its scaffolding away.
//!
//! This keeps documents cheap to open, keeps steady-state memory at "the
//! text plus the log", and still merges arbitrary concurrent edits with
//! full CRDT convergence.
//!
//! The easiest entry points are [`TextDocument`] for text and [`ListCRDT`]
//! for other item types; [`ListOpLog`] / [`ListBranch`] underneath give
//! finer control (multiple branches over one log, checkouts at old
//! versions), and [`CausalGraph`] exposes the version / ancestry queries
//! peers need to sync.

pub mod causalgraph;
pub mod list;

mod error;
mod frontier;
mod lvrange;
mod rle;
mod walker;

pub use causalgraph::CausalGraph;
pub use error::{EgWalkerError, Result};
pub use frontier::{Frontier, FrontierRef};
pub use lvrange::LVRange;
pub use list::{ListBranch, ListCRDT, ListOpLog, TextDocument};

/// A local version: the dense integer identity of one operation within one
/// peer's causal graph, assigned in the order operations were appended
/// locally. Local versions are *not* stable across peers - use
/// [`RemoteVersion`](causalgraph::remote_ids::RemoteVersion) when talking to
/// anyone else.
pub type LV = usize;

/// An interned agent id, local to one causal graph. The external identity is
/// the agent's name.
pub type AgentId = u32;
