//! The list types: an operation log of insert/delete edits, branches
//! (snapshot + version pairs) checked out from it, and document wrappers
//! which keep a snapshot live across local edits and remote merges.

use jumprope::JumpRopeBuf;

use crate::causalgraph::CausalGraph;
use crate::Frontier;
use crate::list::operation::ListOp;

pub mod operation;
pub mod snapshot;
mod oplog;
mod branch;
mod doc;
mod check;

#[cfg(test)]
mod fuzzer_tools;
#[cfg(test)]
mod oplog_merge_fuzzer;

/// An append-only log of every operation a document has ever seen, in local
/// version order, paired with the causal graph naming each op's identity and
/// parents.
///
/// This is the whole CRDT: a peer holding an op log can materialize the
/// document at any version, merge any other peer's log, and nothing else
/// needs to be kept in memory between edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOpLog<T> {
    /// One op per local version; `ops[v]` is the operation with LV `v`.
    pub(crate) ops: Vec<ListOp<T>>,

    pub cg: CausalGraph,
}

/// A checkout: the document content at some version. Branches obey a strict
/// rule - whenever the content changes, the version changes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBranch<T> {
    pub(crate) content: Vec<T>,

    /// The version of the content. Updated by
    /// [`merge`](ListBranch::merge).
    pub(crate) version: Frontier,
}

/// An op log and a live branch kept in lock step. This is the simplest way
/// to interact with a document: edit it locally, merge remote logs into it,
/// read the content back.
#[derive(Debug, Clone)]
pub struct ListCRDT<T> {
    pub oplog: ListOpLog<T>,
    pub branch: ListBranch<T>,
}

/// A text document: the char-specialized wrapper holding its content in a
/// rope so local splices and replays stay cheap on large documents.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pub oplog: ListOpLog<char>,
    content: JumpRopeBuf,
    version: Frontier,
}
