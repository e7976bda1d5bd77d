use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListOpKind { Ins, Del }

impl Default for ListOpKind {
    fn default() -> Self { ListOpKind::Ins } // Arbitrary.
}

impl Display for ListOpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ListOpKind::Ins => f.write_str("Ins"),
            ListOpKind::Del => f.write_str("Del"),
        }
    }
}

/// A single insert or delete. The operation log stores exactly one of these
/// per local version.
///
/// `pos` is the 0-indexed position the operation applied at *in its author's
/// view of the document* when it was created. Replaying the log is what turns
/// these ephemeral positions back into a consistent document.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ListOp<T> {
    pub kind: ListOpKind,
    pub pos: usize,

    /// What was inserted. Always present for inserts, never for deletes.
    pub content: Option<T>,
}

impl<T> ListOp<T> {
    pub fn ins(pos: usize, content: T) -> Self {
        ListOp { kind: ListOpKind::Ins, pos, content: Some(content) }
    }

    pub fn del(pos: usize) -> Self {
        ListOp { kind: ListOpKind::Del, pos, content: None }
    }
}
