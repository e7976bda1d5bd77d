use std::ops::Range;

use jumprope::JumpRopeBuf;
use str_indices::chars::count as count_chars;

use crate::{AgentId, Frontier, LV};
use crate::error::Result;
use crate::frontier::FrontierRef;
use crate::list::branch::merge_changes_into_snapshot;
use crate::list::{ListBranch, ListCRDT, ListOpLog, TextDocument};

impl<T: Clone> ListCRDT<T> {
    /// A new, empty document.
    pub fn new() -> Self {
        Self {
            oplog: ListOpLog::new(),
            branch: ListBranch::new(),
        }
    }

    /// Open a document from an existing log, materializing its content with
    /// a full replay.
    pub fn open(oplog: ListOpLog<T>) -> Self {
        let branch = oplog.checkout();
        Self { oplog, branch }
    }

    /// Rebuild a document from a log plus a snapshot the caller kept around.
    /// O(copy) - no replay happens. The snapshot must genuinely be the
    /// content at `version`.
    pub fn restore(oplog: ListOpLog<T>, content: Vec<T>, version: Frontier) -> Self {
        Self {
            oplog,
            branch: ListBranch { content, version },
        }
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.oplog.get_or_create_agent_id(name)
    }

    pub fn content(&self) -> &[T] {
        self.branch.content()
    }

    pub fn len(&self) -> usize {
        self.branch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
    }

    pub fn local_version(&self) -> FrontierRef<'_> {
        self.branch.local_version()
    }

    /// Insert locally. The log and the snapshot update together, so no
    /// replay is ever needed for local edits.
    pub fn insert(&mut self, agent: AgentId, pos: usize, content: &[T]) -> LV {
        assert!(pos <= self.branch.len(), "insert past end of document");

        let v = self.oplog.add_insert(agent, pos, content);
        for (i, c) in content.iter().enumerate() {
            self.branch.content.insert(pos + i, c.clone());
        }
        self.branch.version.replace_with_1(v);
        v
    }

    /// Delete locally.
    pub fn delete(&mut self, agent: AgentId, del_range: Range<usize>) -> Result<LV> {
        assert!(del_range.end <= self.branch.len(), "delete past end of document");

        let v = self.oplog.add_delete(agent, del_range.clone())?;
        self.branch.content.drain(del_range);
        self.branch.version.replace_with_1(v);
        Ok(v)
    }

    /// Merge everything a remote peer's log has that we don't. The snapshot
    /// catches up positionally when the new ops linearly extend our version,
    /// and through a replay of the conflicting region otherwise.
    pub fn merge_remote(&mut self, remote: &ListOpLog<T>) -> Result<()> {
        self.oplog.add_missing_operations_from(remote)?;
        self.branch.merge(&self.oplog, self.oplog.cg.version.as_ref());
        Ok(())
    }
}

impl<T: Clone> Default for ListCRDT<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDocument {
    pub fn new() -> Self {
        Self {
            oplog: ListOpLog::new(),
            content: JumpRopeBuf::new(),
            version: Frontier::root(),
        }
    }

    /// Open a text document from an existing log with a full replay.
    pub fn open(oplog: ListOpLog<char>) -> Self {
        let mut content = JumpRopeBuf::new();
        let mut version = Frontier::root();
        merge_changes_into_snapshot(&oplog, &mut version, &mut content, oplog.cg.version.as_ref());
        Self { oplog, content, version }
    }

    /// Rebuild a document from a cached string without replaying. The text
    /// must genuinely be the content at `version`.
    pub fn restore(oplog: ListOpLog<char>, text: &str, version: Frontier) -> Self {
        let mut content = JumpRopeBuf::new();
        content.insert(0, text);
        Self { oplog, content, version }
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.oplog.get_or_create_agent_id(name)
    }

    pub fn text(&self) -> String {
        self.content.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.content.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn local_version(&self) -> FrontierRef<'_> {
        self.version.as_ref()
    }

    /// Type locally. Positions are in chars.
    pub fn insert(&mut self, agent: AgentId, pos: usize, text: &str) -> LV {
        assert!(pos <= self.content.len_chars(), "insert past end of document");
        debug_assert!(count_chars(text) > 0);

        let v = self.oplog.add_insert_str(agent, pos, text);
        self.content.insert(pos, text);
        self.version.replace_with_1(v);
        v
    }

    /// Delete a char range locally.
    pub fn delete(&mut self, agent: AgentId, del_range: Range<usize>) -> Result<LV> {
        assert!(del_range.end <= self.content.len_chars(), "delete past end of document");

        let v = self.oplog.add_delete(agent, del_range.clone())?;
        self.content.remove(del_range);
        self.version.replace_with_1(v);
        Ok(v)
    }

    /// Merge a remote peer's log, then catch the rope up.
    pub fn merge_remote(&mut self, remote: &ListOpLog<char>) -> Result<()> {
        self.oplog.add_missing_operations_from(remote)?;

        let heads = self.oplog.cg.version.clone();
        merge_changes_into_snapshot(&self.oplog, &mut self.version, &mut self.content, heads.as_ref());
        Ok(())
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new()
    }
}
