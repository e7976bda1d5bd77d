use jumprope::JumpRopeBuf;

/// The sink a replay writes document content through. The replay engine only
/// ever needs single-item splices; anything which can do those can
/// materialize a document.
pub trait SnapshotSink<T> {
    fn insert_item(&mut self, pos: usize, item: T);
    fn remove_item(&mut self, pos: usize);
}

impl<T> SnapshotSink<T> for Vec<T> {
    fn insert_item(&mut self, pos: usize, item: T) {
        self.insert(pos, item);
    }

    fn remove_item(&mut self, pos: usize) {
        self.remove(pos);
    }
}

/// Character documents materialize through a rope, keeping splices O(log n)
/// even on very large documents. Positions are in chars.
impl SnapshotSink<char> for JumpRopeBuf {
    fn insert_item(&mut self, pos: usize, item: char) {
        let mut buf = [0u8; 4];
        self.insert(pos, item.encode_utf8(&mut buf));
    }

    fn remove_item(&mut self, pos: usize) {
        self.remove(pos..pos + 1);
    }
}

/// A sink for callers which only want the final version, not the content.
pub(crate) struct NullSink;

impl<T> SnapshotSink<T> for NullSink {
    fn insert_item(&mut self, _pos: usize, _item: T) {}
    fn remove_item(&mut self, _pos: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink() {
        let mut v = vec!['a', 'c'];
        SnapshotSink::insert_item(&mut v, 1, 'b');
        assert_eq!(v, &['a', 'b', 'c']);
        SnapshotSink::remove_item(&mut v, 0);
        assert_eq!(v, &['b', 'c']);
    }

    #[test]
    fn rope_sink() {
        let mut rope = JumpRopeBuf::new();
        rope.insert_item(0, 'a');
        rope.insert_item(1, 'c');
        rope.insert_item(1, 'b');
        rope.insert_item(3, '✓');
        assert_eq!(rope.to_string(), "abc✓");

        rope.remove_item(1);
        assert_eq!(rope.to_string(), "ac✓");
    }
}
