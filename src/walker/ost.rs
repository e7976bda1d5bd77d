//! The order-statistic tree backing a replay. Items are stored in document
//! order in an arena-allocated AVL tree with parent links. Each node
//! maintains three subtree aggregates:
//!
//! - `size`: number of items,
//! - `cur_ins`: items currently visible at the walk's moving version,
//! - `end_ins`: items visible in the final document.
//!
//! Those aggregates make position queries in either coordinate space
//! O(log n). Nodes are never removed - deletion during a replay only flips
//! item state - so rebalancing is insert-only.

use crate::walker::item::Item;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeIdx(pub(crate) usize);

impl Default for NodeIdx {
    fn default() -> Self { Self::NONE }
}

impl NodeIdx {
    pub(crate) const NONE: NodeIdx = NodeIdx(usize::MAX);

    pub(crate) fn exists(self) -> bool {
        self.0 != usize::MAX
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    item: Item,
    parent: NodeIdx,
    left: NodeIdx,
    right: NodeIdx,
    height: u8,
    size: usize,
    cur_ins: usize,
    end_ins: usize,
}

/// A position in the tree, in both coordinate spaces: `idx` is the item
/// index, `end_pos` the number of end-visible items before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct DocCursor {
    pub idx: usize,
    pub end_pos: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ItemTree {
    nodes: Vec<TreeNode>,
    root: NodeIdx,
}

impl ItemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(cap),
            root: NodeIdx::NONE,
        }
    }

    pub fn len(&self) -> usize {
        self.size_of(self.root)
    }

    pub fn total_cur_ins(&self) -> usize {
        self.cur_ins_of(self.root)
    }

    pub fn item(&self, n: NodeIdx) -> &Item {
        &self.nodes[n.0].item
    }

    pub fn item_mut(&mut self, n: NodeIdx) -> &mut Item {
        // The caller must refresh_counts() afterwards if the mutation
        // changes either state.
        &mut self.nodes[n.0].item
    }

    fn size_of(&self, n: NodeIdx) -> usize {
        if n.exists() { self.nodes[n.0].size } else { 0 }
    }

    fn cur_ins_of(&self, n: NodeIdx) -> usize {
        if n.exists() { self.nodes[n.0].cur_ins } else { 0 }
    }

    fn end_ins_of(&self, n: NodeIdx) -> usize {
        if n.exists() { self.nodes[n.0].end_ins } else { 0 }
    }

    fn height_of(&self, n: NodeIdx) -> u8 {
        if n.exists() { self.nodes[n.0].height } else { 0 }
    }

    fn balance_of(&self, n: NodeIdx) -> i32 {
        let node = &self.nodes[n.0];
        self.height_of(node.right) as i32 - self.height_of(node.left) as i32
    }

    fn recompute(&mut self, n: NodeIdx) {
        let node = &self.nodes[n.0];
        let (l, r) = (node.left, node.right);
        let item = node.item;

        let size = 1 + self.size_of(l) + self.size_of(r);
        let cur_ins = item.cur_state.is_inserted() as usize
            + self.cur_ins_of(l) + self.cur_ins_of(r);
        let end_ins = item.end_state.is_inserted() as usize
            + self.end_ins_of(l) + self.end_ins_of(r);
        let height = 1 + self.height_of(l).max(self.height_of(r));

        let node = &mut self.nodes[n.0];
        node.size = size;
        node.cur_ins = cur_ins;
        node.end_ins = end_ins;
        node.height = height;
    }

    /// Insert an item so that it lands at index `idx` in document order.
    /// Returns the (stable) handle of the new node.
    pub fn insert_at(&mut self, mut idx: usize, item: Item) -> NodeIdx {
        debug_assert!(idx <= self.len());

        let new_idx = NodeIdx(self.nodes.len());
        self.nodes.push(TreeNode {
            item,
            parent: NodeIdx::NONE,
            left: NodeIdx::NONE,
            right: NodeIdx::NONE,
            height: 1,
            size: 1,
            cur_ins: item.cur_state.is_inserted() as usize,
            end_ins: item.end_state.is_inserted() as usize,
        });

        if !self.root.exists() {
            self.root = new_idx;
            return new_idx;
        }

        let mut n = self.root;
        loop {
            let node = &self.nodes[n.0];
            let (left, right) = (node.left, node.right);
            let ls = self.size_of(left);

            if idx <= ls {
                if left.exists() {
                    n = left;
                } else {
                    debug_assert_eq!(idx, 0);
                    self.nodes[n.0].left = new_idx;
                    break;
                }
            } else {
                idx -= ls + 1;
                if right.exists() {
                    n = right;
                } else {
                    debug_assert_eq!(idx, 0);
                    self.nodes[n.0].right = new_idx;
                    break;
                }
            }
        }

        self.nodes[new_idx.0].parent = n;
        self.fix_up_from(n);
        new_idx
    }

    /// Walk from `n` back to the root, recomputing aggregates and restoring
    /// the AVL balance invariant.
    fn fix_up_from(&mut self, mut n: NodeIdx) {
        while n.exists() {
            self.recompute(n);

            let bf = self.balance_of(n);
            let subtree_root = if bf > 1 {
                let r = self.nodes[n.0].right;
                if self.balance_of(r) < 0 {
                    self.rotate_right(r);
                }
                self.rotate_left(n)
            } else if bf < -1 {
                let l = self.nodes[n.0].left;
                if self.balance_of(l) > 0 {
                    self.rotate_left(l);
                }
                self.rotate_right(n)
            } else {
                n
            };

            n = self.nodes[subtree_root.0].parent;
        }
    }

    /// Left-rotate around `x`, returning the node which took its place.
    fn rotate_left(&mut self, x: NodeIdx) -> NodeIdx {
        let y = self.nodes[x.0].right;
        debug_assert!(y.exists());
        let t2 = self.nodes[y.0].left;
        let p = self.nodes[x.0].parent;

        self.nodes[y.0].parent = p;
        if p.exists() {
            if self.nodes[p.0].left == x {
                self.nodes[p.0].left = y;
            } else {
                self.nodes[p.0].right = y;
            }
        } else {
            self.root = y;
        }

        self.nodes[y.0].left = x;
        self.nodes[x.0].parent = y;
        self.nodes[x.0].right = t2;
        if t2.exists() {
            self.nodes[t2.0].parent = x;
        }

        self.recompute(x);
        self.recompute(y);
        y
    }

    fn rotate_right(&mut self, x: NodeIdx) -> NodeIdx {
        let y = self.nodes[x.0].left;
        debug_assert!(y.exists());
        let t2 = self.nodes[y.0].right;
        let p = self.nodes[x.0].parent;

        self.nodes[y.0].parent = p;
        if p.exists() {
            if self.nodes[p.0].left == x {
                self.nodes[p.0].left = y;
            } else {
                self.nodes[p.0].right = y;
            }
        } else {
            self.root = y;
        }

        self.nodes[y.0].right = x;
        self.nodes[x.0].parent = y;
        self.nodes[x.0].left = t2;
        if t2.exists() {
            self.nodes[t2.0].parent = x;
        }

        self.recompute(x);
        self.recompute(y);
        y
    }

    /// The node at the requested index in document order.
    pub fn node_at_index(&self, mut idx: usize) -> NodeIdx {
        debug_assert!(idx < self.len());
        let mut n = self.root;
        loop {
            let node = &self.nodes[n.0];
            let ls = self.size_of(node.left);
            if idx < ls {
                n = node.left;
            } else if idx == ls {
                return n;
            } else {
                idx -= ls + 1;
                n = node.right;
            }
        }
    }

    /// The document-order index of a node, via its parent links. O(log n).
    pub fn index_of_node(&self, n: NodeIdx) -> usize {
        let mut idx = self.size_of(self.nodes[n.0].left);
        let mut cur = n;
        loop {
            let p = self.nodes[cur.0].parent;
            if !p.exists() { break; }
            if self.nodes[p.0].right == cur {
                idx += self.size_of(self.nodes[p.0].left) + 1;
            }
            cur = p;
        }
        idx
    }

    /// In-order successor, or NONE at the end of the tree. O(1) amortized.
    pub fn successor(&self, n: NodeIdx) -> NodeIdx {
        let right = self.nodes[n.0].right;
        if right.exists() {
            let mut m = right;
            while self.nodes[m.0].left.exists() {
                m = self.nodes[m.0].left;
            }
            return m;
        }

        let mut cur = n;
        loop {
            let p = self.nodes[cur.0].parent;
            if !p.exists() { return NodeIdx::NONE; }
            if self.nodes[p.0].left == cur { return p; }
            cur = p;
        }
    }

    /// Find the cursor position after `target` currently-visible items.
    ///
    /// Equivalent to scanning items left to right, bumping a counter for
    /// each cur-visible item (and an end counter for each end-visible one),
    /// and stopping as soon as the counter reaches `target`.
    pub fn find_by_cur_pos(&self, target: usize) -> DocCursor {
        if target == 0 {
            return DocCursor { idx: 0, end_pos: 0 };
        }
        assert!(target <= self.total_cur_ins(),
            "cursor target is past the end of the document");

        let mut k = target;
        let mut idx = 0;
        let mut end_pos = 0;
        let mut n = self.root;

        loop {
            debug_assert!(n.exists());
            let node = &self.nodes[n.0];
            let lc = self.cur_ins_of(node.left);

            if k <= lc {
                n = node.left;
            } else {
                k -= lc;
                idx += self.size_of(node.left) + 1;
                end_pos += self.end_ins_of(node.left)
                    + node.item.end_state.is_inserted() as usize;

                if node.item.cur_state.is_inserted() {
                    k -= 1;
                    if k == 0 {
                        return DocCursor { idx, end_pos };
                    }
                }
                n = node.right;
            }
        }
    }

    /// Re-sum the aggregates from `n` up to the root after the caller
    /// mutated the node's item states. O(log n).
    pub fn refresh_counts(&mut self, mut n: NodeIdx) {
        while n.exists() {
            self.recompute(n);
            n = self.nodes[n.0].parent;
        }
    }

    #[allow(unused)]
    pub fn iter_items(&self) -> TreeIter<'_> {
        let mut n = self.root;
        if n.exists() {
            while self.nodes[n.0].left.exists() {
                n = self.nodes[n.0].left;
            }
        }
        TreeIter { tree: self, next: n }
    }

    /// Panic if the tree structure or aggregates are inconsistent. Testing
    /// tool.
    #[allow(unused)]
    pub fn dbg_check(&self) {
        if !self.root.exists() {
            assert!(self.nodes.is_empty() || self.len() == 0);
            return;
        }
        assert!(!self.nodes[self.root.0].parent.exists());
        self.dbg_check_node(self.root);
    }

    #[allow(unused)]
    fn dbg_check_node(&self, n: NodeIdx) -> (usize, usize, usize, u8) {
        let node = &self.nodes[n.0];

        let (ls, lc, le, lh) = if node.left.exists() {
            assert_eq!(self.nodes[node.left.0].parent, n, "bad parent link");
            self.dbg_check_node(node.left)
        } else { (0, 0, 0, 0) };

        let (rs, rc, re, rh) = if node.right.exists() {
            assert_eq!(self.nodes[node.right.0].parent, n, "bad parent link");
            self.dbg_check_node(node.right)
        } else { (0, 0, 0, 0) };

        assert_eq!(node.size, 1 + ls + rs, "bad subtree size");
        assert_eq!(node.cur_ins, node.item.cur_state.is_inserted() as usize + lc + rc);
        assert_eq!(node.end_ins, node.item.end_state.is_inserted() as usize + le + re);
        assert_eq!(node.height, 1 + lh.max(rh), "bad height");
        assert!((rh as i32 - lh as i32).abs() <= 1, "tree is unbalanced");

        (node.size, node.cur_ins, node.end_ins, node.height)
    }
}

pub(crate) struct TreeIter<'a> {
    tree: &'a ItemTree,
    next: NodeIdx,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a Item;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.next.exists() { return None; }
        let n = self.next;
        self.next = self.tree.successor(n);
        Some(self.tree.item(n))
    }
}
