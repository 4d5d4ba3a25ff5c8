//! Arena-backed binary tree with parent back-references.
//!
//! Nodes live in a slot table owned by the [`Tree`]; `left`, `right` and
//! `parent` are [`NodeId`] indices into it. Every child assignment goes
//! through [`Tree::set_left`] / [`Tree::set_right`], which also rewrite the
//! child's parent link, so `parent(c) == Some(p)` always implies that `c` is
//! one of `p`'s children.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Index of a node inside its owning [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Node<T> {
    item: T,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
    root: NodeId,
}

impl<T> Tree<T> {
    /// Creates a single-node tree holding `root_item`.
    pub fn new(root_item: T) -> Self {
        Self {
            nodes: vec![Node {
                item: root_item,
                left: None,
                right: None,
                parent: None,
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocates a detached node. It joins the tree once attached with
    /// [`Tree::set_left`] or [`Tree::set_right`].
    pub fn add_node(&mut self, item: T) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            item,
            left: None,
            right: None,
            parent: None,
        });
        id
    }

    /// Number of arena slots; every [`NodeId`] of this tree indexes below it.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` addresses a slot of this tree's arena.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn item(&self, id: NodeId) -> &T {
        &self.nodes[id.0].item
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].right
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn set_left(&mut self, node: NodeId, child: NodeId) {
        self.nodes[node.0].left = Some(child);
        self.nodes[child.0].parent = Some(node);
    }

    pub fn set_right(&mut self, node: NodeId, child: NodeId) {
        self.nodes[node.0].right = Some(child);
        self.nodes[child.0].parent = Some(node);
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.left.is_none() && node.right.is_none()
    }

    pub fn is_internal(&self, id: NodeId) -> bool {
        !self.is_leaf(id)
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.count_nodes(Some(self.root))
    }

    fn count_nodes(&self, node: Option<NodeId>) -> usize {
        match node {
            Some(id) => 1 + self.count_nodes(self.left(id)) + self.count_nodes(self.right(id)),
            None => 0,
        }
    }

    /// Number of leaves reachable from the root.
    pub fn leaf_count(&self) -> usize {
        self.count_leaves(self.root)
    }

    fn count_leaves(&self, id: NodeId) -> usize {
        if self.is_leaf(id) {
            return 1;
        }
        self.left(id).map_or(0, |l| self.count_leaves(l))
            + self.right(id).map_or(0, |r| self.count_leaves(r))
    }

    /// Post-order walk (left, right, self) over the whole tree.
    pub fn post_order(&self) -> PostOrder {
        self.post_order_from(self.root)
    }

    /// Post-order walk over the subtree rooted at `node`.
    ///
    /// The order is materialized when the iterator is built; mutating the
    /// tree afterwards does not affect an iterator already in hand.
    pub fn post_order_from(&self, node: NodeId) -> PostOrder {
        let mut order = Vec::new();
        self.visit(Some(node), &mut order);
        PostOrder {
            order: order.into_iter(),
        }
    }

    fn visit(&self, node: Option<NodeId>, order: &mut Vec<NodeId>) {
        if let Some(id) = node {
            self.visit(self.left(id), order);
            self.visit(self.right(id), order);
            order.push(id);
        }
    }

    /// Whether `candidate` occurs in the subtree rooted at `root`
    /// (`root` itself included).
    pub fn contains_in_subtree(&self, candidate: NodeId, root: NodeId) -> bool {
        self.post_order_from(root).any(|id| id == candidate)
    }

    /// True when neither node lies in the other's subtree.
    pub fn in_distinct_subtrees(&self, a: NodeId, b: NodeId) -> bool {
        !self.contains_in_subtree(a, b) && !self.contains_in_subtree(b, a)
    }

    /// Returns the `n`th node of the post-order walk.
    pub fn nth_node(&self, n: usize) -> Option<NodeId> {
        self.post_order().nth(n)
    }

    /// Picks a node uniformly among the `node_count` nodes of the tree.
    pub fn random_node<R: Rng + ?Sized>(&self, rng: &mut R, node_count: usize) -> NodeId {
        let n = rng.random_range(0..node_count.max(1));
        self.nth_node(n).unwrap_or(self.root)
    }

    /// Exchanges the positions of `a` and `b` under their parents. Both
    /// subtrees move intact.
    ///
    /// The caller must establish [`Tree::in_distinct_subtrees`] first; swapping
    /// a node with one of its own descendants corrupts the tree and is not
    /// detected here.
    pub fn swap(&mut self, a: NodeId, b: NodeId) -> Result<(), TreeError> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(TreeError::UnknownNode(id));
            }
        }
        let parent_a = self.parent(a).ok_or(TreeError::RootSwap(a))?;
        let parent_b = self.parent(b).ok_or(TreeError::RootSwap(b))?;
        let a_on_left = self.left(parent_a) == Some(a);
        let b_on_left = self.left(parent_b) == Some(b);

        if a_on_left {
            self.set_left(parent_a, b);
        } else {
            self.set_right(parent_a, b);
        }
        if b_on_left {
            self.set_left(parent_b, a);
        } else {
            self.set_right(parent_b, a);
        }
        Ok(())
    }
}

/// Eagerly materialized post-order traversal.
pub struct PostOrder {
    order: std::vec::IntoIter<NodeId>,
}

impl Iterator for PostOrder {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.order.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for PostOrder {}

impl<T: fmt::Display> Tree<T> {
    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf(id) {
            return write!(f, "{}", self.item(id));
        }
        write!(f, "(")?;
        if let Some(left) = self.left(id) {
            self.fmt_node(left, f)?;
        }
        write!(f, ", ")?;
        if let Some(right) = self.right(id) {
            self.fmt_node(right, f)?;
        }
        write!(f, ")")
    }
}

impl<T: fmt::Display> fmt::Display for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ((a, b), (c, d))
    fn balanced() -> (Tree<&'static str>, [NodeId; 7]) {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let x = tree.add_node("x");
        let y = tree.add_node("y");
        let a = tree.add_node("a");
        let b = tree.add_node("b");
        let c = tree.add_node("c");
        let d = tree.add_node("d");
        tree.set_left(root, x);
        tree.set_right(root, y);
        tree.set_left(x, a);
        tree.set_right(x, b);
        tree.set_left(y, c);
        tree.set_right(y, d);
        (tree, [root, x, y, a, b, c, d])
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let (tree, [root, x, y, a, b, c, d]) = balanced();
        let order: Vec<_> = tree.post_order().collect();
        assert_eq!(order, vec![a, b, x, c, d, y, root]);
    }

    #[test]
    fn test_counts() {
        let (tree, _) = balanced();
        assert_eq!(tree.node_count(), 7);
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn test_set_child_fixes_parent() {
        let (tree, [root, x, _, a, ..]) = balanced();
        assert_eq!(tree.parent(a), Some(x));
        assert_eq!(tree.parent(x), Some(root));
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn test_subtree_containment() {
        let (tree, [root, x, y, a, _, c, _]) = balanced();
        assert!(tree.contains_in_subtree(a, x));
        assert!(tree.contains_in_subtree(a, root));
        assert!(!tree.contains_in_subtree(c, x));
        assert!(tree.in_distinct_subtrees(x, y));
        assert!(tree.in_distinct_subtrees(a, c));
        assert!(!tree.in_distinct_subtrees(root, c));
        assert!(!tree.in_distinct_subtrees(x, a));
    }

    #[test]
    fn test_swap_moves_subtrees_and_parents() {
        let (mut tree, [_, x, y, a, b, c, d]) = balanced();
        tree.swap(a, y).unwrap();
        assert_eq!(tree.left(x), Some(y));
        assert_eq!(tree.parent(y), Some(x));
        assert_eq!(tree.parent(a), Some(tree.root()));
        // y's own children travel with it
        assert_eq!(tree.left(y), Some(c));
        assert_eq!(tree.right(y), Some(d));
        assert_eq!(tree.leaf_count(), 4);
        assert_eq!(tree.to_string(), "(((c, d), b), a)");
        assert_eq!(tree.parent(b), Some(x));
    }

    #[test]
    fn test_swap_is_self_inverse() {
        let (mut tree, [_, _, _, a, _, _, d]) = balanced();
        let before = tree.to_string();
        tree.swap(a, d).unwrap();
        assert_ne!(tree.to_string(), before);
        tree.swap(a, d).unwrap();
        assert_eq!(tree.to_string(), before);
    }

    #[test]
    fn test_swap_siblings() {
        let (mut tree, [_, x, _, a, b, ..]) = balanced();
        tree.swap(a, b).unwrap();
        assert_eq!(tree.left(x), Some(b));
        assert_eq!(tree.right(x), Some(a));
        assert_eq!(tree.to_string(), "((b, a), (c, d))");
    }

    #[test]
    fn test_swap_rejects_root() {
        let (mut tree, [root, _, _, a, ..]) = balanced();
        assert_eq!(tree.swap(root, a), Err(TreeError::RootSwap(root)));
    }

    #[test]
    fn test_nth_node_follows_post_order() {
        let (tree, [root, _, _, a, ..]) = balanced();
        assert_eq!(tree.nth_node(0), Some(a));
        assert_eq!(tree.nth_node(6), Some(root));
        assert_eq!(tree.nth_node(7), None);
    }
}
