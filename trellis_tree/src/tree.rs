// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena tree implementation: structure, updates, traversal.

use alloc::vec::Vec;
use kurbo::Rect;

use crate::TreeNav;
use crate::types::{LocalNode, NodeFlags, NodeId};

/// Generational arena document tree.
///
/// Nodes are stored in slots; removing a node frees its slot for reuse with
/// a bumped generation, so previously handed-out [`NodeId`]s become stale
/// rather than dangling. All accessors are liveness-gated: a stale id
/// behaves as if the node does not exist.
///
/// ## Example
///
/// ```rust
/// use trellis_tree::{LocalNode, Tree, TreeNav};
///
/// let mut tree = Tree::new();
/// let root = tree.insert(None, LocalNode::default());
/// let child = tree.insert(Some(root), LocalNode::default());
///
/// assert!(tree.contains(root, child));
/// assert_eq!(tree.root_of(child), Some(root));
/// ```
#[derive(Default)]
pub struct Tree {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: LocalNode,
}

impl Node {
    fn new(generation: u32, local: LocalNode) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            local,
        }
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Insert a new node as a child of `parent` (or as a root if `None`).
    pub fn insert(&mut self, parent: Option<NodeId>, local: LocalNode) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, local));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, local)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(p) = parent {
            self.link_parent(id, p);
        }
        id
    }

    /// Remove a node and its subtree. All removed ids become stale.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        self.remove_subtree(id);
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let children = core::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Reparent `id` under `new_parent` (or detach into a root if `None`).
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p);
        }
    }

    /// Update world-space bounds.
    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.bounds = bounds;
        }
    }

    /// Update node flags.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.flags = flags;
        }
    }

    /// Update the explicit tab order key.
    pub fn set_tab_index(&mut self, id: NodeId, tab_index: Option<i32>) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.tab_index = tab_index;
        }
    }

    // --- internals ---

    /// Access a node; panics if `id` is stale.
    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        let parent_node = self.node_mut(parent);
        parent_node.children.push(id);
        self.node_mut(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        let p = self.node_mut(parent);
        p.children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(node)?;
        let siblings = &self.node(parent).children;
        let pos = siblings.iter().position(|&id| id == node)?;
        siblings.get(pos + 1).copied()
    }

    fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(node)?;
        let siblings = &self.node(parent).children;
        let pos = siblings.iter().position(|&id| id == node)?;
        if pos > 0 { siblings.get(pos - 1).copied() } else { None }
    }

    fn last_in_subtree(&self, node: NodeId) -> NodeId {
        let mut cur = node;
        while let Some(&last_child) = self.node(cur).children.last() {
            cur = last_child;
        }
        cur
    }
}

impl TreeNav for Tree {
    fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    fn children_of(&self, id: NodeId) -> &[NodeId] {
        match self.node_opt(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    fn next_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(&first_child) = self.node(current).children.first() {
            return Some(first_child);
        }
        let mut node = current;
        loop {
            if let Some(next_sibling) = self.next_sibling(node) {
                return Some(next_sibling);
            }
            node = self.parent_of(node)?;
        }
    }

    fn prev_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(prev_sibling) = self.prev_sibling(current) {
            return Some(self.last_in_subtree(prev_sibling));
        }
        self.parent_of(current)
    }

    fn last_descendant(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        let last = self.last_in_subtree(id);
        if last == id { None } else { Some(last) }
    }

    fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        self.node_opt(id).map(|n| n.local.flags)
    }

    fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id).map(|n| n.local.bounds)
    }

    fn tab_index(&self, id: NodeId) -> Option<i32> {
        self.node_opt(id).and_then(|n| n.local.tab_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> LocalNode {
        LocalNode::default()
    }

    #[test]
    fn liveness_insert_remove_reuse() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());

        assert!(tree.is_alive(root));
        assert!(tree.is_alive(a));

        // Remove child; id becomes stale.
        tree.remove(a);
        assert!(!tree.is_alive(a));

        // Insert new child; might reuse slot but generation bumps.
        let b = tree.insert(Some(root), node());
        assert!(tree.is_alive(b));
        assert!(!tree.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
    }

    #[test]
    fn depth_first_traversal() {
        let mut tree = Tree::new();
        // Build tree: root -> [a -> [c, d], b]
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());
        let b = tree.insert(Some(root), node());
        let c = tree.insert(Some(a), node());
        let d = tree.insert(Some(a), node());

        // Depth-first order should be: root -> a -> c -> d -> b
        assert_eq!(tree.next_depth_first(root), Some(a));
        assert_eq!(tree.next_depth_first(a), Some(c));
        assert_eq!(tree.next_depth_first(c), Some(d));
        assert_eq!(tree.next_depth_first(d), Some(b));
        assert!(tree.next_depth_first(b).is_none());
    }

    #[test]
    fn reverse_depth_first_traversal() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());
        let b = tree.insert(Some(root), node());
        let c = tree.insert(Some(a), node());
        let d = tree.insert(Some(a), node());

        // Reverse depth-first order should be: b -> d -> c -> a -> root
        assert_eq!(tree.prev_depth_first(b), Some(d));
        assert_eq!(tree.prev_depth_first(d), Some(c));
        assert_eq!(tree.prev_depth_first(c), Some(a));
        assert_eq!(tree.prev_depth_first(a), Some(root));
        assert!(tree.prev_depth_first(root).is_none());
    }

    #[test]
    fn last_descendant_follows_last_child_chain() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let _a = tree.insert(Some(root), node());
        let b = tree.insert(Some(root), node());
        let c = tree.insert(Some(b), node());

        assert_eq!(tree.last_descendant(root), Some(c));
        assert_eq!(tree.last_descendant(b), Some(c));
        assert!(tree.last_descendant(c).is_none());
    }

    #[test]
    fn containment_and_roots() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());
        let b = tree.insert(Some(a), node());
        let other = tree.insert(None, node());

        assert!(tree.contains(root, b));
        assert!(tree.contains(a, b));
        assert!(tree.contains(b, b));
        assert!(!tree.contains(b, a));
        assert!(!tree.contains(other, b));
        assert_eq!(tree.root_of(b), Some(root));
        assert_eq!(tree.root_of(other), Some(other));
    }

    #[test]
    fn remove_subtree_makes_descendants_stale() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());
        let b = tree.insert(Some(a), node());

        tree.remove(a);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(b));
        assert!(tree.children_of(root).is_empty());
        assert!(tree.next_depth_first(root).is_none());
    }

    #[test]
    fn reparent_moves_subtree() {
        let mut tree = Tree::new();
        let root = tree.insert(None, node());
        let a = tree.insert(Some(root), node());
        let b = tree.insert(Some(root), node());
        let c = tree.insert(Some(a), node());

        tree.reparent(c, Some(b));
        assert_eq!(tree.parent_of(c), Some(b));
        assert!(tree.children_of(a).is_empty());
        // New order: root -> a -> b -> c
        assert_eq!(tree.next_depth_first(a), Some(b));
        assert_eq!(tree.next_depth_first(b), Some(c));
    }

    #[test]
    fn stale_ids_answer_nothing() {
        let mut tree = Tree::new();
        let n = tree.insert(None, node());
        tree.remove(n);

        assert_eq!(tree.parent_of(n), None);
        assert!(tree.children_of(n).is_empty());
        assert_eq!(tree.flags(n), None);
        assert_eq!(tree.bounds(n), None);
        assert_eq!(tree.tab_index(n), None);
        assert_eq!(tree.next_depth_first(n), None);
        assert_eq!(tree.prev_depth_first(n), None);
        assert_eq!(tree.root_of(n), None);
    }

    #[test]
    fn local_data_setters() {
        use kurbo::Rect;

        let mut tree = Tree::new();
        let n = tree.insert(None, node());
        tree.set_bounds(n, Rect::new(1.0, 2.0, 3.0, 4.0));
        tree.set_flags(n, NodeFlags::VISIBLE | NodeFlags::FOCUSABLE);
        tree.set_tab_index(n, Some(2));

        assert_eq!(tree.bounds(n), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(tree.flags(n), Some(NodeFlags::VISIBLE | NodeFlags::FOCUSABLE));
        assert_eq!(tree.tab_index(n), Some(2));
    }
}
