// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Tree: a generational document tree for focus management.
//!
//! This crate is the tree-abstraction seam of the Trellis workspace. It
//! models a hierarchy of nodes with per-node focus-relevant data (flags,
//! world-space bounds, optional explicit tab order) and provides the ordered
//! depth-first traversal that focus navigation is built on.
//!
//! - [`Tree`] is a concrete arena implementation with generational
//!   identifiers: removed nodes leave stale [`NodeId`]s behind that are
//!   detectable forever via [`Tree::is_alive`]. Consumers hold ids, never
//!   node references, so nothing retains a removed node.
//! - [`TreeNav`] is the read-only navigation trait the focus engine is
//!   generic over. Hosts with their own tree representation (for example a
//!   shadow-piercing view over a retained widget tree) implement `TreeNav`
//!   instead of mirroring their structure into a [`Tree`].
//!
//! ## Not a layout engine
//!
//! This crate stores final world-space rectangles supplied by the host; it
//! performs no measurement or arrangement. Bounds exist so that navigation
//! policies can reason about geometry (grid movement, scroll visibility),
//! nothing more.
//!
//! ## Example
//!
//! ```rust
//! use trellis_tree::{LocalNode, NodeFlags, Tree, TreeNav};
//!
//! let mut tree = Tree::new();
//! let root = tree.insert(None, LocalNode::default());
//! let button = tree.insert(
//!     Some(root),
//!     LocalNode {
//!         flags: NodeFlags::VISIBLE | NodeFlags::FOCUSABLE,
//!         ..LocalNode::default()
//!     },
//! );
//!
//! assert_eq!(tree.parent_of(button), Some(root));
//! assert_eq!(tree.next_depth_first(root), Some(button));
//!
//! tree.remove(button);
//! assert!(!tree.is_alive(button));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod tree;
mod types;

pub use tree::Tree;
pub use types::{LocalNode, NodeFlags, NodeId};

use kurbo::Rect;

/// Read-only navigation over a document tree.
///
/// This is the collaborator seam consumed by the focus engine: parent
/// lookup, containment, ordered depth-first traversal, and per-node data.
/// [`Tree`] implements it; hosts may substitute their own representation.
///
/// Implementations must treat stale identifiers as absent: every method
/// returns `None` (or an empty slice) for an id whose node has left the
/// tree.
pub trait TreeNav {
    /// Whether `id` refers to a live node.
    fn is_alive(&self, id: NodeId) -> bool;

    /// Parent of a live node, or `None` for roots and stale ids.
    fn parent_of(&self, id: NodeId) -> Option<NodeId>;

    /// Children of a node in document order; empty for leaves and stale ids.
    fn children_of(&self, id: NodeId) -> &[NodeId];

    /// Whether `id` is `ancestor` itself or lies in its subtree.
    fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        if !self.is_alive(ancestor) || !self.is_alive(id) {
            return false;
        }
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent_of(n);
        }
        false
    }

    /// Next node in depth-first document order, crossing subtree boundaries.
    fn next_depth_first(&self, current: NodeId) -> Option<NodeId>;

    /// Previous node in depth-first document order.
    fn prev_depth_first(&self, current: NodeId) -> Option<NodeId>;

    /// Deepest last descendant of a node, or `None` for a childless node.
    fn last_descendant(&self, id: NodeId) -> Option<NodeId>;

    /// Topmost ancestor of a live node (the node itself if it is a root).
    fn root_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut cur = id;
        while let Some(p) = self.parent_of(cur) {
            cur = p;
        }
        Some(cur)
    }

    /// Flags of a live node.
    fn flags(&self, id: NodeId) -> Option<NodeFlags>;

    /// World-space bounds of a live node.
    fn bounds(&self, id: NodeId) -> Option<Rect>;

    /// Explicit tab order key of a live node, if any.
    fn tab_index(&self, id: NodeId) -> Option<i32>;
}
