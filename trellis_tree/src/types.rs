// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the tree: node identifiers, flags, and local data.

use kurbo::Rect;

/// Identifier for a node in the tree (generational).
///
/// A `NodeId` is a slot index plus a generation. When a node is removed and
/// its slot is reused, the generation is bumped, so ids held by consumers
/// become detectably stale rather than silently pointing at a new node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Node flags controlling focusability and navigation behavior.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u16 {
        /// Node is visible. Invisible nodes (and their subtrees) are never
        /// focus candidates.
        const VISIBLE              = 0b0000_0001;
        /// Node can receive focus.
        const FOCUSABLE            = 0b0000_0010;
        /// Node is disabled: focusable in principle, skipped in practice.
        const DISABLED             = 0b0000_0100;
        /// Node is hidden from accessibility. Hides its whole subtree from
        /// focus candidates.
        const ACCESSIBILITY_HIDDEN = 0b0000_1000;
        /// Node embeds foreign content (for example a nested frame). The
        /// locator accepts it unconditionally and never descends into it.
        const EMBED                = 0b0001_0000;
        /// Node scrolls its content; its bounds act as the viewport when
        /// classifying descendant visibility.
        const SCROLL_CONTAINER     = 0b0010_0000;
        /// Node establishes right-to-left reading direction for its subtree.
        const RTL                  = 0b0100_0000;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}

/// Per-node data supplied by the host.
#[derive(Clone, Debug)]
pub struct LocalNode {
    /// Final world-space bounds. The tree performs no layout; the host
    /// supplies the resolved geometry.
    pub bounds: Rect,
    /// Focus and navigation flags.
    pub flags: NodeFlags,
    /// Optional explicit tab order key. Lower values come first; nodes
    /// without a key follow all nodes with one, in document order.
    pub tab_index: Option<i32>,
}

impl Default for LocalNode {
    fn default() -> Self {
        Self {
            bounds: Rect::ZERO,
            flags: NodeFlags::default(),
            tab_index: None,
        }
    }
}
