// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focusability predicate and scroll-visibility classification.
//!
//! The predicate answers one question for one node: can focus legitimately
//! rest here right now? It combines the node's own flags with an ancestor
//! scan, because visibility and accessibility-hiding are inherited: a
//! focusable button inside a hidden panel is not a focus candidate.

use kurbo::Rect;
use trellis_tree::{NodeFlags, NodeId, TreeNav};

use crate::registry::Registry;
use crate::types::Visibility;

/// Per-node focusable properties, layered on top of the tree flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusableProps {
    /// This node is the preferred landing target of its container for
    /// find-default queries and default-first restoration.
    pub is_default: bool,
    /// Exclude this node from focus candidates even though its tree flags
    /// would qualify it.
    pub ignored: bool,
}

/// Whether a node itself and all of its ancestors are visible.
pub(crate) fn is_visible<T: TreeNav>(tree: &T, id: NodeId) -> bool {
    if !tree.is_alive(id) {
        return false;
    }
    let mut cur = Some(id);
    while let Some(n) = cur {
        match tree.flags(n) {
            Some(f) if f.contains(NodeFlags::VISIBLE) => {}
            _ => return false,
        }
        cur = tree.parent_of(n);
    }
    true
}

/// Whether a node or any ancestor is hidden from accessibility.
fn is_accessibility_hidden<T: TreeNav>(tree: &T, id: NodeId) -> bool {
    let mut cur = Some(id);
    while let Some(n) = cur {
        if tree
            .flags(n)
            .is_some_and(|f| f.contains(NodeFlags::ACCESSIBILITY_HIDDEN))
        {
            return true;
        }
        cur = tree.parent_of(n);
    }
    false
}

/// The focusability predicate: alive, focusable, visible through all
/// ancestors, and (unless `ignore_accessibility`) neither disabled nor
/// hidden from accessibility.
pub(crate) fn is_focusable<T: TreeNav>(
    tree: &T,
    reg: &Registry,
    id: NodeId,
    ignore_accessibility: bool,
) -> bool {
    let Some(flags) = tree.flags(id) else {
        return false;
    };
    if !flags.contains(NodeFlags::FOCUSABLE) {
        return false;
    }
    if reg.focusable_props(id).is_some_and(|p| p.ignored) {
        return false;
    }
    if !is_visible(tree, id) {
        return false;
    }
    if !ignore_accessibility {
        if flags.contains(NodeFlags::DISABLED) {
            return false;
        }
        if is_accessibility_hidden(tree, id) {
            return false;
        }
    }
    true
}

/// Nearest scroll-container ancestor (exclusive) and its viewport bounds.
pub(crate) fn scroll_viewport<T: TreeNav>(tree: &T, id: NodeId) -> Option<(NodeId, Rect)> {
    let mut cur = tree.parent_of(id);
    while let Some(n) = cur {
        if tree
            .flags(n)
            .is_some_and(|f| f.contains(NodeFlags::SCROLL_CONTAINER))
        {
            return Some((n, tree.bounds(n)?));
        }
        cur = tree.parent_of(n);
    }
    None
}

/// Classify how much of a node is visible inside its nearest scroll
/// viewport. Nodes with no scroll ancestor count as fully visible.
pub(crate) fn visibility_class<T: TreeNav>(tree: &T, id: NodeId) -> Visibility {
    let Some(bounds) = tree.bounds(id) else {
        return Visibility::Invisible;
    };
    let Some((_, viewport)) = scroll_viewport(tree, id) else {
        return Visibility::Visible;
    };
    let overlap = bounds.intersect(viewport);
    if overlap.width() <= 0.0 || overlap.height() <= 0.0 {
        Visibility::Invisible
    } else if overlap == bounds {
        Visibility::Visible
    } else {
        Visibility::PartiallyVisible
    }
}
