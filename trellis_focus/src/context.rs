// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus context resolution.
//!
//! A [`FocusContext`] is the set of enclosing managed behaviors for one
//! node at one point in time: the terminal root, the nearest mover and
//! groupper (and which of the two is nearer), the nearest modalizer, the
//! nearest uncontrolled marker, and the accumulated reading direction. It
//! is recomputed for every query and never cached across tree mutations;
//! resolution is a single ancestor walk, cheap enough to repeat.

use trellis_tree::{NodeFlags, NodeId, TreeNav};

use crate::registry::Registry;

/// Resolved enclosing behaviors for a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FocusContext {
    /// The terminal root boundary.
    pub root: NodeId,
    /// Nearest enclosing modalizer container, if any.
    pub modalizer: Option<NodeId>,
    /// Nearest enclosing groupper container, if any.
    pub groupper: Option<NodeId>,
    /// Nearest enclosing mover container, if any.
    pub mover: Option<NodeId>,
    /// When both a groupper and a mover enclose the node, whether the
    /// groupper is the nearer of the two.
    pub groupper_before_mover: bool,
    /// Nearest enclosing uncontrolled marker, if any.
    pub uncontrolled: Option<NodeId>,
    /// Whether an ancestor establishes right-to-left reading direction.
    pub rtl: bool,
}

/// Resolve the context for `node` by walking its ancestor chain.
///
/// Returns `None` when no root encloses the node; the engine decides
/// whether to lazily provide an auto-root in that case.
pub(crate) fn resolve<T: TreeNav>(tree: &T, reg: &Registry, node: NodeId) -> Option<FocusContext> {
    if !tree.is_alive(node) {
        return None;
    }

    let mut modalizer = None;
    let mut groupper = None;
    let mut mover = None;
    let mut groupper_before_mover = false;
    let mut uncontrolled = None;
    let mut rtl = false;

    let mut cur = Some(node);
    while let Some(n) = cur {
        if tree.flags(n).is_some_and(|f| f.contains(NodeFlags::RTL)) {
            rtl = true;
        }
        if let Some(tag) = reg.tag(n) {
            if tag.uncontrolled && uncontrolled.is_none() {
                uncontrolled = Some(n);
            }
            if tag.modalizer.is_some() && modalizer.is_none() {
                modalizer = Some(n);
            }
            if tag.groupper.is_some() && groupper.is_none() {
                groupper = Some(n);
                if mover.is_none() {
                    groupper_before_mover = true;
                }
            }
            if tag.mover.is_some() && mover.is_none() {
                mover = Some(n);
            }
            if tag.root.is_some() {
                return Some(FocusContext {
                    root: n,
                    modalizer,
                    groupper,
                    mover,
                    groupper_before_mover,
                    uncontrolled,
                    rtl,
                });
            }
        }
        cur = tree.parent_of(n);
    }
    None
}
