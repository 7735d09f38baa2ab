// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Groupper: Enter-to-enter, Escape-to-exit focus grouping.
//!
//! A limited groupper presents itself as a single Tab stop (its entry
//! element) until the user presses Enter on that entry, which makes the
//! group temporarily tabbable and moves focus one step inward. Escape
//! collapses the nearest active group and returns focus to its container.
//! The trap variant additionally wraps Tab/Shift+Tab inside the active
//! group until Escape.
//!
//! Activation state is tri-state from the outside: a group nested inside
//! an inactive limited group is unreachable, so asking whether it is
//! active has no answer.

use trellis_tree::{NodeId, TreeNav};

use crate::focusable::is_focusable;
use crate::locator::{Boundary, BoundaryAccept, FindProps, Locator, NextTabbable};
use crate::types::KeyOutcome;
use crate::{Engine, context};

/// How a groupper participates in structural Tab navigation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupperTabbability {
    /// The group never restricts Tab.
    #[default]
    Unlimited,
    /// The group is a single Tab stop until entered with Enter.
    Limited,
    /// Like `Limited`, and while active Tab wraps inside the group until
    /// Escape.
    LimitedTrapFocus,
}

/// Configuration of a groupper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupperProps {
    /// Tab restriction mode.
    pub tabbability: GroupperTabbability,
}

/// Runtime state of a groupper container.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GroupperState {
    pub(crate) props: GroupperProps,
    /// Whether a limited group has been entered and is temporarily
    /// tabbable.
    pub(crate) should_tab_inside: bool,
    /// Cached entry element; revalidated before use and cleared on subtree
    /// changes.
    pub(crate) first: Option<NodeId>,
}

impl GroupperState {
    pub(crate) fn new(props: GroupperProps) -> Self {
        Self {
            props,
            should_tab_inside: false,
            first: None,
        }
    }

    /// Whether the group currently lets Tab move inside it.
    pub(crate) fn tab_inside(&self) -> bool {
        self.should_tab_inside || self.props.tabbability == GroupperTabbability::Unlimited
    }
}

/// The element representing an unentered group: the container itself when
/// focusable, else the first focusable descendant (cached when valid).
pub(crate) fn entry_element<T: TreeNav>(
    loc: &Locator<'_, T>,
    gnode: NodeId,
    state: &GroupperState,
) -> Option<NodeId> {
    if is_focusable(loc.tree, loc.reg, gnode, false) {
        return Some(gnode);
    }
    if let Some(first) = state.first
        && loc.tree.contains(gnode, first)
        && is_focusable(loc.tree, loc.reg, first, false)
    {
        return Some(first);
    }
    // Plain document-order scan; boundary delegation would recurse into
    // this very group.
    let mut cur = loc.tree.next_depth_first(gnode);
    while let Some(n) = cur {
        if !loc.tree.contains(gnode, n) {
            return None;
        }
        if is_focusable(loc.tree, loc.reg, n, false) {
            return Some(n);
        }
        cur = loc.tree.next_depth_first(n);
    }
    None
}

/// Tri-state activity: `None` when an enclosing limited group is itself
/// inactive (this group is unreachable), else whether this group lets Tab
/// inside.
pub(crate) fn is_active<T: TreeNav>(
    tree: &T,
    reg: &crate::registry::Registry,
    gnode: NodeId,
) -> Option<bool> {
    let state = reg.groupper(gnode)?;
    let mut cur = tree.parent_of(gnode);
    while let Some(a) = cur {
        if let Some(outer) = reg.groupper(a)
            && !outer.tab_inside()
        {
            return None;
        }
        cur = tree.parent_of(a);
    }
    Some(state.tab_inside())
}

/// Boundary view of a groupper for the locator and Tab navigation.
pub(crate) struct GroupperBoundary<'r> {
    node: NodeId,
    state: &'r GroupperState,
}

impl core::fmt::Debug for GroupperBoundary<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GroupperBoundary")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl<'r> GroupperBoundary<'r> {
    pub(crate) fn new(node: NodeId, state: &'r GroupperState) -> Self {
        Self { node, state }
    }
}

impl Boundary for GroupperBoundary<'_> {
    fn accept_element<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        el: NodeId,
        from: Option<NodeId>,
    ) -> BoundaryAccept {
        if self.state.tab_inside() {
            return BoundaryAccept::Allow;
        }
        // Searches originating inside the group are not restricted; focus
        // that legitimately got inside must be able to leave.
        if from.is_some_and(|f| f != self.node && loc.tree.contains(self.node, f)) {
            return BoundaryAccept::Allow;
        }
        // From outside, an unentered group is reachable only at its entry.
        if entry_element(loc, self.node, self.state) == Some(el) {
            BoundaryAccept::Allow
        } else {
            BoundaryAccept::Deny
        }
    }

    fn find_next_tabbable<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        from: NodeId,
        backward: bool,
    ) -> NextTabbable {
        if !self.state.tab_inside() {
            // The whole group is one stop; skip past its subtree.
            return NextTabbable::Escape;
        }
        let props = FindProps {
            from: Some(from),
            ..FindProps::after(self.node, from)
        };
        let within = if backward {
            loc.find_prev(&props)
        } else {
            loc.find_next(&props)
        };
        if let Some(r) = within {
            return NextTabbable::Found(r);
        }
        if self.state.props.tabbability == GroupperTabbability::LimitedTrapFocus {
            // Wrap inside the trap instead of escaping.
            let edge_props = FindProps {
                from: Some(from),
                ..FindProps::in_container(self.node)
            };
            let wrapped = if backward {
                loc.find_last(&edge_props)
            } else {
                loc.find_first(&edge_props)
            };
            return match wrapped {
                Some(node) if node != from => NextTabbable::Found(crate::locator::FindResult {
                    node,
                    out_of_order: true,
                }),
                _ => NextTabbable::Stay,
            };
        }
        NextTabbable::Escape
    }
}

impl Engine {
    /// Enter pressed: if focus rests on the entry element of an unentered
    /// limited group, activate the group and advance one step inward.
    pub(crate) fn groupper_enter<T: TreeNav>(&mut self, tree: &T, now: u64) -> KeyOutcome {
        let Some(focused) = self.focused else {
            return KeyOutcome::NotHandled;
        };
        let gnode = {
            let loc = self.locator(tree);
            let Some(ctx) = context::resolve(tree, &self.reg, focused) else {
                return KeyOutcome::NotHandled;
            };
            let Some(gnode) = ctx.groupper else {
                return KeyOutcome::NotHandled;
            };
            let Some(state) = self.reg.groupper(gnode) else {
                return KeyOutcome::NotHandled;
            };
            if state.tab_inside() {
                return KeyOutcome::NotHandled;
            }
            if entry_element(&loc, gnode, state) != Some(focused) {
                return KeyOutcome::NotHandled;
            }
            gnode
        };

        if let Some(state) = self.reg.groupper_mut(gnode) {
            state.should_tab_inside = true;
            if focused != gnode {
                state.first = Some(focused);
            }
        }

        let target = {
            let loc = self.locator(tree);
            let props = FindProps {
                from: Some(focused),
                ..FindProps::after(gnode, focused)
            };
            loc.find_next(&props)
        };
        match target {
            Some(r) => {
                self.set_focus(tree, Some(r.node), now, false);
                KeyOutcome::Focused(r.node)
            }
            // The group activated but has nothing further inside.
            None => KeyOutcome::Handled,
        }
    }

    /// Escape pressed: collapse the nearest entered group above focus and
    /// return focus to its container.
    pub(crate) fn groupper_escape<T: TreeNav>(&mut self, tree: &T, now: u64) -> KeyOutcome {
        let Some(focused) = self.focused else {
            return KeyOutcome::NotHandled;
        };
        let mut cur = Some(focused);
        while let Some(n) = cur {
            if self.reg.groupper(n).is_some_and(|s| s.should_tab_inside) {
                if let Some(state) = self.reg.groupper_mut(n) {
                    state.should_tab_inside = false;
                }
                // The container is the group's single stop again; focus it
                // even when it is not itself focusable.
                self.set_focus(tree, Some(n), now, true);
                return KeyOutcome::Focused(n);
            }
            cur = tree.parent_of(n);
        }
        KeyOutcome::NotHandled
    }

    /// Focus left a group: collapse every entered group that no longer
    /// contains focus.
    pub(crate) fn groupper_on_focus<T: TreeNav>(
        &mut self,
        tree: &T,
        old: Option<NodeId>,
        new: Option<NodeId>,
    ) {
        let Some(old) = old else {
            return;
        };
        let mut collapse = alloc::vec::Vec::new();
        let mut cur = Some(old);
        while let Some(n) = cur {
            if self.reg.groupper(n).is_some_and(|s| s.should_tab_inside)
                && !new.is_some_and(|nw| tree.contains(n, nw))
            {
                collapse.push(n);
            }
            cur = tree.parent_of(n);
        }
        for n in collapse {
            if let Some(state) = self.reg.groupper_mut(n) {
                state.should_tab_inside = false;
            }
        }
    }
}
