// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Focus: keyboard focus management for document trees.
//!
//! This crate is the focus navigation and restoration engine of the
//! Trellis workspace: it overrides default Tab order, implements focus
//! traps and modal regions, drives arrow-key navigation widgets, and
//! recovers focus when the focused element disappears. These are the
//! pieces an application needs for WCAG-correct keyboard navigation
//! without hand-rolling tree walks on every widget.
//!
//! ## Behaviors
//!
//! Behaviors are attached per node through the [`Engine`]'s registration
//! calls and stored out of band; the tree itself stays a plain
//! [`trellis_tree::TreeNav`] implementation:
//!
//! - **Root**: marks a subtree as engine-managed and carries the
//!   restoration policy.
//! - **Mover**: arrow-key/paging navigation over a container's
//!   focusables, with optional grid geometry and visibility tracking.
//! - **Groupper**: Enter-to-enter/Escape-to-exit grouping, optionally
//!   trapping Tab.
//! - **Modalizer**: exclusive-focus region activated by focusing into it.
//! - **Deloser**: focus-loss history and the restoration cascade.
//! - **Uncontrolled**: a subtree excluded from managed Tab handling.
//!
//! ## Driving the engine
//!
//! The engine is single-threaded and host-driven: the host forwards key
//! events, focus reports, and tree-change notifications, passes a
//! timestamp with each call, and periodically calls [`Engine::tick`] to
//! run due deferred work (debounces, the restoration settle delay, the
//! registry sweep). Everything observable comes back through
//! [`Engine::drain_events`].
//!
//! ```rust
//! use trellis_focus::{Engine, EngineOptions, Key, KeyInput, KeyOutcome, RootProps};
//! use trellis_tree::{LocalNode, NodeFlags, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.insert(None, LocalNode::default());
//! let focusable = LocalNode {
//!     flags: NodeFlags::VISIBLE | NodeFlags::FOCUSABLE,
//!     ..LocalNode::default()
//! };
//! let first = tree.insert(Some(root), focusable.clone());
//! let second = tree.insert(Some(root), focusable);
//!
//! let mut engine = Engine::new(EngineOptions::default());
//! engine.add_root(root, RootProps::default());
//!
//! assert!(engine.focus(&tree, first, 0));
//! let outcome = engine.handle_key(&tree, KeyInput::new(Key::Tab), 10);
//! assert_eq!(outcome, KeyOutcome::Focused(second));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod context;
mod deloser;
mod events;
mod focusable;
mod groupper;
mod locator;
mod modalizer;
mod mover;
mod registry;
mod root;
mod types;

pub use context::FocusContext;
pub use deloser::DeloserProps;
pub use events::FocusEvent;
pub use focusable::FocusableProps;
pub use groupper::{GroupperProps, GroupperTabbability};
pub use locator::{FindProps, FindResult};
pub use modalizer::ModalizerProps;
pub use mover::{MoverDirection, MoverProps};
pub use root::RootProps;
pub use trellis_tree::NodeId;
pub use types::{Key, KeyInput, KeyOutcome, Marker, RestoreFocusOrder, Visibility};

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use trellis_schedule::{JobHandle, Scheduler};
use trellis_tree::TreeNav;

use crate::deloser::{DeloserHistory, DeloserState, RestorePoint};
use crate::focusable::{is_focusable, is_visible};
use crate::groupper::GroupperState;
use crate::locator::Locator;
use crate::modalizer::ModalizerState;
use crate::mover::MoverState;
use crate::registry::Registry;
use crate::root::RootState;

/// Deferred work owned by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Job {
    /// Run the restoration cascade after the settle delay.
    Restore,
    /// Recompute a mover's tracked children after a subtree change.
    MoverUpdate(NodeId),
    /// Recompute a mover's visibility classes after a scroll.
    MoverVisibility(NodeId),
    /// Reclaim registry entries for removed nodes.
    Sweep,
}

/// Engine construction options.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// Lazily register a root over the whole tree when a focused node has
    /// no explicit root.
    pub auto_root: Option<RootProps>,
    /// Lazily register an implicit deloser over the root boundary so that
    /// focus loss is always recoverable.
    pub auto_deloser: Option<DeloserProps>,
    /// Settle delay before the restoration cascade runs, in the host's
    /// time units.
    pub restore_delay: u64,
    /// Debounce for scroll-driven mover visibility recomputes.
    pub scroll_debounce: u64,
    /// Interval of the periodic registry sweep; `None` disables it.
    pub sweep_interval: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            auto_root: None,
            auto_deloser: None,
            restore_delay: 100,
            scroll_debounce: 200,
            sweep_interval: Some(10_000),
        }
    }
}

/// The focus management engine.
///
/// One instance owns all cross-component state: the behavior registry,
/// the deloser history, the deferred-job scheduler, and the canonical
/// focused element. Components are notified of every focus change in a
/// fixed order (root, deloser, modalizer, mover, groupper), so event
/// sequences are deterministic.
///
/// The engine holds no reference to the tree; every call takes the host's
/// current [`TreeNav`] view, which keeps borrows simple and lets the host
/// swap tree representations.
pub struct Engine {
    pub(crate) options: EngineOptions,
    pub(crate) reg: Registry,
    pub(crate) history: DeloserHistory,
    pub(crate) sched: Scheduler<Job>,
    pub(crate) events: VecDeque<FocusEvent>,
    pub(crate) focused: Option<NodeId>,
    pub(crate) focused_root: Option<NodeId>,
    pub(crate) current_deloser: Option<NodeId>,
    pub(crate) active_modalizer: Option<NodeId>,
    pub(crate) restore_from: Option<RestorePoint>,
    pub(crate) restore_job: Option<JobHandle>,
    pub(crate) auto_root_node: Option<NodeId>,
    pub(crate) auto_deloser_node: Option<NodeId>,
    pub(crate) keyboard_nav: bool,
    pub(crate) disposed: bool,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("focused", &self.focused)
            .field("active_modalizer", &self.active_modalizer)
            .field("pending_jobs", &self.sched.len())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    /// Create an engine with the given options.
    pub fn new(options: EngineOptions) -> Self {
        let mut sched = Scheduler::new();
        if let Some(interval) = options.sweep_interval {
            sched.schedule(0, interval, Job::Sweep);
        }
        Self {
            options,
            reg: Registry::new(),
            history: DeloserHistory::new(),
            sched,
            events: VecDeque::new(),
            focused: None,
            focused_root: None,
            current_deloser: None,
            active_modalizer: None,
            restore_from: None,
            restore_job: None,
            auto_root_node: None,
            auto_deloser_node: None,
            keyboard_nav: false,
            disposed: false,
        }
    }

    // --- state queries ---

    /// The currently focused node, if any.
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Whether the user is currently navigating by keyboard (a key was
    /// handled since the last pointer-driven or programmatic focus).
    pub fn keyboard_navigation(&self) -> bool {
        self.keyboard_nav
    }

    /// Resolve a marker to the node currently carrying it.
    pub fn resolve_marker(&self, marker: Marker) -> Option<NodeId> {
        self.reg.resolve_marker(marker)
    }

    /// The earliest timestamp at which [`Engine::tick`] has work to do.
    pub fn next_wakeup(&self) -> Option<u64> {
        self.sched.next_due()
    }

    /// Resolve the focus context for a node.
    pub fn context<T: TreeNav>(&self, tree: &T, node: NodeId) -> Option<FocusContext> {
        context::resolve(tree, &self.reg, node)
    }

    /// Tri-state groupper activity: `None` while an enclosing group makes
    /// this one unreachable.
    pub fn groupper_is_active<T: TreeNav>(&self, tree: &T, node: NodeId) -> Option<bool> {
        groupper::is_active(tree, &self.reg, node)
    }

    /// A mover's current and previous child.
    pub fn mover_state(&self, mover: NodeId) -> Option<(Option<NodeId>, Option<NodeId>)> {
        self.reg.mover(mover).map(|s| (s.current, s.previous))
    }

    /// The tracked visibility class of a mover's child, when the mover
    /// tracks visibility and has classified the child.
    pub fn mover_visibility(&self, mover: NodeId, child: NodeId) -> Option<Visibility> {
        self.reg.mover(mover)?.visibilities.get(&child).copied()
    }

    /// Whether a modalizer container is the active exclusive region.
    pub fn modalizer_is_active(&self, node: NodeId) -> bool {
        self.reg.modalizer(node).is_some_and(|s| s.active)
    }

    /// Drain all queued outbound events.
    pub fn drain_events(&mut self) -> Vec<FocusEvent> {
        self.events.drain(..).collect()
    }

    // --- focus primitives ---

    /// Programmatically focus a node. Returns `false` when the node is not
    /// an acceptable target (dead, unfocusable, or outside any root).
    pub fn focus<T: TreeNav>(&mut self, tree: &T, node: NodeId, now: u64) -> bool {
        self.keyboard_nav = false;
        self.set_focus(tree, Some(node), now, false)
    }

    /// Clear focus intentionally (no restoration is armed).
    pub fn blur<T: TreeNav>(&mut self, tree: &T, now: u64) {
        self.set_focus(tree, None, now, false);
    }

    /// The platform reported a completed focus change the engine did not
    /// initiate (pointer click, script). Accepted verbatim.
    pub fn on_external_focus<T: TreeNav>(&mut self, tree: &T, node: Option<NodeId>, now: u64) {
        self.keyboard_nav = false;
        self.set_focus(tree, node, now, true);
    }

    /// The canonical focus-changed publisher. All components observe the
    /// change from here, in a fixed order: root, deloser, modalizer,
    /// mover, groupper.
    pub(crate) fn set_focus<T: TreeNav>(
        &mut self,
        tree: &T,
        new: Option<NodeId>,
        now: u64,
        force: bool,
    ) -> bool {
        if self.disposed {
            return false;
        }
        if let Some(n) = new {
            if !tree.is_alive(n) {
                return false;
            }
            self.ensure_auto_root(tree, n);
            if context::resolve(tree, &self.reg, n).is_none() {
                return false;
            }
            if !force && !is_focusable(tree, &self.reg, n, false) {
                return false;
            }
        }

        let old = self.focused;
        if old == new {
            return true;
        }
        if new.is_some()
            && let Some(handle) = self.restore_job.take()
        {
            self.sched.cancel(handle);
            self.restore_from = None;
        }
        self.focused = new;

        // Root boundary events.
        let new_root = new
            .and_then(|n| context::resolve(tree, &self.reg, n))
            .map(|c| c.root);
        let old_root = self.focused_root;
        if let Some(o) = old {
            self.events.push_back(FocusEvent::FocusOut { node: o });
        }
        if old_root != new_root {
            if let Some(r) = old_root {
                self.events.push_back(FocusEvent::RootBlur { root: r });
            }
            if let Some(r) = new_root {
                self.events.push_back(FocusEvent::RootFocus { root: r });
            }
        }
        if let Some(n) = new {
            self.events.push_back(FocusEvent::FocusIn { node: n });
        }
        self.focused_root = new_root;

        // Component notifications, fixed order.
        if let Some(n) = new {
            self.deloser_on_focus(tree, n);
        }
        self.modalizer_on_focus(tree, new);
        self.mover_on_focus(tree, new);
        self.groupper_on_focus(tree, old, new);
        true
    }

    /// Lazily register the singleton auto-root over the node's tree when
    /// no explicit root encloses it.
    fn ensure_auto_root<T: TreeNav>(&mut self, tree: &T, node: NodeId) {
        let Some(props) = self.options.auto_root else {
            return;
        };
        if context::resolve(tree, &self.reg, node).is_some() {
            return;
        }
        if self.auto_root_node.is_some_and(|r| tree.is_alive(r)) {
            return;
        }
        let Some(top) = tree.root_of(node) else {
            return;
        };
        if self.reg.root(top).is_none() {
            let uid = self.reg.next_uid();
            self.reg.tag_entry(top).root = Some(RootState::new(uid, props));
        }
        self.auto_root_node = Some(top);
    }

    pub(crate) fn locator<'a, T: TreeNav>(&'a self, tree: &'a T) -> Locator<'a, T> {
        Locator::new(tree, &self.reg, self.active_modalizer)
    }

    // --- keyboard ---

    /// Feed an interpreted key event through the engine.
    pub fn handle_key<T: TreeNav>(&mut self, tree: &T, input: KeyInput, now: u64) -> KeyOutcome {
        if self.disposed {
            return KeyOutcome::NotHandled;
        }
        self.keyboard_nav = true;
        match input.key {
            Key::Tab => self.handle_tab(tree, input.shift, now),
            Key::Enter => self.groupper_enter(tree, now),
            Key::Esc => self.groupper_escape(tree, now),
            Key::Up
            | Key::Down
            | Key::Left
            | Key::Right
            | Key::Home
            | Key::End
            | Key::PageUp
            | Key::PageDown => self.mover_key(tree, input, now),
        }
    }

    fn handle_tab<T: TreeNav>(&mut self, tree: &T, backward: bool, now: u64) -> KeyOutcome {
        let Some(focused) = self.focused else {
            return KeyOutcome::NotHandled;
        };
        if !tree.is_alive(focused) {
            return KeyOutcome::NotHandled;
        }
        let next = {
            let loc = self.locator(tree);
            locator::next_tabbable(&loc, focused, backward)
        };
        match next {
            Some(r) if r.node == focused => KeyOutcome::Handled,
            Some(r) => {
                if self.set_focus(tree, Some(r.node), now, false) {
                    KeyOutcome::Focused(r.node)
                } else {
                    KeyOutcome::Handled
                }
            }
            None => {
                self.leave_root(tree);
                KeyOutcome::LeftRoot
            }
        }
    }

    /// Structural navigation ran past the boundary: blur without arming
    /// restoration, since the exit is intentional.
    fn leave_root<T: TreeNav>(&mut self, tree: &T) {
        let old = self.focused.take();
        if let Some(o) = old {
            self.events.push_back(FocusEvent::FocusOut { node: o });
        }
        if let Some(r) = self.focused_root.take() {
            self.events.push_back(FocusEvent::RootBlur { root: r });
        }
        self.modalizer_on_focus(tree, None);
        self.groupper_on_focus(tree, old, None);
    }

    // --- find wrappers ---

    /// First focusable after `props.current` in document order.
    pub fn find_next<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Option<FindResult> {
        self.locator(tree).find_next(props)
    }

    /// First focusable before `props.current` in reverse document order.
    pub fn find_prev<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Option<FindResult> {
        self.locator(tree).find_prev(props)
    }

    /// First focusable of a container in tab order.
    pub fn find_first<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Option<NodeId> {
        self.locator(tree).find_first(props)
    }

    /// Last focusable of a container in tab order.
    pub fn find_last<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Option<NodeId> {
        self.locator(tree).find_last(props)
    }

    /// The container's default element.
    pub fn find_default<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Option<NodeId> {
        self.locator(tree).find_default(props)
    }

    /// Every focusable of a container in tab order.
    pub fn find_all<T: TreeNav>(&self, tree: &T, props: &FindProps) -> Vec<NodeId> {
        self.locator(tree).find_all(props)
    }

    // --- inbound change notifications ---

    /// A node (and its subtree) was removed from the tree. If focus was
    /// inside, the restoration cascade is armed.
    pub fn on_node_removed<T: TreeNav>(&mut self, tree: &T, node: NodeId, now: u64) {
        if self.disposed {
            return;
        }
        if self.auto_root_node == Some(node) && !tree.is_alive(node) {
            self.auto_root_node = None;
        }
        if self.auto_deloser_node == Some(node) && !tree.is_alive(node) {
            self.auto_deloser_node = None;
        }
        if let Some(m) = self.active_modalizer
            && !tree.is_alive(m)
        {
            self.active_modalizer = None;
            self.events.push_back(FocusEvent::ModalizerInactive { modalizer: m });
        }
        self.check_focus_integrity(tree, now);
    }

    /// A container's subtree changed (children added, removed, or
    /// reordered).
    pub fn on_subtree_changed<T: TreeNav>(&mut self, tree: &T, container: NodeId, now: u64) {
        if self.disposed {
            return;
        }
        let mut movers = Vec::new();
        let mut cur = Some(container);
        while let Some(n) = cur {
            if let Some(state) = self.reg.groupper_mut(n) {
                state.first = None;
            }
            if self.reg.mover(n).is_some() {
                movers.push(n);
            }
            cur = tree.parent_of(n);
        }
        for m in movers {
            self.mover_schedule_update(m, now);
        }
        self.check_focus_integrity(tree, now);
    }

    /// A scroll container scrolled; visibility-tracking movers touching it
    /// recompute after a debounce.
    pub fn on_scroll<T: TreeNav>(&mut self, tree: &T, container: NodeId, now: u64) {
        if self.disposed {
            return;
        }
        let movers: Vec<NodeId> = self
            .reg
            .nodes()
            .filter(|&n| {
                self.reg.mover(n).is_some_and(|s| s.props.track_visibility)
                    && tree.is_alive(n)
                    && (tree.contains(container, n) || tree.contains(n, container))
            })
            .collect();
        for m in movers {
            self.mover_schedule_visibility(m, now);
        }
    }

    /// Focus must never rest on a removed or invisible node; every path
    /// detecting that funnels into the restoration cascade.
    fn check_focus_integrity<T: TreeNav>(&mut self, tree: &T, now: u64) {
        let Some(focused) = self.focused else {
            return;
        };
        if tree.is_alive(focused) && is_visible(tree, focused) {
            return;
        }
        self.focused = None;
        let old_root = self.focused_root.take();
        self.events.push_back(FocusEvent::FocusOut { node: focused });
        if let Some(r) = old_root {
            self.events.push_back(FocusEvent::RootBlur { root: r });
        }
        self.deloser_on_focus_lost(focused, now);
    }

    // --- deferred work ---

    /// Run all deferred jobs due at or before `now`.
    pub fn tick<T: TreeNav>(&mut self, tree: &T, now: u64) {
        if self.disposed {
            return;
        }
        while let Some(job) = self.sched.pop_due(now) {
            match job {
                Job::Restore => self.run_restore(tree, now),
                Job::MoverUpdate(m) => self.run_mover_update(tree, m),
                Job::MoverVisibility(m) => self.run_mover_visibility(tree, m),
                Job::Sweep => self.run_sweep(tree, now),
            }
        }
    }

    fn run_sweep<T: TreeNav>(&mut self, tree: &T, now: u64) {
        let dead_delosers = self.reg.sweep(tree);
        for d in dead_delosers {
            self.history.remove_deloser(d);
        }
        self.history.retain_alive(tree);
        if let Some(m) = self.active_modalizer
            && !tree.is_alive(m)
        {
            self.active_modalizer = None;
            self.events.push_back(FocusEvent::ModalizerInactive { modalizer: m });
        }
        if self.current_deloser.is_some_and(|d| !tree.is_alive(d)) {
            self.current_deloser = None;
        }
        if self.auto_root_node.is_some_and(|r| !tree.is_alive(r)) {
            self.auto_root_node = None;
        }
        if self.auto_deloser_node.is_some_and(|d| !tree.is_alive(d)) {
            self.auto_deloser_node = None;
        }
        self.check_focus_integrity(tree, now);
        if let Some(interval) = self.options.sweep_interval {
            self.sched.schedule(now, interval, Job::Sweep);
        }
    }

    /// Dispose the engine: clears all deferred work and detaches state.
    /// Idempotent; a disposed engine ignores every call.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.sched.clear();
        self.events.clear();
        self.restore_job = None;
        self.restore_from = None;
    }

    // --- behavior registration ---
    //
    // Registering a behavior twice for the same node is a no-op (the
    // idempotence contract), as is operating on a disposed engine.

    /// Register a root boundary on a node.
    pub fn add_root(&mut self, node: NodeId, props: RootProps) {
        if self.disposed || self.reg.root(node).is_some() {
            return;
        }
        let uid = self.reg.next_uid();
        self.reg.tag_entry(node).root = Some(RootState::new(uid, props));
    }

    /// Update a root's configuration.
    pub fn set_root_props(&mut self, node: NodeId, props: RootProps) {
        if let Some(tag) = self.reg.tag_mut(node)
            && let Some(state) = tag.root.as_mut()
        {
            state.props = props;
        }
    }

    /// Remove a root boundary.
    pub fn remove_root(&mut self, node: NodeId) {
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.root = None;
        }
        if self.auto_root_node == Some(node) {
            self.auto_root_node = None;
        }
        self.reg.prune(node);
    }

    /// Register a deloser on a node.
    pub fn add_deloser(&mut self, node: NodeId, props: DeloserProps) {
        if self.disposed || self.reg.deloser(node).is_some() {
            return;
        }
        self.reg.tag_entry(node).deloser = Some(DeloserState::new(props));
    }

    /// Update a deloser's configuration, keeping its history.
    pub fn set_deloser_props(&mut self, node: NodeId, props: DeloserProps) {
        if let Some(state) = self.reg.deloser_mut(node) {
            state.props = props;
        }
    }

    /// Remove a deloser, flattening it out of the shared history.
    pub fn remove_deloser(&mut self, node: NodeId) {
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.deloser = None;
        }
        self.history.remove_deloser(node);
        if self.current_deloser == Some(node) {
            self.current_deloser = None;
        }
        if self.auto_deloser_node == Some(node) {
            self.auto_deloser_node = None;
        }
        if let Some(point) = self.restore_from
            && point.deloser == Some(node)
        {
            self.restore_from = Some(RestorePoint {
                deloser: None,
                lost: point.lost,
            });
        }
        self.reg.prune(node);
    }

    /// Register a mover on a container node.
    pub fn add_mover(&mut self, node: NodeId, props: MoverProps) {
        if self.disposed || self.reg.mover(node).is_some() {
            return;
        }
        self.reg.tag_entry(node).mover = Some(MoverState::new(props));
    }

    /// Update a mover's configuration, keeping its runtime state.
    pub fn set_mover_props(&mut self, node: NodeId, props: MoverProps) {
        if let Some(state) = self.reg.mover_mut(node) {
            state.props = props;
        }
    }

    /// Remove a mover, canceling its pending debounces.
    pub fn remove_mover(&mut self, node: NodeId) {
        let jobs = self.reg.mover_mut(node).map(|s| (s.update_job.take(), s.scroll_job.take()));
        if let Some((update, scroll)) = jobs {
            if let Some(h) = update {
                self.sched.cancel(h);
            }
            if let Some(h) = scroll {
                self.sched.cancel(h);
            }
        }
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.mover = None;
        }
        self.reg.prune(node);
    }

    /// Register a groupper on a container node.
    pub fn add_groupper(&mut self, node: NodeId, props: GroupperProps) {
        if self.disposed || self.reg.groupper(node).is_some() {
            return;
        }
        self.reg.tag_entry(node).groupper = Some(GroupperState::new(props));
    }

    /// Update a groupper's configuration, keeping its entered state.
    pub fn set_groupper_props(&mut self, node: NodeId, props: GroupperProps) {
        if let Some(state) = self.reg.groupper_mut(node) {
            state.props = props;
        }
    }

    /// Remove a groupper.
    pub fn remove_groupper(&mut self, node: NodeId) {
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.groupper = None;
        }
        self.reg.prune(node);
    }

    /// Register a modalizer on a container node.
    pub fn add_modalizer(&mut self, node: NodeId, props: ModalizerProps) {
        if self.disposed || self.reg.modalizer(node).is_some() {
            return;
        }
        let uid = self.reg.next_uid();
        self.reg.tag_entry(node).modalizer = Some(ModalizerState::new(uid, props));
    }

    /// Update a modalizer's configuration.
    pub fn set_modalizer_props(&mut self, node: NodeId, props: ModalizerProps) {
        if let Some(tag) = self.reg.tag_mut(node)
            && let Some(state) = tag.modalizer.as_mut()
        {
            state.props = props;
        }
    }

    /// Remove a modalizer, deactivating it if it is the active region.
    pub fn remove_modalizer(&mut self, node: NodeId) {
        if self.active_modalizer == Some(node) {
            self.active_modalizer = None;
            self.events.push_back(FocusEvent::ModalizerInactive { modalizer: node });
        }
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.modalizer = None;
        }
        self.reg.prune(node);
    }

    /// Mark a subtree as excluded from managed Tab handling.
    pub fn add_uncontrolled(&mut self, node: NodeId) {
        if self.disposed {
            return;
        }
        self.reg.tag_entry(node).uncontrolled = true;
    }

    /// Remove the uncontrolled marker.
    pub fn remove_uncontrolled(&mut self, node: NodeId) {
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.uncontrolled = false;
        }
        self.reg.prune(node);
    }

    /// Attach focusable properties to a node.
    pub fn set_focusable_props(&mut self, node: NodeId, props: FocusableProps) {
        if self.disposed {
            return;
        }
        self.reg.tag_entry(node).focusable = Some(props);
    }

    /// Remove a node's focusable properties.
    pub fn remove_focusable_props(&mut self, node: NodeId) {
        if let Some(tag) = self.reg.tag_mut(node) {
            tag.focusable = None;
        }
        self.reg.prune(node);
    }

    /// Bind a stable marker to a node for re-identification across
    /// rebuilds.
    pub fn set_marker(&mut self, node: NodeId, marker: Marker) {
        if self.disposed {
            return;
        }
        self.reg.set_marker(node, marker);
    }

    /// Remove a node's marker binding.
    pub fn clear_marker(&mut self, node: NodeId) {
        self.reg.clear_marker(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use trellis_tree::{LocalNode, NodeFlags, Tree};

    fn focusable() -> LocalNode {
        LocalNode {
            flags: NodeFlags::VISIBLE | NodeFlags::FOCUSABLE,
            ..LocalNode::default()
        }
    }

    fn tab() -> KeyInput {
        KeyInput::new(Key::Tab)
    }

    fn shift_tab() -> KeyInput {
        KeyInput::shifted(Key::Tab)
    }

    /// Root with buttons [1,2,3,4]: tabbing visits them in order, then
    /// leaves the root.
    #[test]
    fn scenario_a_tab_sequence_then_leave() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let buttons: Vec<NodeId> = (0..4).map(|_| tree.insert(Some(root), focusable())).collect();

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());

        // The first Tab enters the root natively; the host reports it.
        eng.on_external_focus(&tree, Some(buttons[0]), 0);
        assert_eq!(eng.focused(), Some(buttons[0]));

        assert_eq!(eng.handle_key(&tree, tab(), 1), KeyOutcome::Focused(buttons[1]));
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::Focused(buttons[2]));
        assert_eq!(eng.handle_key(&tree, tab(), 3), KeyOutcome::Focused(buttons[3]));

        // Past the last button, focus leaves the root.
        assert_eq!(eng.handle_key(&tree, tab(), 4), KeyOutcome::LeftRoot);
        assert_eq!(eng.focused(), None);

        let events = eng.drain_events();
        assert!(events.contains(&FocusEvent::RootBlur { root }));
    }

    /// Root+deloser over buttons [1,2,3,4]: removing the focused button 2
    /// restores focus to the node now occupying its position, button 3.
    #[test]
    fn scenario_b_deloser_restores_structural_successor() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let buttons: Vec<NodeId> = (0..4).map(|_| tree.insert(Some(root), focusable())).collect();

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_deloser(root, DeloserProps::default());

        assert!(eng.focus(&tree, buttons[1], 0));

        tree.remove(buttons[1]);
        eng.on_node_removed(&tree, buttons[1], 10);
        assert_eq!(eng.focused(), None);
        assert!(
            eng.drain_events()
                .contains(&FocusEvent::DeloserFocusLost { node: buttons[1] })
        );

        // Within the settle delay nothing happens yet.
        eng.tick(&tree, 50);
        assert_eq!(eng.focused(), None);

        eng.tick(&tree, 110);
        assert_eq!(eng.focused(), Some(buttons[2]));
    }

    /// Cyclic vertical mover over items [1..4]: Up from the first wraps to
    /// the last.
    #[test]
    fn scenario_c_cyclic_mover_wraps_backward() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let mover = tree.insert(Some(root), LocalNode::default());
        let items: Vec<NodeId> = (0..4).map(|_| tree.insert(Some(mover), focusable())).collect();

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_mover(
            mover,
            MoverProps {
                direction: MoverDirection::Vertical,
                cyclic: true,
                ..MoverProps::default()
            },
        );

        assert!(eng.focus(&tree, items[0], 0));
        assert_eq!(
            eng.handle_key(&tree, KeyInput::new(Key::Up), 1),
            KeyOutcome::Focused(items[3])
        );
    }

    /// Trap groupper wrapping [Foo, Bar]: Enter dives in, Tab wraps inside
    /// without escaping.
    #[test]
    fn scenario_d_trap_groupper_wraps_tab() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let group = tree.insert(Some(root), focusable());
        let foo = tree.insert(Some(group), focusable());
        let bar = tree.insert(Some(group), focusable());
        let outside = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_groupper(
            group,
            GroupperProps {
                tabbability: GroupperTabbability::LimitedTrapFocus,
            },
        );

        assert!(eng.focus(&tree, group, 0));
        assert_eq!(
            eng.handle_key(&tree, KeyInput::new(Key::Enter), 1),
            KeyOutcome::Focused(foo)
        );
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::Focused(bar));
        // Wrapped back inside the trap instead of reaching `outside`.
        assert_eq!(eng.handle_key(&tree, tab(), 3), KeyOutcome::Focused(foo));
        assert_eq!(eng.handle_key(&tree, shift_tab(), 4), KeyOutcome::Focused(bar));
        assert_ne!(eng.focused(), Some(outside));

        // Escape collapses the group and refocuses the container.
        assert_eq!(
            eng.handle_key(&tree, KeyInput::new(Key::Esc), 5),
            KeyOutcome::Focused(group)
        );
        // Tab now treats the group as a single stop.
        assert_eq!(eng.handle_key(&tree, tab(), 6), KeyOutcome::Focused(outside));
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let mover = tree.insert(Some(root), LocalNode::default());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_mover(
            mover,
            MoverProps {
                cyclic: true,
                ..MoverProps::default()
            },
        );
        // The second registration is ignored entirely.
        eng.add_mover(
            mover,
            MoverProps {
                cyclic: false,
                ..MoverProps::default()
            },
        );
        assert!(eng.reg.mover(mover).is_some_and(|s| s.props.cyclic));
    }

    #[test]
    fn tab_from_last_mover_item_escapes_non_cyclic_container() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let mover = tree.insert(Some(root), LocalNode::default());
        let a = tree.insert(Some(mover), focusable());
        let b = tree.insert(Some(mover), focusable());
        let outside = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_mover(mover, MoverProps::default());

        assert!(eng.focus(&tree, a, 0));
        assert_eq!(eng.handle_key(&tree, tab(), 1), KeyOutcome::Focused(b));
        // Structural navigation crosses the mover boundary.
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::Focused(outside));
    }

    #[test]
    fn arrows_never_escape_a_mover() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let mover = tree.insert(Some(root), LocalNode::default());
        let a = tree.insert(Some(mover), focusable());
        let _outside = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_mover(mover, MoverProps::default());

        assert!(eng.focus(&tree, a, 0));
        // Down at the edge of a non-cyclic mover consumes the key.
        assert_eq!(eng.handle_key(&tree, KeyInput::new(Key::Down), 1), KeyOutcome::Handled);
        assert_eq!(eng.focused(), Some(a));
    }

    #[test]
    fn marker_fallback_restores_rebuilt_node() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let item = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_deloser(root, DeloserProps::default());
        eng.set_marker(item, Marker(42));

        assert!(eng.focus(&tree, item, 0));

        // The host rebuilds the node: removal plus a re-registered marker.
        tree.remove(item);
        eng.on_node_removed(&tree, item, 10);
        let rebuilt = tree.insert(Some(root), focusable());
        eng.set_marker(rebuilt, Marker(42));

        eng.tick(&tree, 120);
        assert_eq!(eng.focused(), Some(rebuilt));
    }

    #[test]
    fn restore_falls_back_to_root_scan_and_force_focus() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let pane = tree.insert(Some(root), LocalNode::default());
        let item = tree.insert(Some(pane), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_deloser(pane, DeloserProps::default());

        assert!(eng.focus(&tree, item, 0));
        tree.remove(item);
        eng.on_node_removed(&tree, item, 10);
        eng.tick(&tree, 120);

        // No focusable candidate exists anywhere, so the deloser container
        // itself is force-focused: focus is never left nowhere.
        assert_eq!(eng.focused(), Some(pane));
    }

    #[test]
    fn intervening_focus_cancels_restore() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), focusable());
        let b = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_deloser(root, DeloserProps::default());

        assert!(eng.focus(&tree, a, 0));
        tree.remove(a);
        eng.on_node_removed(&tree, a, 10);

        // The user focuses something before the settle delay elapses.
        assert!(eng.focus(&tree, b, 50));
        eng.tick(&tree, 200);
        assert_eq!(eng.focused(), Some(b), "restore was canceled");
    }

    #[test]
    fn modalizer_confines_structural_navigation() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let outside = tree.insert(Some(root), focusable());
        let dialog = tree.insert(Some(root), LocalNode::default());
        let ok = tree.insert(Some(dialog), focusable());
        let cancel = tree.insert(Some(dialog), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_modalizer(dialog, ModalizerProps::default());

        // Focusing into the dialog activates its region.
        assert!(eng.focus(&tree, ok, 0));
        assert!(eng.drain_events().contains(&FocusEvent::ModalizerActive { modalizer: dialog }));

        assert_eq!(eng.handle_key(&tree, tab(), 1), KeyOutcome::Focused(cancel));
        // `outside` is not reachable while the region is active.
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::LeftRoot);

        // Focusing outside deactivates the region.
        eng.on_external_focus(&tree, Some(outside), 3);
        assert!(
            eng.drain_events()
                .contains(&FocusEvent::ModalizerInactive { modalizer: dialog })
        );
    }

    #[test]
    fn limited_groupper_is_single_stop_until_entered() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let before = tree.insert(Some(root), focusable());
        let group = tree.insert(Some(root), focusable());
        let inner = tree.insert(Some(group), focusable());
        let after = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_groupper(
            group,
            GroupperProps {
                tabbability: GroupperTabbability::Limited,
            },
        );

        assert!(eng.focus(&tree, before, 0));
        assert_eq!(eng.handle_key(&tree, tab(), 1), KeyOutcome::Focused(group));
        // Tab skips the group's interior entirely.
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::Focused(after));

        // After Enter, the interior is tabbable (and Tab escapes at the
        // end because this group does not trap).
        assert!(eng.focus(&tree, group, 3));
        assert_eq!(
            eng.handle_key(&tree, KeyInput::new(Key::Enter), 4),
            KeyOutcome::Focused(inner)
        );
        assert_eq!(eng.handle_key(&tree, tab(), 5), KeyOutcome::Focused(after));
    }

    #[test]
    fn groupper_activity_is_tri_state() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let outer = tree.insert(Some(root), focusable());
        let inner = tree.insert(Some(outer), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_groupper(
            outer,
            GroupperProps {
                tabbability: GroupperTabbability::Limited,
            },
        );
        eng.add_groupper(
            inner,
            GroupperProps {
                tabbability: GroupperTabbability::Limited,
            },
        );

        // The inner group is unreachable while the outer one is inactive.
        assert_eq!(eng.groupper_is_active(&tree, inner), None);
        assert_eq!(eng.groupper_is_active(&tree, outer), Some(false));

        assert!(eng.focus(&tree, outer, 0));
        assert_eq!(eng.handle_key(&tree, KeyInput::new(Key::Enter), 1), KeyOutcome::Focused(inner));
        assert_eq!(eng.groupper_is_active(&tree, inner), Some(false));
    }

    #[test]
    fn memorized_mover_child_is_the_tab_entry() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let before = tree.insert(Some(root), focusable());
        let mover = tree.insert(Some(root), LocalNode::default());
        let a = tree.insert(Some(mover), focusable());
        let b = tree.insert(Some(mover), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_mover(
            mover,
            MoverProps {
                memorize_current: true,
                ..MoverProps::default()
            },
        );

        // Visit `b`, then leave the mover.
        assert!(eng.focus(&tree, b, 0));
        assert!(eng.focus(&tree, before, 1));

        // Tab re-enters at the memorized child, not at `a`.
        assert_eq!(eng.handle_key(&tree, tab(), 2), KeyOutcome::Focused(b));
        let _ = a;
    }

    #[test]
    fn keyboard_navigation_state_tracks_input_kind() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), focusable());
        let b = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());

        assert!(eng.focus(&tree, a, 0));
        assert!(!eng.keyboard_navigation());
        assert_eq!(eng.handle_key(&tree, tab(), 1), KeyOutcome::Focused(b));
        assert!(eng.keyboard_navigation());
        eng.on_external_focus(&tree, Some(a), 2);
        assert!(!eng.keyboard_navigation());
    }

    #[test]
    fn auto_root_is_instantiated_lazily_and_once() {
        let mut tree = Tree::new();
        let top = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(top), focusable());
        let b = tree.insert(Some(top), focusable());

        let mut eng = Engine::new(EngineOptions {
            auto_root: Some(RootProps::default()),
            ..EngineOptions::default()
        });

        assert!(eng.focus(&tree, a, 0));
        let ctx = eng.context(&tree, a).expect("auto-root provides a context");
        assert_eq!(ctx.root, top);

        // A second focus reuses the same singleton root.
        assert!(eng.focus(&tree, b, 1));
        assert_eq!(eng.context(&tree, b).expect("still rooted").root, top);
    }

    #[test]
    fn without_root_focus_is_refused() {
        let mut tree = Tree::new();
        let top = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(top), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        assert!(!eng.focus(&tree, a, 0), "the feature set is opt-in per subtree");
    }

    #[test]
    fn dispose_is_idempotent_and_quiesces_everything() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());
        eng.add_deloser(root, DeloserProps::default());
        assert!(eng.focus(&tree, a, 0));
        tree.remove(a);
        eng.on_node_removed(&tree, a, 10);

        eng.dispose();
        eng.dispose();
        assert_eq!(eng.next_wakeup(), None, "no dangling timers after dispose");
        eng.tick(&tree, 1_000);
        assert_eq!(eng.focused(), None);
        assert!(!eng.focus(&tree, root, 1_001));
    }

    #[test]
    fn sweep_detects_silent_removals() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), focusable());
        let b = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions {
            sweep_interval: Some(500),
            ..EngineOptions::default()
        });
        eng.add_root(root, RootProps::default());
        eng.add_deloser(root, DeloserProps::default());

        assert!(eng.focus(&tree, a, 0));
        // The host removes the node without reporting it.
        tree.remove(a);

        // The periodic sweep notices, funnels into the cascade, and the
        // restore lands on the remaining focusable.
        eng.tick(&tree, 600);
        eng.tick(&tree, 800);
        assert_eq!(eng.focused(), Some(b));
    }

    #[test]
    fn events_are_emitted_in_publisher_order() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), focusable());
        let b = tree.insert(Some(root), focusable());

        let mut eng = Engine::new(EngineOptions::default());
        eng.add_root(root, RootProps::default());

        assert!(eng.focus(&tree, a, 0));
        assert_eq!(
            eng.drain_events(),
            vec![
                FocusEvent::RootFocus { root },
                FocusEvent::FocusIn { node: a },
            ]
        );

        assert!(eng.focus(&tree, b, 1));
        assert_eq!(
            eng.drain_events(),
            vec![
                FocusEvent::FocusOut { node: a },
                FocusEvent::FocusIn { node: b },
            ]
        );
    }
}
