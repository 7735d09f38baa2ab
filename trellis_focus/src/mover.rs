// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mover: arrow-key and paging navigation over a container's focusables.
//!
//! A mover owns the arrow keys inside its subtree: Up/Down/Left/Right step
//! to the next or previous focusable strictly inside the mover (wrapping
//! when cyclic), Home/End jump to the edges, and PageUp/PageDown step while
//! the candidate stays visible in its scroll viewport, then report a scroll
//! intent for the landing element. Grid mode picks the geometrically
//! nearest element in the adjacent row or column, preferring minimal
//! lateral deviation and breaking ties by traversal order.
//!
//! Arrow keys never escape an inner mover into an outer one; only Tab
//! crosses the boundary.
//!
//! Movers optionally track per-child visibility (recomputed on a short
//! debounce after ancestor scrolls, and immediately after subtree changes)
//! and memorize their current child so that Tab re-entry lands where the
//! user left off.

use hashbrown::HashMap;
use trellis_tree::{NodeId, TreeNav};

use crate::events::FocusEvent;
use crate::focusable::{is_focusable, visibility_class};
use crate::locator::{Boundary, BoundaryAccept, FindProps, Locator, NextTabbable};
use crate::types::{Key, KeyInput, KeyOutcome, Visibility};
use crate::{Engine, Job, context};

/// Navigation axis of a mover.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MoverDirection {
    /// Up/Left step backward, Down/Right step forward.
    #[default]
    Both,
    /// Only Up/Down are handled.
    Vertical,
    /// Only Left/Right are handled.
    Horizontal,
    /// Arrows move geometrically between rows and columns.
    Grid,
}

/// Configuration of a mover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoverProps {
    /// Navigation axis.
    pub direction: MoverDirection,
    /// Wrap from the last element to the first and vice versa.
    pub cyclic: bool,
    /// Remember the current child and land on it when Tab re-enters the
    /// mover from outside.
    pub memorize_current: bool,
    /// Track per-child visibility classes.
    pub track_visibility: bool,
    /// When entering from outside, only children at least this visible are
    /// acceptable.
    pub visibility_aware: Option<Visibility>,
    /// Do not handle Home/End.
    pub disable_home_end_keys: bool,
}

impl Default for MoverProps {
    fn default() -> Self {
        Self {
            direction: MoverDirection::default(),
            cyclic: false,
            memorize_current: false,
            track_visibility: false,
            visibility_aware: None,
            disable_home_end_keys: false,
        }
    }
}

/// Runtime state of a mover container.
#[derive(Debug)]
pub(crate) struct MoverState {
    pub(crate) props: MoverProps,
    /// The child focus most recently rested on.
    pub(crate) current: Option<NodeId>,
    /// The child focus rested on before that.
    pub(crate) previous: Option<NodeId>,
    /// Tracked visibility class per child (when `track_visibility`).
    pub(crate) visibilities: HashMap<NodeId, Visibility>,
    /// Pending debounced children recompute.
    pub(crate) update_job: Option<trellis_schedule::JobHandle>,
    /// Pending debounced visibility recompute.
    pub(crate) scroll_job: Option<trellis_schedule::JobHandle>,
}

impl MoverState {
    pub(crate) fn new(props: MoverProps) -> Self {
        Self {
            props,
            current: None,
            previous: None,
            visibilities: HashMap::new(),
            update_job: None,
            scroll_job: None,
        }
    }
}

/// Boundary view of a mover for the locator and Tab navigation.
pub(crate) struct MoverBoundary<'r> {
    node: NodeId,
    state: &'r MoverState,
}

impl core::fmt::Debug for MoverBoundary<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MoverBoundary")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl<'r> MoverBoundary<'r> {
    pub(crate) fn new(node: NodeId, state: &'r MoverState) -> Self {
        Self { node, state }
    }
}

impl Boundary for MoverBoundary<'_> {
    fn accept_element<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        el: NodeId,
        from: Option<NodeId>,
    ) -> BoundaryAccept {
        // Searches from inside the mover are unrestricted.
        if from.is_some_and(|f| f != self.node && loc.tree.contains(self.node, f)) {
            return BoundaryAccept::Allow;
        }
        // Entering from outside: a memorized current child is the only
        // landing point while it remains valid.
        if self.state.props.memorize_current
            && let Some(current) = self.state.current
            && loc.tree.contains(self.node, current)
            && is_focusable(loc.tree, loc.reg, current, false)
        {
            return if el == current {
                BoundaryAccept::Allow
            } else {
                BoundaryAccept::Deny
            };
        }
        if let Some(min) = self.state.props.visibility_aware {
            return if visibility_class(loc.tree, el) >= min {
                BoundaryAccept::Allow
            } else {
                BoundaryAccept::Deny
            };
        }
        BoundaryAccept::Allow
    }

    fn find_next_tabbable<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        from: NodeId,
        backward: bool,
    ) -> NextTabbable {
        // Movers customize arrows, not Tab: continue in document order and
        // hand over to the outer scope at the edge.
        let props = FindProps {
            from: Some(from),
            ..FindProps::after(self.node, from)
        };
        let within = if backward {
            loc.find_prev(&props)
        } else {
            loc.find_next(&props)
        };
        match within {
            Some(r) => NextTabbable::Found(r),
            None => NextTabbable::Escape,
        }
    }
}

/// Geometric direction after RTL normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GridDir {
    Up,
    Down,
    Left,
    Right,
}

/// Nearest candidate in the adjacent row/column: forward along the primary
/// axis, scored by primary advance plus a lateral-deviation penalty, ties
/// broken by traversal order.
fn grid_target<T: TreeNav>(
    loc: &Locator<'_, T>,
    mover: NodeId,
    focused: NodeId,
    dir: GridDir,
) -> Option<NodeId> {
    let all = loc.find_all(&FindProps {
        from: Some(focused),
        ..FindProps::in_container(mover)
    });
    let oc = loc.tree.bounds(focused)?.center();

    let mut best: Option<(f64, NodeId)> = None;
    for &cand in &all {
        if cand == focused {
            continue;
        }
        let Some(bounds) = loc.tree.bounds(cand) else {
            continue;
        };
        let cc = bounds.center();
        let dx = cc.x - oc.x;
        let dy = cc.y - oc.y;
        let (primary, secondary, forward_sign) = match dir {
            GridDir::Right => (dx, dy, 1.0),
            GridDir::Left => (dx, dy, -1.0),
            GridDir::Down => (dy, dx, 1.0),
            GridDir::Up => (dy, dx, -1.0),
        };
        // Restrict to the forward hemiplane.
        if forward_sign * primary <= 0.0 {
            continue;
        }
        // Favor closer candidates and penalize off-axis motion.
        let score = primary.abs() + 4.0 * secondary.abs();
        if !score.is_finite() {
            continue;
        }
        // Strict comparison keeps the earliest candidate on equal scores.
        if best.is_none_or(|(b, _)| score < b) {
            best = Some((score, cand));
        }
    }
    best.map(|(_, id)| id)
}

/// Step while the candidate stays visible in its scroll viewport; the last
/// visible candidate is the paging target.
fn page_target<T: TreeNav>(
    loc: &Locator<'_, T>,
    mover: NodeId,
    focused: NodeId,
    backward: bool,
) -> Option<NodeId> {
    let mut last_visible = None;
    let mut cur = focused;
    loop {
        let props = FindProps {
            from: Some(focused),
            ..FindProps::after(mover, cur)
        };
        let next = if backward {
            loc.find_prev(&props)
        } else {
            loc.find_next(&props)
        };
        let Some(r) = next else {
            break;
        };
        if visibility_class(loc.tree, r.node) == Visibility::Invisible {
            break;
        }
        last_visible = Some(r.node);
        cur = r.node;
    }
    last_visible
}

impl Engine {
    /// Arrow/Home/End/Page navigation inside the nearest enclosing mover.
    pub(crate) fn mover_key<T: TreeNav>(
        &mut self,
        tree: &T,
        input: KeyInput,
        now: u64,
    ) -> KeyOutcome {
        let Some(focused) = self.focused else {
            return KeyOutcome::NotHandled;
        };
        let Some(ctx) = context::resolve(tree, &self.reg, focused) else {
            return KeyOutcome::NotHandled;
        };
        let Some(mover) = ctx.mover else {
            return KeyOutcome::NotHandled;
        };
        let Some(state) = self.reg.mover(mover) else {
            return KeyOutcome::NotHandled;
        };
        let props = state.props;

        enum Act {
            Next,
            Prev,
            First,
            Last,
            Page { backward: bool },
            Grid(GridDir),
        }

        let act = match (input.key, props.direction) {
            (Key::Up, MoverDirection::Vertical | MoverDirection::Both) => Act::Prev,
            (Key::Down, MoverDirection::Vertical | MoverDirection::Both) => Act::Next,
            (Key::Left, MoverDirection::Horizontal | MoverDirection::Both) => {
                if ctx.rtl { Act::Next } else { Act::Prev }
            }
            (Key::Right, MoverDirection::Horizontal | MoverDirection::Both) => {
                if ctx.rtl { Act::Prev } else { Act::Next }
            }
            (Key::Up, MoverDirection::Grid) => Act::Grid(GridDir::Up),
            (Key::Down, MoverDirection::Grid) => Act::Grid(GridDir::Down),
            (Key::Left, MoverDirection::Grid) => {
                Act::Grid(if ctx.rtl { GridDir::Right } else { GridDir::Left })
            }
            (Key::Right, MoverDirection::Grid) => {
                Act::Grid(if ctx.rtl { GridDir::Left } else { GridDir::Right })
            }
            (Key::Home, _) if !props.disable_home_end_keys => Act::First,
            (Key::End, _) if !props.disable_home_end_keys => Act::Last,
            (Key::PageUp, _) => Act::Page { backward: true },
            (Key::PageDown, _) => Act::Page { backward: false },
            _ => return KeyOutcome::NotHandled,
        };

        let mut scroll_into_view = false;
        let target = {
            let loc = self.locator(tree);
            let step = FindProps {
                from: Some(focused),
                ..FindProps::after(mover, focused)
            };
            let whole = FindProps {
                from: Some(focused),
                ..FindProps::in_container(mover)
            };
            match act {
                Act::Next => loc
                    .find_next(&step)
                    .map(|r| r.node)
                    .or_else(|| props.cyclic.then(|| loc.find_first(&whole)).flatten()),
                Act::Prev => loc
                    .find_prev(&step)
                    .map(|r| r.node)
                    .or_else(|| props.cyclic.then(|| loc.find_last(&whole)).flatten()),
                Act::First => loc.find_first(&whole),
                Act::Last => loc.find_last(&whole),
                Act::Page { backward } => {
                    scroll_into_view = true;
                    page_target(&loc, mover, focused, backward)
                }
                Act::Grid(dir) => grid_target(&loc, mover, focused, dir),
            }
        };

        match target {
            Some(t) if t != focused => {
                self.set_focus(tree, Some(t), now, false);
                if scroll_into_view {
                    self.events.push_back(FocusEvent::ScrollIntoView { node: t });
                }
                KeyOutcome::Focused(t)
            }
            // An edge without wrap, or paging with nowhere to go: the key
            // is consumed, arrows never escape the mover.
            _ => KeyOutcome::Handled,
        }
    }

    /// Focus-change notification: the nearest mover adopts the new focus as
    /// its current child.
    pub(crate) fn mover_on_focus<T: TreeNav>(&mut self, tree: &T, new: Option<NodeId>) {
        let Some(new) = new else {
            return;
        };
        let Some(ctx) = context::resolve(tree, &self.reg, new) else {
            return;
        };
        let Some(mover) = ctx.mover else {
            return;
        };
        if mover == new {
            return;
        }
        let Some(state) = self.reg.mover_mut(mover) else {
            return;
        };
        if state.current != Some(new) {
            state.previous = state.current;
            state.current = Some(new);
            self.events.push_back(FocusEvent::MoverStateChanged {
                mover,
                current: Some(new),
            });
        }
    }

    /// Debounced (zero-delay) recompute of tracked children after a
    /// subtree change.
    pub(crate) fn mover_schedule_update(&mut self, mover: NodeId, now: u64) {
        if let Some(h) = self.reg.mover_mut(mover).and_then(|s| s.update_job.take()) {
            self.sched.cancel(h);
        }
        let handle = self.sched.schedule(now, 0, Job::MoverUpdate(mover));
        if let Some(state) = self.reg.mover_mut(mover) {
            state.update_job = Some(handle);
        }
    }

    /// Debounced visibility recompute after an ancestor scroll.
    pub(crate) fn mover_schedule_visibility(&mut self, mover: NodeId, now: u64) {
        if let Some(h) = self.reg.mover_mut(mover).and_then(|s| s.scroll_job.take()) {
            self.sched.cancel(h);
        }
        let delay = self.options.scroll_debounce;
        let handle = self.sched.schedule(now, delay, Job::MoverVisibility(mover));
        if let Some(state) = self.reg.mover_mut(mover) {
            state.scroll_job = Some(handle);
        }
    }

    pub(crate) fn run_mover_update<T: TreeNav>(&mut self, tree: &T, mover: NodeId) {
        if self.reg.mover(mover).is_none() {
            return;
        }
        let alive = tree.is_alive(mover);
        let track = self.reg.mover(mover).is_some_and(|s| s.props.track_visibility);
        let fresh = if alive && track {
            Some(self.classify_children(tree, mover))
        } else {
            None
        };

        let Some(state) = self.reg.mover_mut(mover) else {
            return;
        };
        state.update_job = None;
        let mut changed = false;
        if state.current.is_some_and(|c| !tree.is_alive(c)) {
            state.current = None;
            changed = true;
        }
        if state.previous.is_some_and(|p| !tree.is_alive(p)) {
            state.previous = None;
        }
        if let Some(fresh) = fresh
            && state.visibilities != fresh
        {
            state.visibilities = fresh;
            changed = true;
        }
        if changed {
            let current = state.current;
            self.events
                .push_back(FocusEvent::MoverStateChanged { mover, current });
        }
    }

    pub(crate) fn run_mover_visibility<T: TreeNav>(&mut self, tree: &T, mover: NodeId) {
        if self.reg.mover(mover).is_none() || !tree.is_alive(mover) {
            return;
        }
        let fresh = self.classify_children(tree, mover);
        let Some(state) = self.reg.mover_mut(mover) else {
            return;
        };
        state.scroll_job = None;
        if state.visibilities != fresh {
            state.visibilities = fresh;
            let current = state.current;
            self.events
                .push_back(FocusEvent::MoverStateChanged { mover, current });
        }
    }

    fn classify_children<T: TreeNav>(&self, tree: &T, mover: NodeId) -> HashMap<NodeId, Visibility> {
        let loc = self.locator(tree);
        loc.find_all(&FindProps::in_container(mover))
            .into_iter()
            .map(|id| (id, visibility_class(tree, id)))
            .collect()
    }
}
