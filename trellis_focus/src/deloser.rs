// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deloser: focus-loss history and restoration.
//!
//! Every successful focus change is recorded by the nearest enclosing
//! deloser (or the implicit auto-deloser): the element is unshifted onto
//! the deloser's current history snapshot, and the deloser moves to the
//! front of its root's history bucket. When focus becomes empty, a restore
//! is armed after a short settle delay (canceled by any intervening focus)
//! and runs a cascade where the first success wins:
//!
//! 1. the deloser's caller-supplied loss handler;
//! 2. the deloser's own strategies, ordered by the configured restore
//!    order: replay history (validating liveness, with marker-based
//!    reconstruction for rebuilt nodes), find-default, find-first;
//! 3. the global history, most recently focused first, across all
//!    delosers, skipping entries already tried;
//! 4. force-focusing a deloser container, so focus is never left nowhere
//!    while any deloser is registered.
//!
//! History is bounded: at most ten snapshots per deloser (one per
//! modalizer context), ten entries per snapshot, ten root buckets, and ten
//! delosers per bucket, all most-recently-used first and deduplicated.

use alloc::vec::Vec;
use hashbrown::HashSet;
use smallvec::SmallVec;
use trellis_tree::{NodeId, TreeNav};

use crate::events::FocusEvent;
use crate::focusable::is_focusable;
use crate::locator::FindProps;
use crate::types::{Marker, RestoreFocusOrder};
use crate::{Engine, Job, context};

/// Upper bound for every history dimension.
pub(crate) const MAX_HISTORY: usize = 10;

/// Configuration of a deloser.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeloserProps {
    /// Restore strategy order; falls back to the enclosing root's
    /// configuration when absent.
    pub restore_focus_order: Option<RestoreFocusOrder>,
    /// Caller-supplied loss handler, consulted before any built-in
    /// strategy. Receives the lost node and may name a replacement target.
    pub on_focus_lost: Option<fn(NodeId) -> Option<NodeId>>,
}

/// A recorded focus position: the node id, its stable marker, and its
/// structural position (parent + child index). When the id goes stale the
/// marker re-identifies an explicitly rebuilt node, and the structural
/// position re-identifies whichever node now occupies the recorded slot,
/// the moral equivalent of re-running a positional selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ElementRef {
    pub(crate) id: NodeId,
    pub(crate) marker: Option<Marker>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) index: usize,
}

/// One history snapshot, keyed by the modalizer context it was recorded
/// under (`0` for none).
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    pub(crate) modalizer_uid: u64,
    pub(crate) entries: SmallVec<[ElementRef; MAX_HISTORY]>,
}

/// Runtime state of a deloser container.
///
/// Delosers are identified by their container's generational [`NodeId`]
/// throughout the history; no separate instance id is needed.
#[derive(Clone, Debug)]
pub(crate) struct DeloserState {
    pub(crate) props: DeloserProps,
    /// Snapshots, most recently used first.
    pub(crate) snapshots: SmallVec<[Snapshot; 2]>,
}

impl DeloserState {
    pub(crate) fn new(props: DeloserProps) -> Self {
        Self {
            props,
            snapshots: SmallVec::new(),
        }
    }

    /// Unshift a focused element onto the snapshot for the given modalizer
    /// context, deduplicating and enforcing the history bounds.
    pub(crate) fn record(&mut self, element: ElementRef, modalizer_uid: u64) {
        let snapshot = match self
            .snapshots
            .iter()
            .position(|s| s.modalizer_uid == modalizer_uid)
        {
            Some(pos) => self.snapshots.remove(pos),
            None => Snapshot {
                modalizer_uid,
                entries: SmallVec::new(),
            },
        };
        self.snapshots.insert(0, snapshot);
        self.snapshots.truncate(MAX_HISTORY);

        let entries = &mut self.snapshots[0].entries;
        entries.retain(|e| e.id != element.id);
        entries.insert(0, element);
        entries.truncate(MAX_HISTORY);
    }
}

/// Per-root buckets of delosers, most recently focused first.
#[derive(Clone, Debug, Default)]
pub(crate) struct DeloserHistory {
    buckets: Vec<RootBucket>,
}

#[derive(Clone, Debug)]
struct RootBucket {
    root_uid: u64,
    delosers: Vec<NodeId>,
}

impl DeloserHistory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Move a deloser to the front of its root's bucket, and the bucket to
    /// the front of the list, enforcing the bounds.
    pub(crate) fn record(&mut self, root_uid: u64, deloser: NodeId) {
        let mut bucket = match self.buckets.iter().position(|b| b.root_uid == root_uid) {
            Some(pos) => self.buckets.remove(pos),
            None => RootBucket {
                root_uid,
                delosers: Vec::new(),
            },
        };
        bucket.delosers.retain(|&d| d != deloser);
        bucket.delosers.insert(0, deloser);
        bucket.delosers.truncate(MAX_HISTORY);
        self.buckets.insert(0, bucket);
        self.buckets.truncate(MAX_HISTORY);
    }

    /// Flatten a removed deloser out of every bucket referencing it.
    pub(crate) fn remove_deloser(&mut self, deloser: NodeId) {
        for bucket in &mut self.buckets {
            bucket.delosers.retain(|&d| d != deloser);
        }
        self.buckets.retain(|b| !b.delosers.is_empty());
    }

    /// All delosers, most recently focused first.
    pub(crate) fn iter_delosers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.buckets.iter().flat_map(|b| b.delosers.iter().copied())
    }

    pub(crate) fn retain_alive<T: TreeNav>(&mut self, tree: &T) {
        for bucket in &mut self.buckets {
            bucket.delosers.retain(|&d| tree.is_alive(d));
        }
        self.buckets.retain(|b| !b.delosers.is_empty());
    }
}

/// Where a scheduled restore starts from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RestorePoint {
    pub(crate) deloser: Option<NodeId>,
    pub(crate) lost: NodeId,
}

#[derive(Clone, Copy, Debug)]
enum Strategy {
    History,
    DeloserDefault,
    DeloserFirst,
    RootDefault,
    RootFirst,
}

fn strategy_sequence(order: RestoreFocusOrder) -> [Strategy; 5] {
    use Strategy::*;
    match order {
        RestoreFocusOrder::History => [History, DeloserDefault, DeloserFirst, RootDefault, RootFirst],
        RestoreFocusOrder::DeloserDefault => {
            [DeloserDefault, History, DeloserFirst, RootDefault, RootFirst]
        }
        RestoreFocusOrder::DeloserFirst => {
            [DeloserFirst, History, DeloserDefault, RootDefault, RootFirst]
        }
        RestoreFocusOrder::RootDefault => {
            [RootDefault, RootFirst, History, DeloserDefault, DeloserFirst]
        }
        RestoreFocusOrder::RootFirst => {
            [RootFirst, RootDefault, History, DeloserDefault, DeloserFirst]
        }
    }
}

impl Engine {
    /// Nearest enclosing deloser of a node, falling back to the implicit
    /// auto-deloser when configured.
    pub(crate) fn nearest_deloser<T: TreeNav>(&self, tree: &T, node: NodeId) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if self.reg.deloser(n).is_some() {
                return Some(n);
            }
            cur = tree.parent_of(n);
        }
        self.auto_deloser_node.filter(|&d| tree.is_alive(d))
    }

    /// Lazily register the implicit whole-boundary deloser over a root.
    pub(crate) fn ensure_auto_deloser<T: TreeNav>(&mut self, tree: &T, root: NodeId) {
        let Some(props) = self.options.auto_deloser else {
            return;
        };
        if self.auto_deloser_node.is_some_and(|d| tree.is_alive(d)) {
            return;
        }
        if self.reg.deloser(root).is_none() {
            self.reg.tag_entry(root).deloser = Some(DeloserState::new(props));
        }
        self.auto_deloser_node = Some(root);
    }

    /// Focus-change notification: record the element in the nearest
    /// deloser's history and move that deloser to the front of the global
    /// history.
    pub(crate) fn deloser_on_focus<T: TreeNav>(&mut self, tree: &T, node: NodeId) {
        let Some(ctx) = context::resolve(tree, &self.reg, node) else {
            self.current_deloser = None;
            return;
        };
        self.ensure_auto_deloser(tree, ctx.root);
        let Some(deloser) = self.nearest_deloser(tree, node) else {
            self.current_deloser = None;
            return;
        };
        let marker = self.reg.marker_of(node);
        let parent = tree.parent_of(node);
        let index = parent.map_or(0, |p| {
            tree.children_of(p).iter().position(|&c| c == node).unwrap_or(0)
        });
        let modalizer_uid = ctx
            .modalizer
            .and_then(|m| self.reg.modalizer(m))
            .map_or(0, |s| s.uid);
        let root_uid = self.reg.root(ctx.root).map_or(0, |r| r.uid);
        if let Some(state) = self.reg.deloser_mut(deloser) {
            state.record(
                ElementRef {
                    id: node,
                    marker,
                    parent,
                    index,
                },
                modalizer_uid,
            );
        }
        self.history.record(root_uid, deloser);
        self.current_deloser = Some(deloser);
    }

    /// Focus became empty because its element disappeared: arm the settle
    /// delay. Any intervening focus cancels the pending restore.
    pub(crate) fn deloser_on_focus_lost(&mut self, lost: NodeId, now: u64) {
        self.events.push_back(FocusEvent::DeloserFocusLost { node: lost });
        self.restore_from = Some(RestorePoint {
            deloser: self.current_deloser,
            lost,
        });
        if let Some(handle) = self.restore_job.take() {
            self.sched.cancel(handle);
        }
        let delay = self.options.restore_delay;
        self.restore_job = Some(self.sched.schedule(now, delay, Job::Restore));
    }

    /// The settle delay elapsed with focus still empty: run the cascade.
    pub(crate) fn run_restore<T: TreeNav>(&mut self, tree: &T, now: u64) {
        self.restore_job = None;
        if self.focused.is_some() {
            return;
        }
        let Some(point) = self.restore_from.take() else {
            return;
        };
        let mut tried: HashSet<NodeId> = HashSet::new();

        // 1. Caller-supplied loss handler.
        if let Some(deloser) = point.deloser
            && let Some(handler) = self.reg.deloser(deloser).and_then(|s| s.props.on_focus_lost)
            && let Some(target) = handler(point.lost)
            && is_focusable(tree, &self.reg, target, false)
            && self.set_focus(tree, Some(target), now, false)
        {
            return;
        }

        // 2. The active deloser's own strategies.
        if let Some(deloser) = point.deloser
            && tree.is_alive(deloser)
            && let Some(target) = self.find_available(tree, deloser, &mut tried)
            && self.set_focus(tree, Some(target), now, false)
        {
            return;
        }

        // 3. Global history, most recent first, skipping tried entries.
        let others: Vec<NodeId> = self.history.iter_delosers().collect();
        for deloser in others {
            if Some(deloser) == point.deloser || !tree.is_alive(deloser) {
                continue;
            }
            if let Some(target) = self.find_available(tree, deloser, &mut tried)
                && self.set_focus(tree, Some(target), now, false)
            {
                return;
            }
        }

        // 4. Last resort: force-focus a deloser's own container so focus
        // is never left nowhere while any deloser is registered.
        let fallbacks: Vec<NodeId> = point
            .deloser
            .into_iter()
            .chain(self.history.iter_delosers())
            .collect();
        for deloser in fallbacks {
            if tree.is_alive(deloser) && self.set_focus(tree, Some(deloser), now, true) {
                return;
            }
        }
    }

    /// Try the deloser's strategies in the configured order and return the
    /// first live candidate.
    pub(crate) fn find_available<T: TreeNav>(
        &self,
        tree: &T,
        deloser: NodeId,
        tried: &mut HashSet<NodeId>,
    ) -> Option<NodeId> {
        let root = context::resolve(tree, &self.reg, deloser)?.root;
        let order = self
            .reg
            .deloser(deloser)
            .and_then(|s| s.props.restore_focus_order)
            .or_else(|| self.reg.root(root).map(|r| r.props.restore_focus_order))
            .unwrap_or_default();

        let loc = self.locator(tree);
        for strategy in strategy_sequence(order) {
            let found = match strategy {
                Strategy::History => self.replay_history(tree, deloser, tried),
                Strategy::DeloserDefault => loc.find_default(&FindProps::in_container(deloser)),
                Strategy::DeloserFirst => loc.find_first(&FindProps::in_container(deloser)),
                Strategy::RootDefault => loc.find_default(&FindProps::in_container(root)),
                Strategy::RootFirst => loc.find_first(&FindProps::in_container(root)),
            };
            if let Some(target) = found {
                return Some(target);
            }
        }
        None
    }

    /// Replay recorded history: live entries first, then marker-based
    /// reconstruction for rebuilt nodes, then the node now occupying the
    /// recorded structural position.
    fn replay_history<T: TreeNav>(
        &self,
        tree: &T,
        deloser: NodeId,
        tried: &mut HashSet<NodeId>,
    ) -> Option<NodeId> {
        let state = self.reg.deloser(deloser)?;
        for snapshot in &state.snapshots {
            for entry in &snapshot.entries {
                if tried.insert(entry.id)
                    && tree.is_alive(entry.id)
                    && is_focusable(tree, &self.reg, entry.id, false)
                {
                    return Some(entry.id);
                }
                if let Some(marker) = entry.marker
                    && let Some(rebuilt) = self.reg.resolve_marker(marker)
                    && tried.insert(rebuilt)
                    && is_focusable(tree, &self.reg, rebuilt, false)
                {
                    return Some(rebuilt);
                }
                if let Some(parent) = entry.parent
                    && let Some(&slid) = tree.children_of(parent).get(entry.index)
                    && tree.contains(deloser, slid)
                    && tried.insert(slid)
                    && is_focusable(tree, &self.reg, slid, false)
                {
                    return Some(slid);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_tree::{LocalNode, Tree};

    fn refs(tree: &mut Tree, n: usize) -> Vec<ElementRef> {
        (0..n)
            .map(|_| ElementRef {
                id: tree.insert(None, LocalNode::default()),
                marker: None,
                parent: None,
                index: 0,
            })
            .collect()
    }

    #[test]
    fn record_is_mru_and_deduplicated() {
        let mut tree = Tree::new();
        let items = refs(&mut tree, 3);
        let mut state = DeloserState::new(DeloserProps::default());

        state.record(items[0], 0);
        state.record(items[1], 0);
        state.record(items[0], 0);

        let entries = &state.snapshots[0].entries;
        assert_eq!(entries.len(), 2, "duplicate was collapsed");
        assert_eq!(entries[0], items[0], "most recent first");
        assert_eq!(entries[1], items[1]);
    }

    #[test]
    fn history_bounds_are_enforced() {
        let mut tree = Tree::new();
        let items = refs(&mut tree, MAX_HISTORY + 5);
        let mut state = DeloserState::new(DeloserProps::default());

        for &item in &items {
            state.record(item, 0);
        }
        assert_eq!(state.snapshots[0].entries.len(), MAX_HISTORY);

        // One snapshot per modalizer context, also bounded.
        for uid in 0..(MAX_HISTORY as u64 + 5) {
            state.record(items[0], uid);
        }
        assert_eq!(state.snapshots.len(), MAX_HISTORY);
    }

    #[test]
    fn snapshots_rotate_by_modalizer_context() {
        let mut tree = Tree::new();
        let items = refs(&mut tree, 2);
        let mut state = DeloserState::new(DeloserProps::default());

        state.record(items[0], 0);
        state.record(items[1], 7);

        assert_eq!(state.snapshots.len(), 2);
        assert_eq!(state.snapshots[0].modalizer_uid, 7, "most recent context first");
        assert_eq!(state.snapshots[1].modalizer_uid, 0);

        // Returning to the old context moves its snapshot back to front.
        state.record(items[0], 0);
        assert_eq!(state.snapshots[0].modalizer_uid, 0);
    }

    #[test]
    fn global_history_buckets_are_mru_and_flattenable() {
        let mut tree = Tree::new();
        let d1 = tree.insert(None, LocalNode::default());
        let d2 = tree.insert(None, LocalNode::default());
        let d3 = tree.insert(None, LocalNode::default());

        let mut history = DeloserHistory::new();
        history.record(1, d1);
        history.record(1, d2);
        history.record(2, d3);
        history.record(1, d1);

        let order: Vec<NodeId> = history.iter_delosers().collect();
        assert_eq!(order, alloc::vec![d1, d2, d3]);

        history.remove_deloser(d1);
        history.remove_deloser(d2);
        let order: Vec<NodeId> = history.iter_delosers().collect();
        assert_eq!(order, alloc::vec![d3], "emptied buckets are dropped");
    }
}
