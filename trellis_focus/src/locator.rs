// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generic filtered tree search.
//!
//! Every directional focus query (find next/previous/first/last/default)
//! runs through one walk. For each visited node the walk:
//!
//! 1. skips the search container itself as a match;
//! 2. resolves the node's context, skipping entire subtrees that have none;
//! 3. accepts embedding and uncontrolled nodes unconditionally and treats
//!    them as atomic (their contents are foreign to the engine);
//! 4. rejects nodes failing the focusability predicate;
//! 5. delegates to every enclosing groupper/mover boundary between the node
//!    and the container, which may deny based on trap state, a memorized
//!    current child, or visibility requirements;
//! 6. otherwise applies the caller's predicate (default: focusability,
//!    which step 4 already established).
//!
//! Forward search steps in depth-first document order; backward search
//! starts from the container's last descendant and steps in reverse
//! document order, mirroring native reverse-tab semantics rather than
//! reusing a forward cursor.
//!
//! `find_first`/`find_last`/`find_default`/`find_all` additionally honor
//! explicit tab order keys: keyed nodes come first (ascending), unkeyed
//! nodes follow in document order.

use alloc::vec::Vec;

use trellis_tree::{NodeFlags, NodeId, TreeNav};

use crate::context;
use crate::focusable::{is_focusable, is_visible};
use crate::groupper::GroupperBoundary;
use crate::mover::MoverBoundary;
use crate::registry::Registry;

/// Parameters of a directional focus search.
#[derive(Clone, Copy, Debug)]
pub struct FindProps {
    /// The container to search within. The container itself is not a match
    /// unless `include_container` is set.
    pub container: NodeId,
    /// Element to start after (forward) or before (backward); `None`
    /// starts at the container's edge.
    pub current: Option<NodeId>,
    /// The element the search conceptually originates from, for boundary
    /// entry rules (memorized mover children, visibility-aware entry).
    /// Defaults to `current` when absent.
    pub from: Option<NodeId>,
    /// Whether the container itself may be returned (first/default/all
    /// queries only).
    pub include_container: bool,
    /// Relax the disabled/hidden-ancestor part of the predicate.
    pub ignore_accessibility: bool,
    /// Additional caller predicate on top of the focusability test.
    pub accept: Option<fn(NodeId) -> bool>,
}

impl FindProps {
    /// Search props covering a whole container.
    pub fn in_container(container: NodeId) -> Self {
        Self {
            container,
            current: None,
            from: None,
            include_container: false,
            ignore_accessibility: false,
            accept: None,
        }
    }

    /// Search props starting after/before `current` inside `container`.
    pub fn after(container: NodeId, current: NodeId) -> Self {
        Self {
            current: Some(current),
            ..Self::in_container(container)
        }
    }
}

/// A matched node plus whether the match was not the immediate structural
/// neighbor (something focusable was passed over on the way).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FindResult {
    /// The matched node.
    pub node: NodeId,
    /// Whether a focusable node was rejected before this match.
    pub out_of_order: bool,
}

/// Verdict of a boundary on a single candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BoundaryAccept {
    /// The boundary imposes no restriction on this candidate.
    Allow,
    /// The boundary excludes this candidate.
    Deny,
}

/// Result of asking a boundary for the next structural stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NextTabbable {
    /// A stop inside the boundary.
    Found(FindResult),
    /// Navigation is confined and there is nowhere else to go.
    Stay,
    /// The search continues outside the boundary.
    Escape,
}

/// The container-kind interface groupper and mover variants implement.
pub(crate) trait Boundary {
    /// Whether the boundary allows `el` as a candidate of a search that
    /// originates at `from`.
    fn accept_element<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        el: NodeId,
        from: Option<NodeId>,
    ) -> BoundaryAccept;

    /// The next structural (Tab) stop after `from`, confined to this
    /// boundary's rules.
    fn find_next_tabbable<T: TreeNav>(
        &self,
        loc: &Locator<'_, T>,
        from: NodeId,
        backward: bool,
    ) -> NextTabbable;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Accept,
    AcceptAtomic,
    Reject,
    SkipSubtree,
}

/// A read-only view over everything a search needs.
pub(crate) struct Locator<'a, T: TreeNav> {
    pub(crate) tree: &'a T,
    pub(crate) reg: &'a Registry,
    pub(crate) active_modalizer: Option<NodeId>,
}

impl<T: TreeNav> core::fmt::Debug for Locator<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Locator")
            .field("active_modalizer", &self.active_modalizer)
            .finish_non_exhaustive()
    }
}

impl<'a, T: TreeNav> Locator<'a, T> {
    pub(crate) fn new(tree: &'a T, reg: &'a Registry, active_modalizer: Option<NodeId>) -> Self {
        Self {
            tree,
            reg,
            active_modalizer,
        }
    }

    /// First match after `props.current` in document order, or `None`.
    pub(crate) fn find_next(&self, props: &FindProps) -> Option<FindResult> {
        let mut rejected = false;
        let mut cur = props.current.unwrap_or(props.container);
        loop {
            let skip = cur != props.container && self.wants_subtree_skip(cur);
            cur = self.forward_step(props.container, cur, skip)?;
            match self.classify(cur, props, &mut rejected) {
                Step::Accept | Step::AcceptAtomic => {
                    self.check_not_origin(cur, props);
                    return Some(FindResult {
                        node: cur,
                        out_of_order: rejected,
                    });
                }
                Step::Reject | Step::SkipSubtree => {}
            }
        }
    }

    /// First match before `props.current` in reverse document order.
    pub(crate) fn find_prev(&self, props: &FindProps) -> Option<FindResult> {
        let mut rejected = false;
        let mut cur_opt = match props.current {
            Some(c) => self.backward_step(props.container, c),
            None => self.tree.last_descendant(props.container),
        };
        while let Some(cur) = cur_opt {
            match self.classify(cur, props, &mut rejected) {
                Step::Accept | Step::AcceptAtomic => {
                    self.check_not_origin(cur, props);
                    return Some(FindResult {
                        node: cur,
                        out_of_order: rejected,
                    });
                }
                Step::Reject | Step::SkipSubtree => {}
            }
            cur_opt = self.backward_step(props.container, cur);
        }
        None
    }

    /// All matches in tab order (explicit keys first, document order
    /// otherwise).
    pub(crate) fn find_all(&self, props: &FindProps) -> Vec<NodeId> {
        let mut rejected = false;
        let mut items: Vec<(Option<i32>, NodeId)> = Vec::new();

        if props.include_container
            && self.passes_predicate(props.container, props)
            && props.accept.is_none_or(|f| f(props.container))
        {
            items.push((
                self.tree.tab_index(props.container),
                props.container,
            ));
        }

        let mut cur = props.container;
        loop {
            let skip = cur != props.container && self.wants_subtree_skip(cur);
            let Some(next) = self.forward_step(props.container, cur, skip) else {
                break;
            };
            cur = next;
            match self.classify(cur, props, &mut rejected) {
                Step::Accept | Step::AcceptAtomic => {
                    items.push((self.tree.tab_index(cur), cur));
                }
                Step::Reject | Step::SkipSubtree => {}
            }
        }

        // Explicit keys first (ascending), unkeyed nodes after, document
        // order preserved among equals.
        items.sort_by(|a, b| match (a.0, b.0) {
            (Some(ka), Some(kb)) => ka.cmp(&kb),
            (Some(_), None) => core::cmp::Ordering::Less,
            (None, Some(_)) => core::cmp::Ordering::Greater,
            (None, None) => core::cmp::Ordering::Equal,
        });
        items.into_iter().map(|(_, id)| id).collect()
    }

    /// First match in tab order.
    pub(crate) fn find_first(&self, props: &FindProps) -> Option<NodeId> {
        self.find_all(props).first().copied()
    }

    /// Last match in tab order.
    pub(crate) fn find_last(&self, props: &FindProps) -> Option<NodeId> {
        self.find_all(props).last().copied()
    }

    /// The container's default element: the first match marked
    /// `is_default`, else the first match.
    pub(crate) fn find_default(&self, props: &FindProps) -> Option<NodeId> {
        let all = self.find_all(props);
        all.iter()
            .copied()
            .find(|&id| self.reg.focusable_props(id).is_some_and(|p| p.is_default))
            .or_else(|| all.first().copied())
    }

    // --- walk steps ---

    fn forward_step(&self, container: NodeId, cur: NodeId, skip_subtree: bool) -> Option<NodeId> {
        let next = if skip_subtree {
            let last = self.tree.last_descendant(cur).unwrap_or(cur);
            self.tree.next_depth_first(last)
        } else {
            self.tree.next_depth_first(cur)
        }?;
        if next != container && self.tree.contains(container, next) {
            Some(next)
        } else {
            None
        }
    }

    fn backward_step(&self, container: NodeId, cur: NodeId) -> Option<NodeId> {
        let prev = self.tree.prev_depth_first(cur)?;
        if prev != container && self.tree.contains(container, prev) {
            Some(prev)
        } else {
            None
        }
    }

    /// Whether the forward walk may hop over `cur`'s whole subtree: nothing
    /// inside an atomic or invisible node can match.
    fn wants_subtree_skip(&self, cur: NodeId) -> bool {
        let Some(flags) = self.tree.flags(cur) else {
            return true;
        };
        if flags.contains(NodeFlags::EMBED) || self.reg.uncontrolled(cur) {
            return true;
        }
        !flags.contains(NodeFlags::VISIBLE)
    }

    // --- per-node pipeline ---

    fn classify(&self, el: NodeId, props: &FindProps, rejected: &mut bool) -> Step {
        debug_assert!(el != props.container, "container is never classified");

        let Some(flags) = self.tree.flags(el) else {
            return Step::SkipSubtree;
        };

        // Subtrees with no root context are not managed; skip them whole.
        let Some(ctx) = context::resolve(self.tree, self.reg, el) else {
            return Step::SkipSubtree;
        };

        // Contents of embedding/uncontrolled ancestors are foreign.
        if self.inside_atomic(el, props.container) {
            return Step::Reject;
        }

        // Embedding nodes are accepted unconditionally and never descended
        // into.
        if flags.contains(NodeFlags::EMBED) {
            return Step::AcceptAtomic;
        }

        // An uncontrolled container is a native-handled pocket: it is
        // yielded as a single stop when it is reachable at all.
        if self.reg.uncontrolled(el) {
            let reachable = is_visible(self.tree, el)
                && self.modalizer_allows(ctx.modalizer)
                && self.boundaries_allow(el, props) == BoundaryAccept::Allow;
            return if reachable {
                Step::AcceptAtomic
            } else {
                Step::SkipSubtree
            };
        }

        if !flags.contains(NodeFlags::VISIBLE) {
            return Step::SkipSubtree;
        }

        if !self.passes_predicate(el, props) {
            return Step::Reject;
        }

        if !self.modalizer_allows(ctx.modalizer) {
            *rejected = true;
            return Step::Reject;
        }

        if self.boundaries_allow(el, props) == BoundaryAccept::Deny {
            *rejected = true;
            return Step::Reject;
        }

        if let Some(accept) = props.accept
            && !accept(el)
        {
            *rejected = true;
            return Step::Reject;
        }

        Step::Accept
    }

    fn passes_predicate(&self, el: NodeId, props: &FindProps) -> bool {
        is_focusable(self.tree, self.reg, el, props.ignore_accessibility)
    }

    /// Whether any strict ancestor of `el` below `container` is an
    /// embedding or uncontrolled node.
    fn inside_atomic(&self, el: NodeId, container: NodeId) -> bool {
        let mut cur = self.tree.parent_of(el);
        while let Some(a) = cur {
            if a == container {
                break;
            }
            if self
                .tree
                .flags(a)
                .is_some_and(|f| f.contains(NodeFlags::EMBED))
                || self.reg.uncontrolled(a)
            {
                return true;
            }
            cur = self.tree.parent_of(a);
        }
        false
    }

    /// Modalizer gating: with an active exclusive region, only candidates
    /// of the same region (or explicitly accessible ones) are allowed.
    fn modalizer_allows(&self, el_modalizer: Option<NodeId>) -> bool {
        match (self.active_modalizer, el_modalizer) {
            (None, None) => true,
            (None, Some(m)) => self
                .reg
                .modalizer(m)
                .is_some_and(|s| s.props.always_accessible),
            (Some(a), Some(m)) => {
                if a == m {
                    return true;
                }
                let (Some(active), Some(cand)) = (self.reg.modalizer(a), self.reg.modalizer(m))
                else {
                    return false;
                };
                active.props.id == cand.props.id || cand.props.always_accessible
            }
            (Some(a), None) => self
                .reg
                .modalizer(a)
                .is_some_and(|s| s.props.others_accessible),
        }
    }

    /// Walk every groupper/mover boundary between `el` (inclusive) and the
    /// container (exclusive) and let each veto the candidate.
    fn boundaries_allow(&self, el: NodeId, props: &FindProps) -> BoundaryAccept {
        let from = props.from.or(props.current);
        let mut cur = Some(el);
        while let Some(a) = cur {
            if a == props.container {
                break;
            }
            if let Some(state) = self.reg.groupper(a) {
                let b = GroupperBoundary::new(a, state);
                if b.accept_element(self, el, from) == BoundaryAccept::Deny {
                    return BoundaryAccept::Deny;
                }
            }
            if let Some(state) = self.reg.mover(a) {
                let b = MoverBoundary::new(a, state);
                if b.accept_element(self, el, from) == BoundaryAccept::Deny {
                    return BoundaryAccept::Deny;
                }
            }
            cur = self.tree.parent_of(a);
        }
        BoundaryAccept::Allow
    }

    /// A search must never return its own origin as the next match; doing
    /// so would loop focus in place and corrupt navigation state.
    fn check_not_origin(&self, found: NodeId, props: &FindProps) {
        if props.current == Some(found) {
            panic!("focus search returned its origin");
        }
    }
}

/// The next structural (Tab) stop from `from`, escalating outward through
/// enclosing boundaries until one produces a stop or the root is exhausted.
///
/// Returns `None` when navigation runs past the managed boundary.
pub(crate) fn next_tabbable<T: TreeNav>(
    loc: &Locator<'_, T>,
    from: NodeId,
    backward: bool,
) -> Option<FindResult> {
    let mut start = from;
    let mut level = nearest_boundary(loc, start);
    loop {
        match level {
            Some(boundary_node) => {
                let outcome = boundary_next(loc, boundary_node, start, backward)?;
                match outcome {
                    NextTabbable::Found(r) => return Some(r),
                    NextTabbable::Stay => {
                        return Some(FindResult {
                            node: from,
                            out_of_order: false,
                        });
                    }
                    NextTabbable::Escape => {
                        // Continue outside the boundary, past its subtree.
                        start = if backward {
                            boundary_node
                        } else {
                            loc.tree.last_descendant(boundary_node).unwrap_or(boundary_node)
                        };
                        level = loc
                            .tree
                            .parent_of(boundary_node)
                            .and_then(|p| nearest_boundary(loc, p));
                    }
                }
            }
            None => {
                let ctx = context::resolve(loc.tree, loc.reg, start)?;
                let props = FindProps {
                    from: Some(from),
                    ..FindProps::after(ctx.root, start)
                };
                return if backward {
                    loc.find_prev(&props)
                } else {
                    loc.find_next(&props)
                };
            }
        }
    }
}

/// Dispatch `find_next_tabbable` to the boundary kind tagged on `node`.
fn boundary_next<T: TreeNav>(
    loc: &Locator<'_, T>,
    node: NodeId,
    from: NodeId,
    backward: bool,
) -> Option<NextTabbable> {
    if let Some(state) = loc.reg.groupper(node) {
        return Some(GroupperBoundary::new(node, state).find_next_tabbable(loc, from, backward));
    }
    if let Some(state) = loc.reg.mover(node) {
        return Some(MoverBoundary::new(node, state).find_next_tabbable(loc, from, backward));
    }
    None
}

/// Nearest enclosing boundary container of `node` (including itself),
/// honoring which of groupper/mover is nearer.
fn nearest_boundary<T: TreeNav>(loc: &Locator<'_, T>, node: NodeId) -> Option<NodeId> {
    let ctx = context::resolve(loc.tree, loc.reg, node)?;
    match (ctx.groupper, ctx.mover) {
        (Some(g), Some(_m)) if ctx.groupper_before_mover => Some(g),
        (_, Some(m)) => Some(m),
        (Some(g), None) => Some(g),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::{RootProps, RootState};
    use alloc::vec;
    use trellis_tree::{LocalNode, Tree};

    fn focusable() -> LocalNode {
        LocalNode {
            flags: NodeFlags::VISIBLE | NodeFlags::FOCUSABLE,
            ..LocalNode::default()
        }
    }

    fn setup() -> (Tree, Registry, NodeId) {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let mut reg = Registry::new();
        let uid = reg.next_uid();
        reg.tag_entry(root).root = Some(RootState::new(uid, RootProps::default()));
        (tree, reg, root)
    }

    #[test]
    fn round_trip_next_prev() {
        let (mut tree, reg, root) = setup();
        let items: Vec<NodeId> = (0..4).map(|_| tree.insert(Some(root), focusable())).collect();
        let loc = Locator::new(&tree, &reg, None);

        // find-next from item i yields item i+1, find-prev from i+1 yields i.
        for i in 0..3 {
            let next = loc.find_next(&FindProps::after(root, items[i])).unwrap();
            assert_eq!(next.node, items[i + 1]);
            assert!(!next.out_of_order);
            let prev = loc.find_prev(&FindProps::after(root, items[i + 1])).unwrap();
            assert_eq!(prev.node, items[i]);
        }
        assert!(loc.find_next(&FindProps::after(root, items[3])).is_none());
        assert!(loc.find_prev(&FindProps::after(root, items[0])).is_none());
    }

    #[test]
    fn backward_search_starts_at_last_descendant() {
        let (mut tree, reg, root) = setup();
        let a = tree.insert(Some(root), focusable());
        let nest = tree.insert(Some(root), LocalNode::default());
        let b = tree.insert(Some(nest), focusable());
        let loc = Locator::new(&tree, &reg, None);

        let last = loc.find_prev(&FindProps::in_container(root)).unwrap();
        assert_eq!(last.node, b);
        let prev = loc.find_prev(&FindProps::after(root, b)).unwrap();
        assert_eq!(prev.node, a);
    }

    #[test]
    fn invisible_subtrees_are_skipped() {
        let (mut tree, reg, root) = setup();
        let a = tree.insert(Some(root), focusable());
        let hidden = tree.insert(
            Some(root),
            LocalNode {
                flags: NodeFlags::empty(),
                ..LocalNode::default()
            },
        );
        let _inside = tree.insert(Some(hidden), focusable());
        let b = tree.insert(Some(root), focusable());
        let loc = Locator::new(&tree, &reg, None);

        let next = loc.find_next(&FindProps::after(root, a)).unwrap();
        assert_eq!(next.node, b);
    }

    #[test]
    fn embed_nodes_are_atomic() {
        let (mut tree, reg, root) = setup();
        let frame = tree.insert(
            Some(root),
            LocalNode {
                flags: NodeFlags::VISIBLE | NodeFlags::EMBED,
                ..LocalNode::default()
            },
        );
        let _foreign = tree.insert(Some(frame), focusable());
        let after = tree.insert(Some(root), focusable());
        let loc = Locator::new(&tree, &reg, None);

        let first = loc.find_next(&FindProps::in_container(root)).unwrap();
        assert_eq!(first.node, frame, "embed accepted unconditionally");
        let next = loc.find_next(&FindProps::after(root, frame)).unwrap();
        assert_eq!(next.node, after, "embed contents are not visited");
        // Backward: foreign content is likewise not yielded.
        let prev = loc.find_prev(&FindProps::after(root, after)).unwrap();
        assert_eq!(prev.node, frame);
    }

    #[test]
    fn uncontrolled_container_is_a_single_stop() {
        let (mut tree, mut reg, root) = setup();
        let pocket = tree.insert(Some(root), LocalNode::default());
        reg.tag_entry(pocket).uncontrolled = true;
        let _native = tree.insert(Some(pocket), focusable());
        let after = tree.insert(Some(root), focusable());
        let loc = Locator::new(&tree, &reg, None);

        let first = loc.find_next(&FindProps::in_container(root)).unwrap();
        assert_eq!(first.node, pocket);
        let next = loc.find_next(&FindProps::after(root, pocket)).unwrap();
        assert_eq!(next.node, after);
    }

    #[test]
    fn tab_index_orders_first_and_all() {
        let (mut tree, reg, root) = setup();
        let a = tree.insert(Some(root), focusable());
        let b = tree.insert(
            Some(root),
            LocalNode {
                tab_index: Some(1),
                ..focusable()
            },
        );
        let c = tree.insert(
            Some(root),
            LocalNode {
                tab_index: Some(2),
                ..focusable()
            },
        );
        let loc = Locator::new(&tree, &reg, None);

        // Keyed nodes first in key order, then unkeyed in document order.
        assert_eq!(loc.find_all(&FindProps::in_container(root)), vec![b, c, a]);
        assert_eq!(loc.find_first(&FindProps::in_container(root)), Some(b));
        assert_eq!(loc.find_last(&FindProps::in_container(root)), Some(a));
    }

    #[test]
    fn find_default_prefers_marked_element() {
        let (mut tree, mut reg, root) = setup();
        let _a = tree.insert(Some(root), focusable());
        let b = tree.insert(Some(root), focusable());
        reg.tag_entry(b).focusable = Some(crate::focusable::FocusableProps {
            is_default: true,
            ..Default::default()
        });
        let loc = Locator::new(&tree, &reg, None);

        assert_eq!(loc.find_default(&FindProps::in_container(root)), Some(b));
    }

    #[test]
    fn out_of_order_flag_reports_passed_over_focusable() {
        use crate::mover::{MoverProps, MoverState};

        let (mut tree, mut reg, root) = setup();
        let mover = tree.insert(Some(root), LocalNode::default());
        let a = tree.insert(Some(mover), focusable());
        let b = tree.insert(Some(mover), focusable());

        let mut state = MoverState::new(MoverProps {
            memorize_current: true,
            ..MoverProps::default()
        });
        state.current = Some(b);
        reg.tag_entry(mover).mover = Some(state);
        let loc = Locator::new(&tree, &reg, None);

        // Entering from outside: the memorized child wins, and skipping
        // over `a` is reported as out of structural order.
        let found = loc.find_next(&FindProps::in_container(root)).unwrap();
        assert_eq!(found.node, b);
        assert!(found.out_of_order);
        let _ = a;
    }
}
