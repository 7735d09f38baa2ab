// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node behavior registry.
//!
//! Behaviors (root, mover, groupper, modalizer, deloser, uncontrolled
//! marker, focusable properties) are stored out of band, keyed by
//! [`NodeId`]. The registry never retains a removed node: ids go stale in
//! the tree, and a periodic sweep reclaims the tag entries and marker
//! mappings left behind.
//!
//! Invariant: at most one behavior of each kind per node. Duplicate
//! registration is a development-time assertion and a release no-op.

use hashbrown::HashMap;
use trellis_tree::TreeNav;

use crate::NodeId;
use crate::deloser::DeloserState;
use crate::focusable::FocusableProps;
use crate::groupper::GroupperState;
use crate::modalizer::ModalizerState;
use crate::mover::MoverState;
use crate::root::RootState;
use crate::types::Marker;

/// Out-of-band behavior record for one node.
#[derive(Debug, Default)]
pub(crate) struct Tag {
    pub(crate) root: Option<RootState>,
    pub(crate) modalizer: Option<ModalizerState>,
    pub(crate) groupper: Option<GroupperState>,
    pub(crate) mover: Option<MoverState>,
    pub(crate) deloser: Option<DeloserState>,
    pub(crate) uncontrolled: bool,
    pub(crate) focusable: Option<FocusableProps>,
}

impl Tag {
    fn is_empty(&self) -> bool {
        self.root.is_none()
            && self.modalizer.is_none()
            && self.groupper.is_none()
            && self.mover.is_none()
            && self.deloser.is_none()
            && !self.uncontrolled
            && self.focusable.is_none()
    }
}

/// Behavior tags and marker mappings for one engine instance.
pub(crate) struct Registry {
    tags: HashMap<NodeId, Tag>,
    markers: HashMap<Marker, NodeId>,
    marker_by_node: HashMap<NodeId, Marker>,
    next_uid: u64,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags.len())
            .field("markers", &self.markers.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            tags: HashMap::new(),
            markers: HashMap::new(),
            marker_by_node: HashMap::new(),
            next_uid: 1,
        }
    }

    /// Allocate a fresh per-instance unique id for a behavior instance.
    pub(crate) fn next_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    pub(crate) fn tag(&self, id: NodeId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub(crate) fn tag_mut(&mut self, id: NodeId) -> Option<&mut Tag> {
        self.tags.get_mut(&id)
    }

    pub(crate) fn tag_entry(&mut self, id: NodeId) -> &mut Tag {
        self.tags.entry(id).or_default()
    }

    /// Drop the tag entry if every behavior slot is empty.
    pub(crate) fn prune(&mut self, id: NodeId) {
        if self.tags.get(&id).is_some_and(Tag::is_empty) {
            self.tags.remove(&id);
        }
    }

    /// Iterate all tagged nodes.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tags.keys().copied()
    }

    // --- per-behavior read accessors ---

    pub(crate) fn root(&self, id: NodeId) -> Option<&RootState> {
        self.tag(id).and_then(|t| t.root.as_ref())
    }

    pub(crate) fn modalizer(&self, id: NodeId) -> Option<&ModalizerState> {
        self.tag(id).and_then(|t| t.modalizer.as_ref())
    }

    pub(crate) fn groupper(&self, id: NodeId) -> Option<&GroupperState> {
        self.tag(id).and_then(|t| t.groupper.as_ref())
    }

    pub(crate) fn groupper_mut(&mut self, id: NodeId) -> Option<&mut GroupperState> {
        self.tag_mut(id).and_then(|t| t.groupper.as_mut())
    }

    pub(crate) fn mover(&self, id: NodeId) -> Option<&MoverState> {
        self.tag(id).and_then(|t| t.mover.as_ref())
    }

    pub(crate) fn mover_mut(&mut self, id: NodeId) -> Option<&mut MoverState> {
        self.tag_mut(id).and_then(|t| t.mover.as_mut())
    }

    pub(crate) fn deloser(&self, id: NodeId) -> Option<&DeloserState> {
        self.tag(id).and_then(|t| t.deloser.as_ref())
    }

    pub(crate) fn deloser_mut(&mut self, id: NodeId) -> Option<&mut DeloserState> {
        self.tag_mut(id).and_then(|t| t.deloser.as_mut())
    }

    pub(crate) fn uncontrolled(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(|t| t.uncontrolled)
    }

    pub(crate) fn focusable_props(&self, id: NodeId) -> Option<&FocusableProps> {
        self.tag(id).and_then(|t| t.focusable.as_ref())
    }

    // --- markers ---

    /// Bind a marker to a node, replacing any previous binding of either.
    pub(crate) fn set_marker(&mut self, id: NodeId, marker: Marker) {
        if let Some(old_node) = self.markers.insert(marker, id) {
            self.marker_by_node.remove(&old_node);
        }
        if let Some(old_marker) = self.marker_by_node.insert(id, marker)
            && old_marker != marker
        {
            self.markers.remove(&old_marker);
        }
    }

    /// Remove the marker bound to a node, if any.
    pub(crate) fn clear_marker(&mut self, id: NodeId) {
        if let Some(marker) = self.marker_by_node.remove(&id) {
            self.markers.remove(&marker);
        }
    }

    pub(crate) fn resolve_marker(&self, marker: Marker) -> Option<NodeId> {
        self.markers.get(&marker).copied()
    }

    pub(crate) fn marker_of(&self, id: NodeId) -> Option<Marker> {
        self.marker_by_node.get(&id).copied()
    }

    // --- sweep ---

    /// Reclaim tags and marker mappings whose node has left the tree.
    ///
    /// Returns the deloser container nodes that were reclaimed, so the
    /// owner can flatten them out of the shared history.
    pub(crate) fn sweep<T: TreeNav>(&mut self, tree: &T) -> alloc::vec::Vec<NodeId> {
        let mut dead_delosers = alloc::vec::Vec::new();
        self.tags.retain(|&id, tag| {
            if tree.is_alive(id) {
                return true;
            }
            if tag.deloser.is_some() {
                dead_delosers.push(id);
            }
            false
        });
        self.markers.retain(|_, &mut id| tree.is_alive(id));
        self.marker_by_node.retain(|&id, _| tree.is_alive(id));
        dead_delosers
    }
}
