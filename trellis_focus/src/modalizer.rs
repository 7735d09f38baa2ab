// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modalizer: exclusive-focus regions.
//!
//! While a modalizer is active, the locator only yields candidates from
//! the same region (several containers may share one region id), from
//! regions marked always-accessible, or, when the active region opts in,
//! from outside any region. Activation follows focus: focusing into a
//! region activates it, focusing elsewhere deactivates it. Only the parts
//! that affect search and restoration are modeled here; accessibility-tree
//! mirroring is a host concern.

use trellis_tree::{NodeId, TreeNav};

use crate::events::FocusEvent;
use crate::{Engine, context};

/// Configuration of a modalizer region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModalizerProps {
    /// Region id. Multiple containers with the same id form one region and
    /// are mutually reachable while any of them is active.
    pub id: u64,
    /// While this region is active, nodes outside any region stay
    /// reachable.
    pub others_accessible: bool,
    /// This region's content stays reachable even while it is inactive or
    /// another region is active.
    pub always_accessible: bool,
}

/// Runtime state of a modalizer container.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ModalizerState {
    pub(crate) uid: u64,
    pub(crate) props: ModalizerProps,
    pub(crate) active: bool,
}

impl ModalizerState {
    pub(crate) fn new(uid: u64, props: ModalizerProps) -> Self {
        Self {
            uid,
            props,
            active: false,
        }
    }
}

impl Engine {
    /// Activation follows focus: called from the focus-change publisher
    /// with the newly focused node (or `None` on blur).
    pub(crate) fn modalizer_on_focus<T: TreeNav>(&mut self, tree: &T, new: Option<NodeId>) {
        let new_modalizer =
            new.and_then(|n| context::resolve(tree, &self.reg, n)).and_then(|c| c.modalizer);
        if new_modalizer == self.active_modalizer {
            return;
        }
        if let Some(old) = self.active_modalizer.take() {
            if let Some(state) = self.reg.tag_mut(old).and_then(|t| t.modalizer.as_mut()) {
                state.active = false;
            }
            self.events.push_back(FocusEvent::ModalizerInactive { modalizer: old });
        }
        if let Some(newly) = new_modalizer {
            if let Some(state) = self.reg.tag_mut(newly).and_then(|t| t.modalizer.as_mut()) {
                state.active = true;
            }
            self.events.push_back(FocusEvent::ModalizerActive { modalizer: newly });
        }
        self.active_modalizer = new_modalizer;
    }
}
