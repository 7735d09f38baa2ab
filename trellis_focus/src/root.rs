// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Root boundary.
//!
//! A root marks a subtree as engine-managed: context resolution terminates
//! at the nearest root, and structural navigation that runs past it leaves
//! the engine's jurisdiction. The root also carries the per-boundary
//! restoration policy consulted by focus-loss recovery.

use crate::types::RestoreFocusOrder;

/// Configuration of a root boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RootProps {
    /// Order in which restoration strategies are tried for focus lost
    /// inside this root.
    pub restore_focus_order: RestoreFocusOrder,
}

/// Runtime state of a root boundary.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RootState {
    /// Per-instance unique id, used to key history buckets.
    pub(crate) uid: u64,
    pub(crate) props: RootProps,
}

impl RootState {
    pub(crate) fn new(uid: u64, props: RootProps) -> Self {
        Self { uid, props }
    }
}
