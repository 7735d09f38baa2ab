// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outbound engine events.
//!
//! The engine never calls back into host code. Everything observable is
//! pushed onto an internal queue and handed out through
//! [`Engine::drain_events`](crate::Engine::drain_events); hosts drain after
//! each inbound call (or batch of calls) and react in whatever order suits
//! them. Events for one focus change are queued in the engine's fixed
//! notification order, so replaying a drained batch is deterministic.

use crate::NodeId;

/// A structured engine event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FocusEvent {
    /// A node gained focus.
    FocusIn {
        /// The newly focused node.
        node: NodeId,
    },
    /// A node lost focus.
    FocusOut {
        /// The previously focused node.
        node: NodeId,
    },
    /// Focus entered a managed root boundary.
    RootFocus {
        /// The root node.
        root: NodeId,
    },
    /// Focus left a managed root boundary.
    RootBlur {
        /// The root node.
        root: NodeId,
    },
    /// A mover's current element or tracked visibility changed.
    MoverStateChanged {
        /// The mover container.
        mover: NodeId,
        /// The mover's current element, if any.
        current: Option<NodeId>,
    },
    /// A modalizer became the active exclusive-focus region.
    ModalizerActive {
        /// The modalizer container.
        modalizer: NodeId,
    },
    /// A modalizer stopped being the active region.
    ModalizerInactive {
        /// The modalizer container.
        modalizer: NodeId,
    },
    /// The focused element disappeared; the restoration cascade is armed.
    DeloserFocusLost {
        /// The node that held focus when it was lost.
        node: NodeId,
    },
    /// Mover paging picked a node that should be scrolled into view.
    ScrollIntoView {
        /// The node to reveal.
        node: NodeId,
    },
}
