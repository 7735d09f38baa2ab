// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared public types: keys, navigation outcomes, visibility classes.

/// Keys the engine interprets.
///
/// Hosts translate platform key events into these values before calling
/// [`Engine::handle_key`](crate::Engine::handle_key); anything else is not
/// an engine concern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Structural forward/backward navigation (with Shift for backward).
    Tab,
    /// Enter an inactive group.
    Enter,
    /// Collapse the nearest active group.
    Esc,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Jump to the first element of a mover.
    Home,
    /// Jump to the last element of a mover.
    End,
    /// Page up within a scrolling mover.
    PageUp,
    /// Page down within a scrolling mover.
    PageDown,
}

/// A key event as seen by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyInput {
    /// The interpreted key.
    pub key: Key,
    /// Whether Shift was held (reverses Tab).
    pub shift: bool,
}

impl KeyInput {
    /// Convenience constructor for an unshifted key.
    pub const fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    /// Convenience constructor for a shifted key.
    pub const fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// What the engine did with a key event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The engine moved focus to this node.
    Focused(crate::NodeId),
    /// The key changed engine state without moving focus.
    Handled,
    /// Structural navigation ran past the managed boundary; the engine has
    /// blurred and the host should let the platform take over.
    LeftRoot,
    /// The key is not an engine concern in the current context.
    NotHandled,
}

/// How much of a node is visible inside its scroll viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    /// Entirely outside the viewport.
    Invisible,
    /// Intersects the viewport edge.
    PartiallyVisible,
    /// Entirely inside the viewport.
    Visible,
}

/// Order in which focus restoration strategies are attempted after the
/// focused element disappears.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RestoreFocusOrder {
    /// Replay recorded history first.
    #[default]
    History,
    /// Prefer the recovery container's default element.
    DeloserDefault,
    /// Prefer the recovery container's first focusable.
    DeloserFirst,
    /// Prefer the root's default element.
    RootDefault,
    /// Prefer the root's first focusable.
    RootFirst,
}

/// Host-assigned stable symbol for re-identifying a node across rebuilds.
///
/// Node identifiers go stale when a node is removed. When the host destroys
/// and recreates an equivalent node (a list rerender, say), it re-registers
/// the same `Marker` on the replacement, and history entries carrying the
/// marker resolve to the rebuilt node. The host manages the meaning and
/// lifecycle of individual markers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Marker(pub u64);
