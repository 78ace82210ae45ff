//! Traversal state machine phases.

use std::fmt;

use serde::Serialize;

// ============================================================================
// TraversalState
// ============================================================================

/// Phase the engine is in for the node currently being processed.
///
/// ```text
/// Idle -> SelectingParent -> AwaitingChildren -> EnumeratingChildren
///                 |                  |                  |
///                 +--> Recovering <--+                  v
///                                              Recursing <-> Backtracking -> Done
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalState {
    /// Not started, or positioned on a node before acting on it.
    #[default]
    Idle,
    /// Selecting the current node's value on its own control.
    SelectingParent,
    /// Waiting for the dependent control to repopulate.
    AwaitingChildren,
    /// Walking the stabilized child list.
    EnumeratingChildren,
    /// Descending into one child.
    Recursing,
    /// Returning from a child to its parent.
    Backtracking,
    /// Pausing and restoring page state after a recoverable failure.
    Recovering,
    /// Root exhausted, halted or cancelled.
    Done,
}

impl TraversalState {
    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SelectingParent => "selecting_parent",
            Self::AwaitingChildren => "awaiting_children",
            Self::EnumeratingChildren => "enumerating_children",
            Self::Recursing => "recursing",
            Self::Backtracking => "backtracking",
            Self::Recovering => "recovering",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
