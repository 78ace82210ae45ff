//! Cascading-dropdown traversal engine.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Traversal`] | Depth-first walker over the four-level hierarchy |
//! | [`SelectorResolver`] | Level to live control, first unique match wins |
//! | [`StabilizationPolicy`] | Poll-until-changed wait on a dependent control |
//! | [`RetryBudget`] | Per-node allowance of recoverable failures |
//! | [`TraversalState`] | Phase of the node being processed |
//!
//! The engine drives one [`ControlSurface`](crate::surface::ControlSurface)
//! strictly sequentially. A recoverable failure is retried against the
//! failing node's budget; once that budget is spent the branch is kept as
//! partial and the walk continues with the next sibling. Fatal errors stop
//! the walk and return the zones finalized so far.

// ============================================================================
// Submodules
// ============================================================================

/// Selector resolution.
pub mod resolver;

/// Retry budget.
pub mod retry;

/// State machine phases.
pub mod state;

/// The traversal itself.
pub mod traversal;

/// Stabilization waits.
pub mod wait;

// ============================================================================
// Re-exports
// ============================================================================

pub use resolver::{ControlHandle, SelectorResolver};
pub use retry::RetryBudget;
pub use state::TraversalState;
pub use traversal::{Halted, Harvest, Outcome, Traversal};
pub use wait::StabilizationPolicy;
