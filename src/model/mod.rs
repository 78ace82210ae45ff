//! Hierarchy data model.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Level`] | Rank in Zone → District → Sub-Registrar-Office → Village |
//! | [`Node`] | One selectable option (level, label, value) |
//! | [`Path`] | Current position of the depth-first walk |

// ============================================================================
// Submodules
// ============================================================================

/// Hierarchy levels.
pub mod level;

/// Options and paths.
pub mod node;

// ============================================================================
// Re-exports
// ============================================================================

pub use level::Level;
pub use node::{Node, Path};
