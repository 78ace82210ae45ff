//! Remote control surface.
//!
//! The traversal engine talks to the page only through [`ControlSurface`]:
//! one stateful session whose visible option sets depend on earlier
//! selections. Implementations are expected to be slow and occasionally
//! flaky; the engine owns all retry logic.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ControlSurface`] | Async trait over one page session |
//! | [`RemoteSurface`] | Drives an in-page agent over WebSocket |
//! | [`MemorySurface`] | In-memory page model for rehearsal and tests |
//! | [`Locator`] | Strategy for finding a control |

// ============================================================================
// Submodules
// ============================================================================

/// Control locator strategies.
pub mod locator;

/// In-memory cascading page.
pub mod memory;

/// WebSocket-backed surface.
pub mod remote;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::ControlId;

pub use locator::Locator;
pub use memory::MemorySurface;
pub use remote::RemoteSurface;

// ============================================================================
// OptionEntry
// ============================================================================

/// One raw `<option>` as read from a control, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// Displayed text.
    pub label: String,
    /// Underlying value attribute.
    pub value: String,
}

impl OptionEntry {
    /// Creates an option entry.
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// ControlSurface
// ============================================================================

/// Handle to a single page session exposing select controls.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Returns every live control the locator matches, in document order.
    async fn locate(&self, locator: &Locator) -> Result<Vec<ControlId>>;

    /// Reads the control's current options in display order.
    async fn read_options(&self, control: &ControlId) -> Result<Vec<OptionEntry>>;

    /// Selects the option with the given value and fires the page's change
    /// handlers.
    async fn select(&self, control: &ControlId, value: &str) -> Result<()>;

    /// Captures a PNG of the current page, if the surface supports it.
    async fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
