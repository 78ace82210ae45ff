//! Command definitions.
//!
//! Commands follow `module.methodName` format.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `control.locate` | `{strategy, value}` | `{controlIds: [..]}` |
//! | `control.options` | `{controlId}` | `{options: [{label, value}]}` |
//! | `control.select` | `{controlId, value}` | `{}` |
//! | `page.screenshot` | none | `{data: base64}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ControlId;
use crate::surface::Locator;

// ============================================================================
// Command
// ============================================================================

/// All commands the in-page agent understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Find every control a locator matches, in document order.
    #[serde(rename = "control.locate")]
    Locate(Locator),

    /// Read a control's options in display order.
    #[serde(rename = "control.options")]
    Options {
        /// Control to read.
        #[serde(rename = "controlId")]
        control_id: ControlId,
    },

    /// Select an option by value and fire the page's change handlers.
    #[serde(rename = "control.select")]
    Select {
        /// Control to act on.
        #[serde(rename = "controlId")]
        control_id: ControlId,
        /// Option value to select.
        value: String,
    },

    /// Capture the visible page as PNG.
    #[serde(rename = "page.screenshot")]
    Screenshot,
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Locate(_) => "control.locate",
            Self::Options { .. } => "control.options",
            Self::Select { .. } => "control.select",
            Self::Screenshot => "page.screenshot",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
