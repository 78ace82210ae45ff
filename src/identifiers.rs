//! Type-safe identifiers.
//!
//! Newtype wrappers keep protocol request IDs and remote control
//! references from being mixed up with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlation ID of a protocol request.
///
/// The nil UUID is reserved for the READY handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the reserved READY handshake ID.
    #[inline]
    #[must_use]
    pub const fn ready() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the READY handshake ID.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ControlId
// ============================================================================

/// Reference to a live control on the page.
///
/// Issued by the control surface when a locator resolves. A reference may go
/// stale when the page re-renders the control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    /// Creates a control ID from a surface-issued reference.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_ready_id_is_nil() {
        assert!(RequestId::ready().is_ready());
        assert!(!RequestId::generate().is_ready());
    }

    #[test]
    fn test_request_id_serializes_as_string() {
        let json = serde_json::to_string(&RequestId::ready()).expect("serialize");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_control_id_display() {
        let id = ControlId::new("ctl-7");
        assert_eq!(id.to_string(), "ctl-7");
        assert_eq!(id.as_str(), "ctl-7");
    }
}
