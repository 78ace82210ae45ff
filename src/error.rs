//! Error types for cascade-harvest.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cascade_harvest::{Result, Traversal};
//!
//! async fn example(surface: &RemoteSurface, config: &TraversalConfig) -> Result<()> {
//!     let harvest = Traversal::new(surface, config).run().await?;
//!     println!("{} zones", harvest.tree.len());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Page schema | [`Error::NoMatchingSelector`] |
//! | Recoverable per node | [`Error::StabilizationTimeout`], [`Error::TransientSelection`], [`Error::StaleControl`], [`Error::RequestTimeout`] |
//! | Traversal control | [`Error::Cancelled`], [`Error::Accumulator`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Csv`], [`Error::Xlsx`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{ControlId, RequestId};
use crate::model::Level;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when traversal configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Page Schema Errors
    // ========================================================================
    /// No locator candidate matched exactly one control.
    ///
    /// Fatal for the whole traversal: the page schema changed incompatibly.
    #[error("No selector matched exactly one {level} control ({tried} candidates tried)")]
    NoMatchingSelector {
        /// Level whose control could not be resolved.
        level: Level,
        /// Number of candidates tried.
        tried: usize,
    },

    // ========================================================================
    // Recoverable Errors
    // ========================================================================
    /// Dependent option set never changed within the wait.
    #[error("{level} options did not stabilize within {timeout_ms}ms")]
    StabilizationTimeout {
        /// Level of the control that was awaited.
        level: Level,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Selecting an option failed in a way that may succeed on retry.
    #[error("Failed to select '{value}' on {control_id}: {message}")]
    TransientSelection {
        /// Control the selection was issued against.
        control_id: ControlId,
        /// Option value that was being selected.
        value: String,
        /// Failure reported by the surface.
        message: String,
    },

    /// Control reference no longer points at a live control.
    #[error("Stale control: {control_id}")]
    StaleControl {
        /// The stale control's ID.
        control_id: ControlId,
    },

    /// Command request timeout.
    ///
    /// Returned when a WebSocket request gets no response in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Traversal Control
    // ========================================================================
    /// The abort signal was raised.
    ///
    /// Never escapes the traversal engine.
    #[error("Traversal cancelled")]
    Cancelled,

    /// Accumulator invariant violated.
    #[error("Accumulator error: {message}")]
    Accumulator {
        /// Description of the violated invariant.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout waiting for the page agent.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel workbook export error.
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a no matching selector error.
    #[inline]
    pub fn no_matching_selector(level: Level, tried: usize) -> Self {
        Self::NoMatchingSelector { level, tried }
    }

    /// Creates a stabilization timeout error.
    #[inline]
    pub fn stabilization_timeout(level: Level, timeout_ms: u64) -> Self {
        Self::StabilizationTimeout { level, timeout_ms }
    }

    /// Creates a transient selection error.
    #[inline]
    pub fn transient_selection(
        control_id: ControlId,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransientSelection {
            control_id,
            value: value.into(),
            message: message.into(),
        }
    }

    /// Creates a stale control error.
    #[inline]
    pub fn stale_control(control_id: ControlId) -> Self {
        Self::StaleControl { control_id }
    }

    /// Creates an accumulator error.
    #[inline]
    pub fn accumulator(message: impl Into<String>) -> Self {
        Self::Accumulator {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::StabilizationTimeout { .. }
                | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are charged against a node's retry budget.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StabilizationTimeout { .. }
                | Self::TransientSelection { .. }
                | Self::StaleControl { .. }
                | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this error must halt the whole traversal.
    ///
    /// A missing control or a lost session cannot be fixed by retrying a node.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoMatchingSelector { .. }) || self.is_connection_error()
    }
}

// ============================================================================
// Tests
// ============================================================================
