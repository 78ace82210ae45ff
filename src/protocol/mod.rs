//! WebSocket protocol message types.
//!
//! This module defines the message format for communication between
//! local end (Rust) and remote end (in-page agent).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `READY` | Remote → Local | Handshake, nil request ID |
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions.
pub mod command;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use request::{Request, Response, ResponseType};
