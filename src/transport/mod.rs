//! WebSocket transport layer.
//!
//! This module handles communication between local end (Rust) and
//! remote end (the in-page agent) via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  RemoteSurface  │                              │  In-page agent  │
//! │                 │         WebSocket            │                 │
//! │  PendingServer  │◄────────────────────────────►│  WebSocket      │
//! │  → Connection   │      localhost:PORT          │  Client         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` - Bind to localhost with random port
//! 2. Open the page with the agent pointed at the WebSocket URL
//! 3. `PendingServer::accept` - Wait for the agent and its READY message
//! 4. `Connection` - Send commands, receive responses
//! 5. `Connection::shutdown` - Close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// WebSocket server for the in-page agent.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DEFAULT_COMMAND_TIMEOUT, ReadyData};
pub use server::PendingServer;
