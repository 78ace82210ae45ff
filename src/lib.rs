//! Cascade Harvest - depth-first harvester for cascading dropdowns.
//!
//! This library walks a page whose `<select>` controls depend on one another
//! (Zone → District → Sub-Registrar Office → Village) and collects every
//! reachable option combination into an ordered tree.
//!
//! # Architecture
//!
//! - **Surface**: one stateful page session behind the
//!   [`ControlSurface`] trait, either live over WebSocket
//!   ([`RemoteSurface`]) or in memory ([`MemorySurface`])
//! - **Engine**: a sequential depth-first walk with explicit waits,
//!   per-node retry budgets and cancellation
//! - **Accumulator**: an ordered tree that records what was reached, marks
//!   abandoned branches as partial and finalizes once nothing is in flight
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! use cascade_harvest::transport::PendingServer;
//! use cascade_harvest::{RemoteSurface, Result, Traversal, TraversalConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!     println!("point the page agent at {}", server.ws_url());
//!
//!     let (connection, ready) = server.accept().await?;
//!     let surface = RemoteSurface::new(connection, ready);
//!
//!     let config = TraversalConfig::default();
//!     let harvest = Traversal::new(&surface, &config).run().await?;
//!     cascade_harvest::export::export_all(&harvest.tree, "output")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`accumulator`] | Ordered harvest tree and its builder |
//! | [`artifacts`] | Failure screenshots |
//! | [`config`] | Traversal configuration |
//! | [`engine`] | Traversal state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Traversal events and sinks |
//! | [`export`] | Text, CSV, JSON and xlsx exporters |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`model`] | Levels, nodes and paths |
//! | [`protocol`] | WebSocket message types (internal) |
//! | [`surface`] | Control surface trait and implementations |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Ordered harvest tree.
pub mod accumulator;

/// Failure screenshots.
pub mod artifacts;

/// Traversal configuration.
///
/// Use [`TraversalConfig::from_json_file`] or the `with_*` builders.
pub mod config;

/// Traversal engine.
pub mod engine;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Traversal events.
pub mod events;

/// Harvest exporters.
pub mod export;

/// Type-safe identifiers.
pub mod identifiers;

/// Levels, nodes and paths.
pub mod model;

/// WebSocket protocol message types.
///
/// Internal module defining command/response structures.
pub mod protocol;

/// Remote control surface.
pub mod surface;

/// WebSocket transport layer.
///
/// Internal module handling WebSocket server and connection management.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Tree types
pub use accumulator::{Branch, BranchStatus, Tree};

// Configuration
pub use config::{OptionFilter, SelectorTable, TraversalConfig};

// Engine types
pub use engine::{Halted, Harvest, Outcome, Traversal, TraversalState};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{BranchFailure, EventSink, FailureKind, TraversalEvent};

// Identifier types
pub use identifiers::{ControlId, RequestId};

// Model types
pub use model::{Level, Node, Path};

// Surface types
pub use surface::{ControlSurface, Locator, MemorySurface, OptionEntry, RemoteSurface};
