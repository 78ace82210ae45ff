//! Traversal events.
//!
//! The engine reports progress as a stream of [`TraversalEvent`]s delivered
//! synchronously to an [`EventSink`]. Sinks must not block: the engine calls
//! them inline between surface operations.
//!
//! | Sink | Behaviour |
//! |------|-----------|
//! | [`TracingSink`] | Forwards events to `tracing` (default) |
//! | [`ChannelSink`] | Sends events over an unbounded tokio channel |
//! | [`RecordingSink`] | Keeps every event in memory |
//! | [`NullSink`] | Drops everything |

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::Outcome;
use crate::error::Error;
use crate::model::Level;

// ============================================================================
// FailureKind
// ============================================================================

/// Category of the error that abandoned a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Dependent options never repopulated.
    StabilizationTimeout,
    /// Selection did not take effect.
    TransientSelection,
    /// Control reference went stale.
    StaleControl,
    /// Surface request timed out.
    RequestTimeout,
    /// Anything else.
    Other,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::StabilizationTimeout { .. } => Self::StabilizationTimeout,
            Error::TransientSelection { .. } => Self::TransientSelection,
            Error::StaleControl { .. } => Self::StaleControl,
            Error::RequestTimeout { .. } => Self::RequestTimeout,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// BranchFailure
// ============================================================================

/// A branch abandoned after its retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    /// Level of the abandoned node.
    pub level: Level,
    /// Labels from the zone down to the abandoned node.
    pub path: Vec<String>,
    /// Category of the last error.
    pub kind: FailureKind,
    /// Message of the last error.
    pub message: String,
    /// Screenshot captured at the time of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

// ============================================================================
// TraversalEvent
// ============================================================================

/// Something the engine did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraversalEvent {
    /// The engine positioned itself on a node.
    NodeEntered {
        /// Level of the node.
        level: Level,
        /// Labels from the zone down to the node.
        path: Vec<String>,
    },

    /// A dependent control stabilized.
    ChildrenDiscovered {
        /// Level of the children.
        level: Level,
        /// Labels of the parent; empty for the zone list.
        path: Vec<String>,
        /// Number of children.
        count: usize,
    },

    /// A recoverable failure will be retried.
    RetryScheduled {
        /// Level of the node being retried.
        level: Level,
        /// Labels of the node being retried.
        path: Vec<String>,
        /// Failures charged so far.
        attempt: u32,
        /// Attempts left.
        remaining: u32,
        /// Category of the failure.
        kind: FailureKind,
        /// Failure message.
        message: String,
    },

    /// A branch was abandoned and kept as partial.
    BranchFailed(BranchFailure),

    /// The abort signal was observed.
    Cancelled,

    /// A fatal error stopped the traversal.
    Halted {
        /// Error message.
        message: String,
    },

    /// The traversal returned a tree.
    Finished {
        /// How the traversal ended.
        outcome: Outcome,
        /// Zones in the tree.
        zones: usize,
        /// Villages in the tree.
        villages: usize,
        /// Branches abandoned along the way.
        failures: usize,
    },
}

// ============================================================================
// EventSink
// ============================================================================

/// Receiver of traversal events.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &TraversalEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &TraversalEvent) {
        match event {
            TraversalEvent::NodeEntered { level, path } => {
                debug!(%level, path = %path.join("/"), "Entered node");
            }
            TraversalEvent::ChildrenDiscovered { level, path, count } => {
                if *level == Level::Village {
                    debug!(path = %path.join("/"), villages = count, "Villages listed");
                } else {
                    info!(%level, path = %path.join("/"), count, "Options discovered");
                }
            }
            TraversalEvent::RetryScheduled {
                level,
                path,
                attempt,
                remaining,
                message,
                ..
            } => {
                warn!(%level, path = %path.join("/"), attempt, remaining, %message, "Retrying");
            }
            TraversalEvent::BranchFailed(failure) => {
                error!(
                    level = %failure.level,
                    path = %failure.path.join("/"),
                    kind = ?failure.kind,
                    screenshot = ?failure.screenshot,
                    message = %failure.message,
                    "Branch abandoned"
                );
            }
            TraversalEvent::Cancelled => info!("Traversal cancelled"),
            TraversalEvent::Halted { message } => error!(%message, "Traversal halted"),
            TraversalEvent::Finished {
                outcome,
                zones,
                villages,
                failures,
            } => {
                info!(?outcome, zones, villages, failures, "Traversal finished");
            }
        }
    }
}

/// Sends events over a tokio channel.
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TraversalEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving half.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TraversalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &TraversalEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraversalEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraversalEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded branch failures.
    #[must_use]
    pub fn failures(&self) -> Vec<BranchFailure> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraversalEvent::BranchFailed(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of scheduled retries.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TraversalEvent::RetryScheduled { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &TraversalEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &TraversalEvent) {}
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ControlId;

    fn failure() -> BranchFailure {
        BranchFailure {
            level: Level::District,
            path: vec!["North".into(), "B".into()],
            kind: FailureKind::StabilizationTimeout,
            message: "timed out".into(),
            screenshot: None,
        }
    }

    #[test]
    fn test_failure_kind_from_error() {
        let control = ControlId::new("zone#0");
        assert_eq!(
            FailureKind::from(&Error::stale_control(control)),
            FailureKind::StaleControl
        );
        assert_eq!(
            FailureKind::from(&Error::stabilization_timeout(Level::Zone, 1)),
            FailureKind::StabilizationTimeout
        );
        assert_eq!(FailureKind::from(&Error::Cancelled), FailureKind::Other);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(TraversalEvent::BranchFailed(failure())).expect("json");
        assert_eq!(json["event"], "branch_failed");
        assert_eq!(json["level"], "district");
        assert_eq!(json["kind"], "stabilization_timeout");
        assert!(json.get("screenshot").is_none());

        let json = serde_json::to_value(TraversalEvent::Cancelled).expect("json");
        assert_eq!(json["event"], "cancelled");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(&TraversalEvent::Cancelled);
        sink.emit(&TraversalEvent::BranchFailed(failure()));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.failures(), vec![failure()]);
        assert_eq!(sink.retries(), 0);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_and_tolerates_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(&TraversalEvent::Cancelled);
        assert_eq!(rx.recv().await, Some(TraversalEvent::Cancelled));

        drop(rx);
        sink.emit(&TraversalEvent::Cancelled);
    }
}
