//! WebSocket-backed surface.
//!
//! [`RemoteSurface`] forwards every [`ControlSurface`] call as one protocol
//! command to the in-page agent and decodes the reply.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ControlId;
use crate::protocol::Command;
use crate::transport::{Connection, DEFAULT_COMMAND_TIMEOUT, ReadyData};

use super::{ControlSurface, Locator, OptionEntry};

// ============================================================================
// RemoteSurface
// ============================================================================

/// A live page driven through the in-page agent.
#[derive(Clone)]
pub struct RemoteSurface {
    connection: Connection,
    ready: ReadyData,
    command_timeout: Duration,
}

impl std::fmt::Debug for RemoteSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSurface")
            .field("session_id", &self.ready.session_id)
            .field("url", &self.ready.url)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteSurface {
    /// Wraps an accepted connection.
    #[must_use]
    pub fn new(connection: Connection, ready: ReadyData) -> Self {
        Self {
            connection,
            ready,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the per-command response timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Returns the handshake data.
    #[inline]
    #[must_use]
    pub fn ready(&self) -> &ReadyData {
        &self.ready
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Closes the session.
    pub fn close(&self) {
        self.connection.shutdown();
    }

    async fn control_command(
        &self,
        command: Command,
        control: &ControlId,
        value: &str,
    ) -> Result<Value> {
        self.connection
            .send(command, self.command_timeout)
            .await?
            .into_control_result(control, value)
    }
}

#[async_trait]
impl ControlSurface for RemoteSurface {
    async fn locate(&self, locator: &Locator) -> Result<Vec<ControlId>> {
        let result = self
            .connection
            .send(Command::Locate(locator.clone()), self.command_timeout)
            .await?
            .into_result()?;

        let ids = result
            .get("controlIds")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(ControlId::new)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }

    async fn read_options(&self, control: &ControlId) -> Result<Vec<OptionEntry>> {
        let command = Command::Options {
            control_id: control.clone(),
        };
        let mut result = self.control_command(command, control, "").await?;

        let options = result
            .get_mut("options")
            .map(Value::take)
            .ok_or_else(|| Error::protocol("control.options response missing options"))?;

        Ok(serde_json::from_value(options)?)
    }

    async fn select(&self, control: &ControlId, value: &str) -> Result<()> {
        let command = Command::Select {
            control_id: control.clone(),
            value: value.to_string(),
        };
        self.control_command(command, control, value).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        let result = self
            .connection
            .send(Command::Screenshot, self.command_timeout)
            .await?
            .into_result()?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::protocol("page.screenshot response missing data"))?;

        let png = Base64Standard
            .decode(data)
            .map_err(|e| Error::protocol(format!("Failed to decode screenshot: {e}")))?;

        debug!(bytes = png.len(), "Screenshot captured");
        Ok(Some(png))
    }
}

// ============================================================================
// Tests
// ============================================================================
