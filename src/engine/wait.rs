//! Stabilization waits.
//!
//! After a selection, the dependent control repopulates asynchronously. The
//! policy polls the control until its cleaned option list is non-empty and
//! differs from the snapshot taken before the selection. Every sleep is
//! raced against the cancellation token.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::{OptionCleaner, TraversalConfig};
use crate::error::{Error, Result};
use crate::model::Node;
use crate::surface::ControlSurface;

use super::resolver::ControlHandle;

// ============================================================================
// StabilizationPolicy
// ============================================================================

/// Timing and cleanup used while waiting on a dependent control.
#[derive(Debug, Clone)]
pub struct StabilizationPolicy {
    timeout: Duration,
    poll_interval: Duration,
    cleaner: OptionCleaner,
}

impl StabilizationPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration, cleaner: OptionCleaner) -> Self {
        Self {
            timeout,
            poll_interval,
            cleaner,
        }
    }

    /// Builds the policy a traversal configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the option filter does not compile.
    pub fn from_config(config: &TraversalConfig) -> Result<Self> {
        Ok(Self::new(
            config.stabilization_timeout(),
            config.poll_interval(),
            config.option_filter.compile()?,
        ))
    }

    /// Returns the stabilization timeout.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads the control once and cleans the result.
    ///
    /// # Errors
    ///
    /// Propagates surface errors.
    pub async fn snapshot<S>(&self, surface: &S, control: &ControlHandle) -> Result<Vec<Node>>
    where
        S: ControlSurface + ?Sized,
    {
        let raw = surface.read_options(&control.id).await?;
        Ok(self.cleaner.clean(control.level, raw))
    }

    /// Waits until the control shows a non-empty option list different from
    /// `previous`, and returns it in display order.
    ///
    /// # Errors
    ///
    /// - [`Error::StabilizationTimeout`] if the list never changes in time
    /// - [`Error::Cancelled`] if `cancel` fires
    /// - Surface errors from reading the control
    pub async fn await_options<S>(
        &self,
        surface: &S,
        control: &ControlHandle,
        previous: &[Node],
        cancel: &CancellationToken,
    ) -> Result<Vec<Node>>
    where
        S: ControlSurface + ?Sized,
    {
        let deadline = Instant::now() + self.timeout;
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let options = self.snapshot(surface, control).await?;
            polls += 1;
            if !options.is_empty() && options != previous {
                trace!(level = %control.level, options = options.len(), polls, "Options stabilized");
                return Ok(options);
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(control));
            }
            self.pause_until(deadline, cancel).await?;
        }
    }

    /// Waits until the control offers an option with `value`.
    ///
    /// # Errors
    ///
    /// Same as [`await_options`](Self::await_options).
    pub async fn await_value<S>(
        &self,
        surface: &S,
        control: &ControlHandle,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: ControlSurface + ?Sized,
    {
        let deadline = Instant::now() + self.timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let raw = surface.read_options(&control.id).await?;
            if raw.iter().any(|o| o.value == value) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(control));
            }
            self.pause_until(deadline, cancel).await?;
        }
    }

    async fn pause_until(&self, deadline: Instant, cancel: &CancellationToken) -> Result<()> {
        let left = deadline.saturating_duration_since(Instant::now());
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = sleep(self.poll_interval.min(left)) => Ok(()),
        }
    }

    fn timed_out(&self, control: &ControlHandle) -> Error {
        Error::stabilization_timeout(control.level, self.timeout.as_millis() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
