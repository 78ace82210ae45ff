//! Traversal configuration.
//!
//! Provides the static parameters the engine runs with: locator candidates,
//! wait timings, retry budget and option cleanup rules.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cascade_harvest::TraversalConfig;
//!
//! let config = TraversalConfig::from_json_file("harvest.json")?
//!     .with_stabilization_timeout(Duration::from_secs(20))
//!     .with_retry_budget(5);
//! config.validate()?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Option list cleanup.
pub mod filter;

/// Per-level locator candidates.
pub mod selectors;

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Level;

pub use filter::{OptionCleaner, OptionFilter};
pub use selectors::SelectorTable;

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_STABILIZATION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_RETRY_BUDGET: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

// ============================================================================
// TraversalConfig
// ============================================================================

/// Static parameters of one traversal.
///
/// Durations are stored in milliseconds so configuration files stay plain
/// numbers; use the `Duration` accessors in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Ordered locator candidates per level.
    pub selectors: SelectorTable,

    /// How long to wait for a dependent control to repopulate.
    pub stabilization_timeout_ms: u64,

    /// Delay between option reads while waiting.
    pub poll_interval_ms: u64,

    /// Recoverable failures tolerated per node before the branch is abandoned.
    pub retry_budget_per_node: u32,

    /// Pause before retrying a node.
    pub retry_delay_ms: u64,

    /// Issue a selection on each village instead of only reading its label.
    pub select_leaves: bool,

    /// Option cleanup rules.
    pub option_filter: OptionFilter,

    /// Capture a screenshot whenever a branch fails.
    pub screenshot_on_failure: bool,

    /// Directory failure screenshots are written to.
    pub screenshot_dir: PathBuf,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorTable::default(),
            stabilization_timeout_ms: DEFAULT_STABILIZATION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_budget_per_node: DEFAULT_RETRY_BUDGET,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            select_leaves: false,
            option_filter: OptionFilter::default(),
            screenshot_on_failure: false,
            screenshot_dir: PathBuf::from("."),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl TraversalConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Json`] if
    /// it is malformed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading traversal config");
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TraversalConfig {
    /// Replaces the selector table.
    #[inline]
    #[must_use]
    pub fn with_selectors(mut self, selectors: SelectorTable) -> Self {
        self.selectors = selectors;
        self
    }

    /// Sets the stabilization timeout.
    #[inline]
    #[must_use]
    pub fn with_stabilization_timeout(mut self, timeout: Duration) -> Self {
        self.stabilization_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the poll interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the per-node retry budget.
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget_per_node = budget;
        self
    }

    /// Sets the delay before a retry.
    #[inline]
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enables selecting each village.
    #[inline]
    #[must_use]
    pub fn with_leaf_selection(mut self) -> Self {
        self.select_leaves = true;
        self
    }

    /// Replaces the option cleanup rules.
    #[inline]
    #[must_use]
    pub fn with_option_filter(mut self, filter: OptionFilter) -> Self {
        self.option_filter = filter;
        self
    }

    /// Enables failure screenshots written to `dir`.
    #[inline]
    #[must_use]
    pub fn with_screenshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_on_failure = true;
        self.screenshot_dir = dir.into();
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl TraversalConfig {
    /// Returns the stabilization timeout.
    #[inline]
    #[must_use]
    pub fn stabilization_timeout(&self) -> Duration {
        Duration::from_millis(self.stabilization_timeout_ms)
    }

    /// Returns the poll interval.
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the retry delay.
    #[inline]
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl TraversalConfig {
    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.stabilization_timeout_ms == 0 {
            problems.push("stabilization timeout must be positive".to_string());
        }
        if self.poll_interval_ms == 0 {
            problems.push("poll interval must be positive".to_string());
        }
        if self.poll_interval_ms > self.stabilization_timeout_ms {
            problems.push("poll interval must not exceed the stabilization timeout".to_string());
        }
        if self.retry_budget_per_node == 0 {
            problems.push("retry budget must be at least 1".to_string());
        }

        for level in Level::ALL {
            let candidates = self.selectors.candidates(level);
            if candidates.is_empty() {
                problems.push(format!("selectors for {} must be a non-empty list", level.key()));
            } else if candidates.iter().any(|c| c.is_blank()) {
                problems.push(format!("selectors for {} contain a blank locator", level.key()));
            }
        }

        if let Err(e) = self.option_filter.compile() {
            problems.push(e.to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(problems.join("; ")))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
