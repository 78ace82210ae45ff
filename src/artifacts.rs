//! Failure screenshots.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::Level;
use crate::surface::ControlSurface;

// ============================================================================
// ScreenshotStore
// ============================================================================

/// Writes page captures taken when a branch fails.
///
/// Files are named `screenshot_<level>_<path>_<YYYYmmdd_HHMMSS>.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    /// Creates a store writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the output directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures the page and saves it, returning the file path.
    ///
    /// Never fails: capture or write errors are logged and yield `None`.
    pub async fn capture<S>(&self, surface: &S, level: Level, labels: &[String]) -> Option<PathBuf>
    where
        S: ControlSurface + ?Sized,
    {
        let png = match surface.screenshot().await {
            Ok(Some(png)) => png,
            Ok(None) => {
                debug!("Surface cannot capture screenshots");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Screenshot capture failed");
                return None;
            }
        };

        match self.save(level, labels, &png).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, dir = %self.dir.display(), "Failed to save screenshot");
                None
            }
        }
    }

    /// Saves PNG bytes under a generated file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the directory or file cannot
    /// be written.
    pub async fn save(&self, level: Level, labels: &[String], png: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name(level, labels));
        tokio::fs::write(&path, png).await?;
        debug!(path = %path.display(), bytes = png.len(), "Saved screenshot");
        Ok(path)
    }
}

fn file_name(level: Level, labels: &[String]) -> String {
    let trail = labels
        .iter()
        .map(|l| sanitize(l))
        .collect::<Vec<_>>()
        .join("-");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("screenshot_{}_{trail}_{stamp}.png", level.key())
}

/// Keeps alphanumerics, replaces everything else with `_`.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
