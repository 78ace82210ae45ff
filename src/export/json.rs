//! Nested JSON output.

use std::path::Path;

use tracing::debug;

use crate::accumulator::Tree;
use crate::error::Result;

/// Serializes the tree as a pretty-printed nested mapping in site order.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn to_json_pretty(tree: &Tree) -> Result<String> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Writes [`to_json_pretty`] output to `path`.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) or [`Error::Json`](crate::Error::Json).
pub fn write_json(tree: &Tree, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_json_pretty(tree)?)?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}
