//! Plain-text summary.
//!
//! ```text
//! Cascade Harvest - Dropdown Data Summary
//! ==================================================
//! Extraction Date: 2025-01-31 14:02:11
//! Total Zones: 2
//!
//! ZONE: North
//! ------------------------------
//!   DISTRICT: A
//!     SUB REGISTER: A1
//!       VILLAGES (2): V1, V2
//! ```

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::accumulator::{Branch, Tree};
use crate::error::Result;

const TITLE: &str = "Cascade Harvest - Dropdown Data Summary";
const PARTIAL_NOTE: &str = " [partial]";

/// Renders the summary with the given extraction time.
#[must_use]
pub fn render_summary(tree: &Tree, extracted_at: DateTime<Local>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, tree, extracted_at);
    out
}

/// Renders the summary stamped with the current time and writes it to `path`.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file cannot be written.
pub fn write_summary(tree: &Tree, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, render_summary(tree, Local::now()))?;
    debug!(path = %path.display(), "Summary written");
    Ok(())
}

fn write_report(out: &mut String, tree: &Tree, extracted_at: DateTime<Local>) -> std::fmt::Result {
    writeln!(out, "{TITLE}")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(
        out,
        "Extraction Date: {}",
        extracted_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "Total Zones: {}", tree.len())?;
    writeln!(out, "Total Villages: {}", tree.village_count())?;
    writeln!(out)?;

    for zone in tree.branches() {
        writeln!(out, "ZONE: {}{}", zone.label, note(zone))?;
        writeln!(out, "{}", "-".repeat(30))?;

        for district in &zone.children {
            writeln!(out, "  DISTRICT: {}{}", district.label, note(district))?;

            for office in &district.children {
                writeln!(out, "    SUB REGISTER: {}{}", office.label, note(office))?;

                if !office.children.is_empty() {
                    let villages: Vec<&str> = office
                        .children
                        .iter()
                        .map(|v| v.label.as_str())
                        .collect();
                    writeln!(
                        out,
                        "      VILLAGES ({}): {}",
                        villages.len(),
                        villages.join(", ")
                    )?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn note(branch: &Branch) -> &'static str {
    if branch.is_partial() { PARTIAL_NOTE } else { "" }
}

// ============================================================================
// Tests
// ============================================================================
