//! Harvest exporters.
//!
//! | Module | Output |
//! |--------|--------|
//! | `summary` | Indented plain-text report |
//! | `sheets` | `zones.csv` and `listing.csv` |
//! | `json` | Nested mapping, pretty-printed |
//! | `workbook` | `harvest.xlsx` with named lists and a zone dropdown |
//!
//! [`export_all`] writes every format into one directory.

// ============================================================================
// Submodules
// ============================================================================

/// Nested JSON output.
pub mod json;

/// CSV sheets.
pub mod sheets;

/// Plain-text summary.
pub mod summary;

/// Excel workbook.
pub mod workbook;

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use tracing::info;

use crate::accumulator::Tree;
use crate::error::Result;

pub use json::{to_json_pretty, write_json};
pub use sheets::{SheetPaths, write_listing, write_sheets, write_zones};
pub use summary::{render_summary, write_summary};
pub use workbook::{ListColumn, build_workbook, list_columns, sanitize_name, write_workbook};

// ============================================================================
// Constants
// ============================================================================

/// File name of the text summary.
pub const SUMMARY_FILE: &str = "summary.txt";

/// File name of the JSON export.
pub const JSON_FILE: &str = "harvest.json";

/// File name of the Excel workbook.
pub const WORKBOOK_FILE: &str = "harvest.xlsx";

// ============================================================================
// ExportReport
// ============================================================================

/// Files written by [`export_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Text summary.
    pub summary: PathBuf,
    /// CSV sheets.
    pub sheets: SheetPaths,
    /// Nested JSON.
    pub json: PathBuf,
    /// Excel workbook.
    pub workbook: PathBuf,
}

/// Writes the summary, both sheets, the JSON mapping and the workbook into
/// `dir`.
///
/// The directory is created if missing.
///
/// # Errors
///
/// Returns the first IO, CSV, JSON or workbook error encountered.
pub fn export_all(tree: &Tree, dir: impl AsRef<Path>) -> Result<ExportReport> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let summary = dir.join(SUMMARY_FILE);
    write_summary(tree, &summary)?;
    let sheets = write_sheets(tree, dir)?;
    let json = dir.join(JSON_FILE);
    write_json(tree, &json)?;
    let workbook = dir.join(WORKBOOK_FILE);
    write_workbook(tree, &workbook)?;

    info!(
        dir = %dir.display(),
        zones = tree.len(),
        villages = tree.village_count(),
        "Harvest exported"
    );

    Ok(ExportReport {
        summary,
        sheets,
        json,
        workbook,
    })
}

// ============================================================================
// Test Fixtures
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_all_writes_every_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("out");

        let report = export_all(&fixtures::tree(), &out)?;

        for path in [
            &report.summary,
            &report.sheets.zones,
            &report.sheets.listing,
            &report.json,
            &report.workbook,
        ] {
            assert!(path.starts_with(&out), "{} outside export dir", path.display());
            assert!(path.is_file(), "{} missing", path.display());
        }

        let text = std::fs::read_to_string(&report.json)?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["North"]["A"]["A1"][1], "V2");
        Ok(())
    }
}
