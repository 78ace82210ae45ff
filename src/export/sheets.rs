//! CSV sheets.
//!
//! Two sheets mirror the workbook the portal data was traditionally kept in:
//! a single-column list of zones, and a flat listing with one row per
//! village (or per childless branch).

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::accumulator::Tree;
use crate::error::Result;
use crate::model::Level;

/// File name of the zone list sheet.
pub const ZONES_FILE: &str = "zones.csv";

/// File name of the flat listing sheet.
pub const LISTING_FILE: &str = "listing.csv";

/// Paths written by [`write_sheets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPaths {
    /// Zone list.
    pub zones: PathBuf,
    /// Flat listing.
    pub listing: PathBuf,
}

/// Writes both sheets into `dir`.
///
/// # Errors
///
/// Returns [`Error::Csv`](crate::Error::Csv) or
/// [`Error::Io`](crate::Error::Io) on write failure.
pub fn write_sheets(tree: &Tree, dir: impl AsRef<Path>) -> Result<SheetPaths> {
    let dir = dir.as_ref();
    let zones = dir.join(ZONES_FILE);
    let listing = dir.join(LISTING_FILE);

    write_zones(tree, std::fs::File::create(&zones)?)?;
    write_listing(tree, std::fs::File::create(&listing)?)?;

    debug!(dir = %dir.display(), rows = tree.rows().len(), "Sheets written");
    Ok(SheetPaths { zones, listing })
}

/// Writes the zone column.
///
/// # Errors
///
/// Returns [`Error::Csv`](crate::Error::Csv) on write failure.
pub fn write_zones<W: io::Write>(tree: &Tree, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([Level::Zone.title()])?;
    for zone in tree.branches() {
        wtr.write_record([zone.label.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the flat listing with a `Zone, District, Sub Register Office,
/// Village` header.
///
/// # Errors
///
/// Returns [`Error::Csv`](crate::Error::Csv) on write failure.
pub fn write_listing<W: io::Write>(tree: &Tree, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(Level::ALL.map(Level::title))?;
    for row in tree.rows() {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::export::fixtures;

    fn listing() -> String {
        let mut buf = Vec::new();
        write_listing(&fixtures::tree(), &mut buf).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn test_listing_rows() {
        let text = listing();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Zone,District,Sub Register Office,Village",
                "North,A,A1,V1",
                "North,A,A1,V2",
                "North,B,,",
                "South,,,",
            ]
        );
    }

    #[test]
    fn test_labels_with_commas_are_quoted() {
        let mut branches = fixtures::tree().branches().to_vec();
        branches[1].label = "South, Coastal".to_string();
        let tree = Tree::from_branches(branches);

        let mut buf = Vec::new();
        write_zones(&tree, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text, "Zone\nNorth\n\"South, Coastal\"\n");
    }

    #[test]
    fn test_write_sheets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = write_sheets(&fixtures::tree(), dir.path()).expect("write");

        let zones = std::fs::read_to_string(&paths.zones).expect("read");
        assert_eq!(zones.lines().count(), 3);
        let listing = std::fs::read_to_string(&paths.listing).expect("read");
        assert_eq!(listing.lines().count(), 5);
    }
}
