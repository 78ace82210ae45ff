//! Excel workbook with a cascading dropdown form.
//!
//! | Sheet | Content |
//! |-------|---------|
//! | `Form` | Styled level headers, a zone dropdown on `A2:A1000`, instructions |
//! | `Lists` | One column per sibling set, each behind a defined name |
//!
//! Defined names follow the hierarchy: `ZoneList` for the zones, then the
//! sanitized zone label for its districts, `<zone>_<district>` for the
//! offices and `<zone>_<district>_<office>` for the villages. A list
//! formula such as `=INDIRECT(A2)` in a neighbouring column therefore
//! resolves the next level.

use std::path::Path;

use chrono::{DateTime, Local};
use rust_xlsxwriter::utility::column_number_to_name;
use rust_xlsxwriter::{
    Color, ColNum, DataValidation, Format, FormatAlign, Formula, Workbook, Worksheet,
};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::accumulator::{Branch, Tree};
use crate::error::Result;
use crate::model::Level;

// ============================================================================
// Constants
// ============================================================================

/// Name of the sheet holding the dropdown form.
pub const FORM_SHEET: &str = "Form";

/// Name of the sheet holding the option lists.
pub const LISTS_SHEET: &str = "Lists";

/// Defined name of the zone list.
pub const ZONE_LIST_NAME: &str = "ZoneList";

/// Last 1-based row covered by the zone dropdown.
pub const MAX_DROPDOWN_ROWS: u32 = 1000;

/// Longest defined name Excel accepts.
const MAX_NAME_LEN: usize = 255;

const HEADER_FILL: u32 = 0x0036_6092;
const HEADER_FONT_SIZE: u8 = 12;

/// Column of the instruction block on the form.
const INSTRUCTIONS_COL: ColNum = 5;

// ============================================================================
// ListColumn
// ============================================================================

/// One sibling set on the `Lists` sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListColumn {
    /// Defined name pointing at the values.
    pub name: String,
    /// Labels in site order.
    pub values: Vec<String>,
}

/// Lays out the `Lists` sheet, zones first, then every non-empty sibling set
/// in depth-first order.
///
/// Sets whose sanitized name is already taken are skipped.
#[must_use]
pub fn list_columns(tree: &Tree) -> Vec<ListColumn> {
    let mut columns = Vec::new();
    let mut taken = FxHashSet::default();

    push_column(&mut columns, &mut taken, ZONE_LIST_NAME.to_string(), tree.branches());
    for zone in tree.branches() {
        push_column(&mut columns, &mut taken, sanitize_name(&zone.label), &zone.children);
        for district in &zone.children {
            let key = format!("{}_{}", zone.label, district.label);
            push_column(&mut columns, &mut taken, sanitize_name(&key), &district.children);
            for office in &district.children {
                let key = format!("{}_{}_{}", zone.label, district.label, office.label);
                push_column(&mut columns, &mut taken, sanitize_name(&key), &office.children);
            }
        }
    }

    columns
}

fn push_column(
    columns: &mut Vec<ListColumn>,
    taken: &mut FxHashSet<String>,
    name: String,
    children: &[Branch],
) {
    if children.is_empty() {
        return;
    }
    if !taken.insert(name.clone()) {
        warn!(name = %name, "Duplicate list name, sibling set skipped");
        return;
    }
    columns.push(ListColumn {
        name,
        values: children.iter().map(|b| b.label.clone()).collect(),
    });
}

// ============================================================================
// Names
// ============================================================================

/// Turns a label into a valid Excel defined name.
///
/// Everything outside `[A-Za-z0-9_]` becomes `_`, names that do not start
/// with a letter or `_` or that read as a cell reference get a leading `_`,
/// and the result is cut to 255 characters.
#[must_use]
pub fn sanitize_name(label: &str) -> String {
    let mut name: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || looks_like_cell_ref(&name) {
        name.insert(0, '_');
    }

    name.truncate(MAX_NAME_LEN);
    name
}

/// `A1` style (`AB12`) or `R1C1` style (`R`, `C`, `R2C3`) references.
fn looks_like_cell_ref(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());

    let letters = upper.chars().take_while(char::is_ascii_alphabetic).count();
    let row = &upper[letters..];
    let a1 = (1..=3).contains(&letters) && !row.is_empty() && all_digits(row);

    let r1c1 = match upper.strip_prefix('R') {
        Some(rest) => {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            rest.is_empty() || rest.strip_prefix('C').is_some_and(all_digits)
        }
        None => upper.strip_prefix('C').is_some_and(all_digits),
    };

    a1 || r1c1
}

// ============================================================================
// Writing
// ============================================================================

/// Writes the workbook stamped with the current time to `path`.
///
/// # Errors
///
/// Returns [`Error::Xlsx`](crate::Error::Xlsx) if the workbook cannot be
/// built or saved.
pub fn write_workbook(tree: &Tree, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut workbook = build_workbook(tree, Local::now())?;
    workbook.save(path)?;
    debug!(path = %path.display(), "Workbook written");
    Ok(())
}

/// Builds the in-memory workbook.
///
/// # Errors
///
/// Returns [`Error::Xlsx`](crate::Error::Xlsx) if a name, range or cell is
/// rejected.
pub fn build_workbook(tree: &Tree, extracted_at: DateTime<Local>) -> Result<Workbook> {
    let columns = list_columns(tree);

    let mut workbook = Workbook::new();
    workbook.push_worksheet(form_sheet(tree, extracted_at)?);
    workbook.push_worksheet(lists_sheet(&columns)?);

    for (col, column) in (0..).zip(&columns) {
        let letter = column_number_to_name(col);
        let last = column.values.len() + 1;
        let range = format!("={LISTS_SHEET}!${letter}$2:${letter}${last}");
        workbook.define_name(&column.name, &range)?;
    }

    Ok(workbook)
}

fn form_sheet(tree: &Tree, extracted_at: DateTime<Local>) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name(FORM_SHEET)?;

    let header = Format::new()
        .set_bold()
        .set_font_size(HEADER_FONT_SIZE)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center);

    for (col, level) in (0..).zip(Level::ALL) {
        sheet.write_string_with_format(0, col, level.title(), &header)?;
        sheet.set_column_width(col, 24)?;
    }

    // An empty tree has no ZoneList to point at.
    if !tree.is_empty() {
        let zones = DataValidation::new()
            .allow_list_formula(Formula::new(format!("={ZONE_LIST_NAME}")));
        sheet.add_data_validation(1, 0, MAX_DROPDOWN_ROWS - 1, 0, &zones)?;
    }

    let instructions = [
        "Instructions:".to_string(),
        "1. Select a Zone from the dropdown in column A".to_string(),
        format!("2. Check the '{LISTS_SHEET}' sheet for available options"),
        "3. Lists are named <zone>, <zone>_<district> and <zone>_<district>_<office>".to_string(),
        format!("4. Total zones extracted: {}", tree.len()),
        format!(
            "5. Extraction completed: {}",
            extracted_at.format("%Y-%m-%d %H:%M:%S")
        ),
    ];
    for (row, line) in (2..).zip(instructions) {
        sheet.write_string(row, INSTRUCTIONS_COL, line)?;
    }

    Ok(sheet)
}

fn lists_sheet(columns: &[ListColumn]) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name(LISTS_SHEET)?;

    for (col, column) in (0..).zip(columns) {
        sheet.write_string(0, col, column.name.as_str())?;
        for (row, value) in (1..).zip(&column.values) {
            sheet.write_string(row, col, value.as_str())?;
        }
    }

    Ok(sheet)
}

// ============================================================================
// Tests
// ============================================================================
