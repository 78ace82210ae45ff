//! Option list cleanup.
//!
//! Dropdowns carry placeholder entries ("--Select--"), stray whitespace and
//! occasionally repeated labels. [`OptionFilter`] is the serializable policy;
//! [`OptionCleaner`] is its compiled form applied to every option read.

use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Level, Node};
use crate::surface::OptionEntry;

// ============================================================================
// Constants
// ============================================================================

/// Matches "select", "--Select--", "-- choose --", "---" and blank labels.
const DEFAULT_PLACEHOLDER_PATTERN: &str = r"^[\s\-]*(select|choose)?[\s\-]*$";

// ============================================================================
// OptionFilter
// ============================================================================

/// Cleanup rules for option lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionFilter {
    /// Trim leading and trailing whitespace from labels.
    pub trim_whitespace: bool,

    /// Collapse internal whitespace runs to a single space.
    pub collapse_whitespace: bool,

    /// Case-insensitive pattern for placeholder labels to skip.
    pub placeholder_pattern: String,

    /// Skip options whose underlying value is empty.
    pub skip_empty_values: bool,

    /// Keep only the first option for each label.
    pub remove_duplicates: bool,
}

impl Default for OptionFilter {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            collapse_whitespace: true,
            placeholder_pattern: DEFAULT_PLACEHOLDER_PATTERN.to_string(),
            skip_empty_values: false,
            remove_duplicates: true,
        }
    }
}

impl OptionFilter {
    /// Compiles the filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the placeholder pattern is not a valid regex.
    pub fn compile(&self) -> Result<OptionCleaner> {
        let placeholder = RegexBuilder::new(&self.placeholder_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::config(format!("invalid placeholder pattern: {e}")))?;

        Ok(OptionCleaner {
            rules: self.clone(),
            placeholder,
        })
    }
}

// ============================================================================
// OptionCleaner
// ============================================================================

/// Compiled [`OptionFilter`].
#[derive(Debug, Clone)]
pub struct OptionCleaner {
    rules: OptionFilter,
    placeholder: Regex,
}

impl OptionCleaner {
    /// Turns raw options into nodes, preserving display order.
    #[must_use]
    pub fn clean(&self, level: Level, raw: Vec<OptionEntry>) -> Vec<Node> {
        let mut seen = FxHashSet::default();
        let mut nodes = Vec::with_capacity(raw.len());

        for entry in raw {
            let label = self.normalize(&entry.label);

            if label.is_empty() || self.placeholder.is_match(&label) {
                continue;
            }
            if self.rules.skip_empty_values && entry.value.trim().is_empty() {
                continue;
            }
            if self.rules.remove_duplicates && !seen.insert(label.clone()) {
                continue;
            }

            nodes.push(Node::new(level, label, entry.value));
        }

        nodes
    }

    fn normalize(&self, label: &str) -> String {
        if self.rules.collapse_whitespace {
            label.split_whitespace().collect::<Vec<_>>().join(" ")
        } else if self.rules.trim_whitespace {
            label.trim().to_string()
        } else {
            label.to_string()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<OptionEntry> {
        pairs
            .iter()
            .map(|(label, value)| OptionEntry::new(*label, *value))
            .collect()
    }

    fn labels(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.label.as_str()).collect()
    }

    #[test]
    fn test_skips_placeholders() {
        let cleaner = OptionFilter::default().compile().expect("compile");
        let raw = entries(&[
            ("--Select--", ""),
            ("Chennai", "1"),
            ("---", "0"),
            (" -- Choose -- ", "0"),
            ("select", ""),
            ("Madurai", "2"),
        ]);
        let nodes = cleaner.clean(Level::Zone, raw);
        assert_eq!(labels(&nodes), vec!["Chennai", "Madurai"]);
    }

    #[test]
    fn test_placeholder_pattern_keeps_real_labels_containing_select() {
        let cleaner = OptionFilter::default().compile().expect("compile");
        let nodes = cleaner.clean(Level::Village, entries(&[("Selectpuram", "9")]));
        assert_eq!(labels(&nodes), vec!["Selectpuram"]);
    }

    #[test]
    fn test_whitespace_normalized() {
        let cleaner = OptionFilter::default().compile().expect("compile");
        let nodes = cleaner.clean(Level::District, entries(&[("  South\n  Chennai ", "4")]));
        assert_eq!(labels(&nodes), vec!["South Chennai"]);
        assert_eq!(nodes[0].value, "4");
        assert_eq!(nodes[0].level, Level::District);
    }

    #[test]
    fn test_duplicates_first_wins() {
        let cleaner = OptionFilter::default().compile().expect("compile");
        let nodes = cleaner.clean(Level::Village, entries(&[("V1", "1"), ("V1", "2"), ("V2", "3")]));
        assert_eq!(labels(&nodes), vec!["V1", "V2"]);
        assert_eq!(nodes[0].value, "1");
    }

    #[test]
    fn test_duplicates_kept_when_disabled() {
        let filter = OptionFilter {
            remove_duplicates: false,
            ..OptionFilter::default()
        };
        let cleaner = filter.compile().expect("compile");
        let nodes = cleaner.clean(Level::Village, entries(&[("V1", "1"), ("V1", "2")]));
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_skip_empty_values() {
        let filter = OptionFilter {
            skip_empty_values: true,
            ..OptionFilter::default()
        };
        let cleaner = filter.compile().expect("compile");
        let nodes = cleaner.clean(Level::Zone, entries(&[("North", ""), ("South", "2")]));
        assert_eq!(labels(&nodes), vec!["South"]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let filter = OptionFilter {
            placeholder_pattern: "(unclosed".to_string(),
            ..OptionFilter::default()
        };
        let err = filter.compile().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
