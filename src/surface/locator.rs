//! Control locator strategies.
//!
//! Locators are the candidates the selector resolver tries, in order, for
//! each hierarchy level.
//!
//! # Example
//!
//! ```ignore
//! use cascade_harvest::Locator;
//!
//! // XPath (what the default configuration uses)
//! let zone = Locator::xpath("//select[contains(@id, 'zone')]");
//!
//! // CSS selector
//! let district = Locator::css("select#cmbDistrict");
//!
//! // By name attribute
//! let village = Locator::name("village");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Locator Enum
// ============================================================================

/// Strategy for finding a control on the page.
///
/// Serialized as `{"strategy": "...", "value": "..."}` both in configuration
/// files and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value")]
pub enum Locator {
    /// CSS selector.
    #[serde(rename = "css")]
    Css(String),

    /// XPath expression.
    #[serde(rename = "xpath")]
    XPath(String),

    /// Element ID (shorthand for `#id`).
    #[serde(rename = "id")]
    Id(String),

    /// Name attribute.
    #[serde(rename = "name")]
    Name(String),

    /// Class name (single class).
    #[serde(rename = "class")]
    Class(String),
}

impl Locator {
    /// Creates a CSS locator.
    #[inline]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an XPath locator.
    #[inline]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Creates an ID locator.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a name attribute locator.
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a class name locator.
    #[inline]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Returns the strategy name for the protocol.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::Name(_) => "name",
            Self::Class(_) => "class",
        }
    }

    /// Returns the locator value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::XPath(v) | Self::Id(v) | Self::Name(v) | Self::Class(v) => v,
        }
    }

    /// Returns `true` if the locator value is blank.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.value().trim().is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

impl From<&str> for Locator {
    /// Converts a string to an XPath locator (the default strategy).
    fn from(s: &str) -> Self {
        Self::XPath(s.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath() {
        let locator = Locator::xpath("//select[@id='zone']");
        assert_eq!(locator.strategy(), "xpath");
        assert_eq!(locator.value(), "//select[@id='zone']");
    }

    #[test]
    fn test_display() {
        assert_eq!(Locator::name("district").to_string(), "name:district");
    }

    #[test]
    fn test_from_str_is_xpath() {
        let locator: Locator = "//select".into();
        assert!(matches!(locator, Locator::XPath(_)));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Locator::css("#zone")).expect("serialize");
        assert_eq!(json, r##"{"strategy":"css","value":"#zone"}"##);

        let parsed: Locator =
            serde_json::from_str(r#"{"strategy":"id","value":"village"}"#).expect("parse");
        assert_eq!(parsed, Locator::id("village"));
    }

    #[test]
    fn test_blank() {
        assert!(Locator::css("  ").is_blank());
        assert!(!Locator::css("select").is_blank());
    }
}
