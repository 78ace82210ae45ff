//! Per-level locator candidate lists.

use serde::{Deserialize, Serialize};

use crate::model::Level;
use crate::surface::Locator;

// ============================================================================
// SelectorTable
// ============================================================================

/// Ordered locator candidates for each level's control.
///
/// The resolver tries candidates front to back and keeps the first one that
/// matches exactly one control, so the most specific locator goes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorTable {
    /// Zone control candidates.
    pub zone: Vec<Locator>,
    /// District control candidates.
    pub district: Vec<Locator>,
    /// Sub-registrar-office control candidates.
    pub sub_registrar_office: Vec<Locator>,
    /// Village control candidates.
    pub village: Vec<Locator>,
}

impl SelectorTable {
    /// Creates a table with one candidate per level.
    #[must_use]
    pub fn single(
        zone: Locator,
        district: Locator,
        sub_registrar_office: Locator,
        village: Locator,
    ) -> Self {
        Self {
            zone: vec![zone],
            district: vec![district],
            sub_registrar_office: vec![sub_registrar_office],
            village: vec![village],
        }
    }

    /// Returns the candidates for a level.
    #[must_use]
    pub fn candidates(&self, level: Level) -> &[Locator] {
        match level {
            Level::Zone => &self.zone,
            Level::District => &self.district,
            Level::SubRegistrarOffice => &self.sub_registrar_office,
            Level::Village => &self.village,
        }
    }

    /// Returns the candidates for a level, mutably.
    pub fn candidates_mut(&mut self, level: Level) -> &mut Vec<Locator> {
        match level {
            Level::Zone => &mut self.zone,
            Level::District => &mut self.district,
            Level::SubRegistrarOffice => &mut self.sub_registrar_office,
            Level::Village => &mut self.village,
        }
    }

    /// Inserts a candidate ahead of the existing ones.
    pub fn prepend(&mut self, level: Level, locator: Locator) {
        self.candidates_mut(level).insert(0, locator);
    }
}

impl Default for SelectorTable {
    /// Candidates matching the registration portal's dropdown markup.
    fn default() -> Self {
        Self {
            zone: xpaths(&[
                "//select[contains(@name, 'zone') or contains(@id, 'zone')]",
                "//select[contains(@name, 'Zone') or contains(@id, 'Zone')]",
                "//select[contains(@class, 'zone')]",
            ]),
            district: xpaths(&[
                "//select[contains(@name, 'district') or contains(@id, 'district')]",
                "//select[contains(@name, 'District') or contains(@id, 'District')]",
                "//select[contains(@class, 'district')]",
            ]),
            sub_registrar_office: xpaths(&[
                "//select[contains(@name, 'sub') or contains(@id, 'sub') or contains(@name, 'register') or contains(@id, 'register')]",
                "//select[contains(@name, 'Sub') or contains(@id, 'Sub') or contains(@name, 'Register') or contains(@id, 'Register')]",
                "//select[contains(@class, 'sub') or contains(@class, 'register')]",
            ]),
            village: xpaths(&[
                "//select[contains(@name, 'village') or contains(@id, 'village')]",
                "//select[contains(@name, 'Village') or contains(@id, 'Village')]",
                "//select[contains(@class, 'village')]",
            ]),
        }
    }
}

fn xpaths(exprs: &[&str]) -> Vec<Locator> {
    exprs.iter().map(|e| Locator::xpath(*e)).collect()
}

// ============================================================================
// Tests
// ============================================================================
