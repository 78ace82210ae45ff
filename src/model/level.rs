//! Hierarchy levels.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Level
// ============================================================================

/// Rank in the four-level hierarchy.
///
/// Ordered `Zone < District < SubRegistrarOffice < Village`. Village is the
/// only terminal level; every other level owns a dependent control below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Top level.
    Zone,
    /// Second level, repopulated by a zone selection.
    District,
    /// Third level, repopulated by a district selection.
    SubRegistrarOffice,
    /// Leaf level, repopulated by a sub-registrar-office selection.
    Village,
}

impl Level {
    /// All levels, top first.
    pub const ALL: [Level; 4] = [
        Level::Zone,
        Level::District,
        Level::SubRegistrarOffice,
        Level::Village,
    ];

    /// Returns the 1-based rank (Zone = 1, Village = 4).
    ///
    /// A path positioned at this level has exactly `rank()` nodes.
    #[inline]
    #[must_use]
    pub const fn rank(self) -> usize {
        match self {
            Self::Zone => 1,
            Self::District => 2,
            Self::SubRegistrarOffice => 3,
            Self::Village => 4,
        }
    }

    /// Returns the level with the given rank.
    #[must_use]
    pub const fn from_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(Self::Zone),
            2 => Some(Self::District),
            3 => Some(Self::SubRegistrarOffice),
            4 => Some(Self::Village),
            _ => None,
        }
    }

    /// Returns the dependent level, or `None` for Village.
    #[inline]
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        Self::from_rank(self.rank() + 1)
    }

    /// Returns the controlling level, or `None` for Zone.
    #[inline]
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        Self::from_rank(self.rank() - 1)
    }

    /// Returns `true` for the terminal level.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Village)
    }

    /// Returns the snake_case key used in configuration files.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Zone => "zone",
            Self::District => "district",
            Self::SubRegistrarOffice => "sub_registrar_office",
            Self::Village => "village",
        }
    }

    /// Returns the human-readable column title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Zone => "Zone",
            Self::District => "District",
            Self::SubRegistrarOffice => "Sub Register Office",
            Self::Village => "Village",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ============================================================================
// Tests
// ============================================================================
