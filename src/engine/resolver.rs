//! Selector resolution.
//!
//! Maps a [`Level`] to a live control by trying the configured locator
//! candidates in order. The first candidate that matches exactly one control
//! wins; candidates matching nothing or several controls are skipped.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::SelectorTable;
use crate::error::{Error, Result};
use crate::identifiers::ControlId;
use crate::model::Level;
use crate::surface::{ControlSurface, Locator};

// ============================================================================
// ControlHandle
// ============================================================================

/// Resolved reference to the control of one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHandle {
    /// Surface-side control ID.
    pub id: ControlId,
    /// Level the control serves.
    pub level: Level,
    /// Candidate that found it.
    pub locator: Locator,
}

// ============================================================================
// SelectorResolver
// ============================================================================

/// Resolves and caches one control handle per level.
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    selectors: SelectorTable,
    cache: FxHashMap<Level, ControlHandle>,
}

impl SelectorResolver {
    /// Creates a resolver over the given candidates.
    #[must_use]
    pub fn new(selectors: SelectorTable) -> Self {
        Self {
            selectors,
            cache: FxHashMap::default(),
        }
    }

    /// Returns the control for `level`, locating it if not cached.
    ///
    /// # Errors
    ///
    /// - [`Error::NoMatchingSelector`] if no candidate matches exactly one control
    /// - Any error the surface reports while locating
    pub async fn resolve<S>(&mut self, surface: &S, level: Level) -> Result<ControlHandle>
    where
        S: ControlSurface + ?Sized,
    {
        if let Some(handle) = self.cache.get(&level) {
            return Ok(handle.clone());
        }

        let candidates = self.selectors.candidates(level);
        for locator in candidates {
            let found = surface.locate(locator).await?;
            trace!(%level, %locator, matches = found.len(), "Tried locator");

            if let [id] = found.as_slice() {
                let handle = ControlHandle {
                    id: id.clone(),
                    level,
                    locator: locator.clone(),
                };
                debug!(%level, %locator, control = %handle.id, "Resolved control");
                self.cache.insert(level, handle.clone());
                return Ok(handle);
            }
        }

        Err(Error::no_matching_selector(level, candidates.len()))
    }

    /// Returns the cached handle for `level`.
    #[inline]
    #[must_use]
    pub fn cached(&self, level: Level) -> Option<&ControlHandle> {
        self.cache.get(&level)
    }

    /// Drops every cached handle.
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            trace!(cached = self.cache.len(), "Invalidating resolved controls");
            self.cache.clear();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::memory::{MemorySurface, SiteNode};

    fn surface() -> MemorySurface {
        MemorySurface::new(vec![SiteNode::new("North", "1")])
    }

    #[tokio::test]
    async fn test_first_unique_candidate_wins() {
        let surface = surface();
        let table = SelectorTable::single(
            Locator::id("zone"),
            Locator::id("district"),
            Locator::id("sub_registrar_office"),
            Locator::id("village"),
        );
        let mut resolver = SelectorResolver::new(table);

        let handle = resolver.resolve(&surface, Level::District).await.expect("resolve");
        assert_eq!(handle.level, Level::District);
        assert_eq!(handle.locator, Locator::id("district"));
        assert!(resolver.cached(Level::District).is_some());
    }

    #[tokio::test]
    async fn test_skips_missing_and_ambiguous_candidates() {
        let surface = surface();
        let ambiguous = Locator::css("select");
        surface.register_locator(ambiguous.clone(), Level::Zone);
        surface.register_locator(ambiguous.clone(), Level::District);

        let mut table = SelectorTable::default();
        table.candidates_mut(Level::Zone).clear();
        table.candidates_mut(Level::Zone).extend([
            Locator::css("#missing"),
            ambiguous,
            Locator::id("zone"),
        ]);

        let mut resolver = SelectorResolver::new(table);
        let handle = resolver.resolve(&surface, Level::Zone).await.expect("resolve");
        assert_eq!(handle.locator, Locator::id("zone"));
    }

    #[tokio::test]
    async fn test_no_candidate_is_fatal() {
        let surface = surface();
        surface.remove_control(Level::Village);
        let mut resolver = SelectorResolver::new(SelectorTable::default());

        let err = resolver.resolve(&surface, Level::Village).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NoMatchingSelector {
                level: Level::Village,
                tried: 3
            }
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_invalidate_relocates() {
        let surface = surface();
        let mut resolver = SelectorResolver::new(SelectorTable::default());

        let first = resolver.resolve(&surface, Level::Zone).await.expect("resolve");
        surface.stale_reads(Level::Zone, 1);
        assert!(surface.read_options(&first.id).await.is_err());

        let cached = resolver.resolve(&surface, Level::Zone).await.expect("resolve");
        assert_eq!(cached.id, first.id);

        resolver.invalidate();
        let fresh = resolver.resolve(&surface, Level::Zone).await.expect("resolve");
        assert_ne!(fresh.id, first.id);
    }
}
