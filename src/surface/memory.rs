//! In-memory cascading page.
//!
//! [`MemorySurface`] models four dependent `<select>` controls over a fixed
//! option tree. Selecting an option at one level repopulates the level below
//! it and resets every deeper control to its placeholder, the way the real
//! portal behaves. Faults can be injected to rehearse recovery paths:
//! transient selection failures, stale control references, slow
//! repopulation and missing controls.
//!
//! # Example
//!
//! ```ignore
//! use cascade_harvest::surface::memory::{MemorySurface, SiteNode};
//!
//! let site = vec![SiteNode::new("North", "1").with_children(vec![
//!     SiteNode::new("A", "11"),
//! ])];
//! let surface = MemorySurface::new(site).with_lag(2);
//! surface.fail_selects("1", 2);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::accumulator::{Branch, Tree};
use crate::config::SelectorTable;
use crate::error::{Error, Result};
use crate::identifiers::ControlId;
use crate::model::Level;

use super::{ControlSurface, Locator, OptionEntry};

// ============================================================================
// Constants
// ============================================================================

/// Label of the placeholder option every control starts with.
pub const PLACEHOLDER_LABEL: &str = "--Select--";

/// Bytes returned by [`MemorySurface::screenshot`] (PNG signature only).
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// ============================================================================
// SiteNode
// ============================================================================

/// One option of the modelled page together with its dependent options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteNode {
    /// Displayed text.
    pub label: String,
    /// Value attribute.
    pub value: String,
    /// Options the dependent control shows once this one is selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SiteNode>,
}

impl SiteNode {
    /// Creates a childless option.
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Sets the dependent options.
    #[inline]
    #[must_use]
    pub fn with_children(mut self, children: Vec<SiteNode>) -> Self {
        self.children = children;
        self
    }

    fn entry(&self) -> OptionEntry {
        OptionEntry::new(&self.label, &self.value)
    }
}

// ============================================================================
// Types
// ============================================================================

/// Callback invoked after every successful selection.
pub type SelectHook = Box<dyn Fn(Level, &str) + Send + Sync>;

/// Repopulation that has not become visible yet.
struct Pending {
    level: Level,
    options: Vec<OptionEntry>,
    reads_left: u32,
}

/// Mutable page state.
struct PageState {
    /// Options currently shown per level, indexed by `rank - 1`.
    shown: [Vec<OptionEntry>; 4],
    /// Selected value per level.
    selected: [Option<String>; 4],
    /// Render generation per level; bumping it makes old IDs stale.
    generation: [u32; 4],
    pending: Option<Pending>,
    select_failures: FxHashMap<String, u32>,
    stale_reads: FxHashMap<Level, u32>,
    missing: FxHashSet<Level>,
    selections: Vec<(Level, String)>,
    reads: usize,
}

// ============================================================================
// MemorySurface
// ============================================================================

/// In-memory [`ControlSurface`] over a fixed option tree.
#[derive(Clone)]
pub struct MemorySurface {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    site: Vec<SiteNode>,
    locators: Mutex<Vec<(Locator, Level)>>,
    lag: u32,
    state: Mutex<PageState>,
    hook: Mutex<Option<SelectHook>>,
}

impl std::fmt::Debug for MemorySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySurface")
            .field("zones", &self.inner.site.len())
            .field("lag", &self.inner.lag)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MemorySurface - Constructors
// ============================================================================

impl MemorySurface {
    /// Creates a page whose zone control lists `site`.
    ///
    /// Every control answers to the default selector candidates of its level
    /// and to `Locator::id(level.key())`.
    #[must_use]
    pub fn new(site: Vec<SiteNode>) -> Self {
        Self::build(site, 0)
    }

    /// Rebuilds a page from a harvested tree.
    ///
    /// Option values are synthesized from sibling positions (`"1"`, `"1.2"`,
    /// `"1.2.3"`, ...), so a traversal of the rebuilt page yields the same tree.
    #[must_use]
    pub fn from_tree(tree: &Tree) -> Self {
        Self::new(site_from_branches(tree.branches(), ""))
    }

    /// Delays each repopulation by `reads` option reads.
    #[must_use]
    pub fn with_lag(self, reads: u32) -> Self {
        let site = self.inner.site.clone();
        let locators = self.inner.locators.lock().clone();
        let surface = Self::build(site, reads);
        *surface.inner.locators.lock() = locators;
        surface
    }

    fn build(site: Vec<SiteNode>, lag: u32) -> Self {
        let table = SelectorTable::default();
        let mut locators = Vec::new();
        for level in Level::ALL {
            locators.push((Locator::id(level.key()), level));
            for candidate in table.candidates(level) {
                locators.push((candidate.clone(), level));
            }
        }

        let mut shown: [Vec<OptionEntry>; 4] = Default::default();
        for (i, slot) in shown.iter_mut().enumerate() {
            *slot = if i == 0 {
                with_placeholder(site.iter().map(SiteNode::entry))
            } else {
                with_placeholder(std::iter::empty())
            };
        }

        Self {
            inner: Arc::new(MemoryInner {
                site,
                locators: Mutex::new(locators),
                lag,
                state: Mutex::new(PageState {
                    shown,
                    selected: Default::default(),
                    generation: [0; 4],
                    pending: None,
                    select_failures: FxHashMap::default(),
                    stale_reads: FxHashMap::default(),
                    missing: FxHashSet::default(),
                    selections: Vec::new(),
                    reads: 0,
                }),
                hook: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// MemorySurface - Fault Injection
// ============================================================================

impl MemorySurface {
    /// Makes the next `times` selections of `value` fail transiently.
    pub fn fail_selects(&self, value: impl Into<String>, times: u32) {
        self.inner
            .state
            .lock()
            .select_failures
            .insert(value.into(), times);
    }

    /// Re-renders the level's control on each of its next `times` reads.
    ///
    /// Each such read fails with [`Error::StaleControl`] and invalidates every
    /// reference issued for the control so far.
    pub fn stale_reads(&self, level: Level, times: u32) {
        self.inner.state.lock().stale_reads.insert(level, times);
    }

    /// Removes the level's control from the page.
    pub fn remove_control(&self, level: Level) {
        self.inner.state.lock().missing.insert(level);
    }

    /// Makes `locator` additionally match the level's control.
    pub fn register_locator(&self, locator: Locator, level: Level) {
        self.inner.locators.lock().push((locator, level));
    }

    /// Installs a callback run after every successful selection.
    pub fn on_select(&self, hook: SelectHook) {
        *self.inner.hook.lock() = Some(hook);
    }
}

// ============================================================================
// MemorySurface - Inspection
// ============================================================================

impl MemorySurface {
    /// Returns every successful selection so far, in order.
    #[must_use]
    pub fn selections(&self) -> Vec<(Level, String)> {
        self.inner.state.lock().selections.clone()
    }

    /// Returns the number of option reads so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.inner.state.lock().reads
    }

    /// Returns the modelled option tree.
    #[must_use]
    pub fn site(&self) -> &[SiteNode] {
        &self.inner.site
    }
}

// ============================================================================
// MemorySurface - Page Mechanics
// ============================================================================

impl MemorySurface {
    fn control_id(level: Level, generation: u32) -> ControlId {
        ControlId::new(format!("{}#{}", level.key(), generation))
    }

    /// Maps a control ID back to its level, rejecting outdated generations.
    fn check_control(state: &PageState, control: &ControlId) -> Result<Level> {
        let (key, generation) = control
            .as_str()
            .split_once('#')
            .ok_or_else(|| Error::stale_control(control.clone()))?;

        let level = Level::ALL
            .into_iter()
            .find(|l| l.key() == key)
            .ok_or_else(|| Error::stale_control(control.clone()))?;

        let idx = level.rank() - 1;
        if state.missing.contains(&level) || generation != state.generation[idx].to_string() {
            return Err(Error::stale_control(control.clone()));
        }

        Ok(level)
    }

    /// Options the dependent control shows after `selected[..=level]`.
    fn children_of(&self, state: &PageState, level: Level) -> Vec<OptionEntry> {
        let mut siblings = self.inner.site.as_slice();
        let mut found: Option<&SiteNode> = None;

        for idx in 0..level.rank() {
            let Some(value) = state.selected[idx].as_deref() else {
                return Vec::new();
            };
            match siblings.iter().find(|n| n.value == value) {
                Some(node) => {
                    found = Some(node);
                    siblings = &node.children;
                }
                None => return Vec::new(),
            }
        }

        found
            .map(|node| node.children.iter().map(SiteNode::entry).collect())
            .unwrap_or_default()
    }

    fn flush_pending(state: &mut PageState) {
        if let Some(pending) = state.pending.take() {
            state.shown[pending.level.rank() - 1] = pending.options;
        }
    }
}

// ============================================================================
// ControlSurface Implementation
// ============================================================================

#[async_trait]
impl ControlSurface for MemorySurface {
    async fn locate(&self, locator: &Locator) -> Result<Vec<ControlId>> {
        let state = self.inner.state.lock();
        let locators = self.inner.locators.lock();

        let mut levels: Vec<Level> = locators
            .iter()
            .filter(|(l, level)| l == locator && !state.missing.contains(level))
            .map(|(_, level)| *level)
            .collect();
        levels.sort();
        levels.dedup();

        Ok(levels
            .into_iter()
            .map(|level| Self::control_id(level, state.generation[level.rank() - 1]))
            .collect())
    }

    async fn read_options(&self, control: &ControlId) -> Result<Vec<OptionEntry>> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.reads += 1;

        let level = Self::check_control(state, control)?;
        let idx = level.rank() - 1;

        if let Some(left) = state.stale_reads.get_mut(&level)
            && *left > 0
        {
            *left -= 1;
            state.generation[idx] += 1;
            return Err(Error::stale_control(control.clone()));
        }

        if let Some(pending) = state.pending.as_mut()
            && pending.level == level
        {
            if pending.reads_left > 0 {
                pending.reads_left -= 1;
            } else {
                Self::flush_pending(state);
            }
        }

        Ok(state.shown[idx].clone())
    }

    async fn select(&self, control: &ControlId, value: &str) -> Result<()> {
        let level = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let level = Self::check_control(state, control)?;
            let idx = level.rank() - 1;

            if let Some(left) = state.select_failures.get_mut(value)
                && *left > 0
            {
                *left -= 1;
                return Err(Error::transient_selection(
                    control.clone(),
                    value,
                    "change handler did not run",
                ));
            }

            Self::flush_pending(state);

            if !state.shown[idx].iter().any(|o| o.value == value) {
                return Err(Error::transient_selection(
                    control.clone(),
                    value,
                    "no such option",
                ));
            }

            state.selected[idx] = Some(value.to_string());
            for deeper in state.selected.iter_mut().skip(idx + 1) {
                *deeper = None;
            }
            for deeper in state.shown.iter_mut().skip(idx + 1) {
                *deeper = with_placeholder(std::iter::empty());
            }

            if let Some(child) = level.child() {
                let options = with_placeholder(self.children_of(state, level).into_iter());
                if self.inner.lag == 0 {
                    state.shown[child.rank() - 1] = options;
                } else {
                    state.pending = Some(Pending {
                        level: child,
                        options,
                        reads_left: self.inner.lag,
                    });
                }
            }

            state.selections.push((level, value.to_string()));
            level
        };

        trace!(%level, value, "Memory surface selection");

        if let Some(hook) = self.inner.hook.lock().as_ref() {
            hook(level, value);
        }

        Ok(())
    }

    async fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(PNG_SIGNATURE.to_vec()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn with_placeholder(options: impl Iterator<Item = OptionEntry>) -> Vec<OptionEntry> {
    std::iter::once(OptionEntry::new(PLACEHOLDER_LABEL, ""))
        .chain(options)
        .collect()
}

fn site_from_branches(branches: &[Branch], prefix: &str) -> Vec<SiteNode> {
    branches
        .iter()
        .enumerate()
        .map(|(i, branch)| {
            let value = if prefix.is_empty() {
                (i + 1).to_string()
            } else {
                format!("{prefix}.{}", i + 1)
            };
            let children = site_from_branches(&branch.children, &value);
            SiteNode::new(&branch.label, value).with_children(children)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Vec<SiteNode> {
        vec![
            SiteNode::new("North", "1").with_children(vec![
                SiteNode::new("A", "11")
                    .with_children(vec![SiteNode::new("A1", "111").with_children(vec![
                        SiteNode::new("V1", "1111"),
                        SiteNode::new("V2", "1112"),
                    ])]),
                SiteNode::new("B", "12"),
            ]),
            SiteNode::new("South", "2"),
        ]
    }

    async fn control(surface: &MemorySurface, level: Level) -> ControlId {
        surface
            .locate(&Locator::id(level.key()))
            .await
            .expect("locate")
            .remove(0)
    }

    fn labels(options: &[OptionEntry]) -> Vec<&str> {
        options.iter().map(|o| o.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_zone_control_starts_populated() {
        let surface = MemorySurface::new(site());
        let zone = control(&surface, Level::Zone).await;
        let options = surface.read_options(&zone).await.expect("read");
        assert_eq!(labels(&options), vec![PLACEHOLDER_LABEL, "North", "South"]);
    }

    #[tokio::test]
    async fn test_selection_cascades_and_resets_deeper_controls() {
        let surface = MemorySurface::new(site());
        let zone = control(&surface, Level::Zone).await;
        let district = control(&surface, Level::District).await;
        let sro = control(&surface, Level::SubRegistrarOffice).await;

        surface.select(&zone, "1").await.expect("select zone");
        surface.select(&district, "11").await.expect("select district");
        let offices = surface.read_options(&sro).await.expect("read");
        assert_eq!(labels(&offices), vec![PLACEHOLDER_LABEL, "A1"]);

        surface.select(&zone, "2").await.expect("select zone");
        let districts = surface.read_options(&district).await.expect("read");
        let offices = surface.read_options(&sro).await.expect("read");
        assert_eq!(labels(&districts), vec![PLACEHOLDER_LABEL]);
        assert_eq!(labels(&offices), vec![PLACEHOLDER_LABEL]);
    }

    #[tokio::test]
    async fn test_lag_delays_repopulation() {
        let surface = MemorySurface::new(site()).with_lag(2);
        let zone = control(&surface, Level::Zone).await;
        let district = control(&surface, Level::District).await;

        surface.select(&zone, "1").await.expect("select");
        for _ in 0..2 {
            let options = surface.read_options(&district).await.expect("read");
            assert_eq!(options.len(), 1);
        }
        let options = surface.read_options(&district).await.expect("read");
        assert_eq!(labels(&options), vec![PLACEHOLDER_LABEL, "A", "B"]);
    }

    #[tokio::test]
    async fn test_fail_selects() {
        let surface = MemorySurface::new(site());
        let zone = control(&surface, Level::Zone).await;
        surface.fail_selects("1", 1);

        let err = surface.select(&zone, "1").await.unwrap_err();
        assert!(matches!(err, Error::TransientSelection { .. }));
        surface.select(&zone, "1").await.expect("second attempt");
        assert_eq!(surface.selections(), vec![(Level::Zone, "1".to_string())]);
    }

    #[tokio::test]
    async fn test_unknown_value_is_transient() {
        let surface = MemorySurface::new(site());
        let zone = control(&surface, Level::Zone).await;
        let err = surface.select(&zone, "99").await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_stale_read_invalidates_reference() {
        let surface = MemorySurface::new(site());
        let zone = control(&surface, Level::Zone).await;
        surface.stale_reads(Level::Zone, 1);

        let err = surface.read_options(&zone).await.unwrap_err();
        assert!(matches!(err, Error::StaleControl { .. }));
        assert!(surface.read_options(&zone).await.is_err());

        let fresh = control(&surface, Level::Zone).await;
        assert_ne!(fresh, zone);
        assert!(surface.read_options(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_removed_control_not_located() {
        let surface = MemorySurface::new(site());
        surface.remove_control(Level::District);
        let found = surface
            .locate(&Locator::id(Level::District.key()))
            .await
            .expect("locate");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_default_candidates_locate_one_control() {
        let surface = MemorySurface::new(site());
        let table = SelectorTable::default();
        for level in Level::ALL {
            let found = surface
                .locate(&table.candidates(level)[0])
                .await
                .expect("locate");
            assert_eq!(found.len(), 1, "{level}");
        }
    }

    #[tokio::test]
    async fn test_screenshot_is_png() {
        let surface = MemorySurface::new(site());
        let bytes = surface.screenshot().await.expect("screenshot").expect("bytes");
        assert!(bytes.starts_with(b"\x89PNG"));
    }
}
