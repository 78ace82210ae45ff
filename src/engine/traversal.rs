//! Depth-first traversal.
//!
//! For every node above the village level the engine selects the node's
//! value, waits for the dependent control to repopulate, then recurses into
//! each child in display order. One [`RetryBudget`] is opened per node entry
//! and covers everything the node does: its own selection, the wait for its
//! children, and the check that each later child is still offered.
//!
//! # Example
//!
//! ```ignore
//! use cascade_harvest::{Traversal, TraversalConfig};
//!
//! let config = TraversalConfig::from_json_file("harvest.json")?;
//! let mut traversal = Traversal::new(&surface, &config);
//! let cancel = traversal.cancellation_token();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     cancel.cancel();
//! });
//!
//! match traversal.run().await {
//!     Ok(harvest) => println!("{} zones", harvest.tree.len()),
//!     Err(halted) => eprintln!("{halted}; kept {} zones", halted.salvaged.len()),
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::accumulator::{Accumulator, Tree};
use crate::artifacts::ScreenshotStore;
use crate::config::TraversalConfig;
use crate::error::{Error, Result};
use crate::events::{BranchFailure, EventSink, FailureKind, TracingSink, TraversalEvent};
use crate::model::{Level, Node, Path};
use crate::surface::ControlSurface;

use super::resolver::SelectorResolver;
use super::retry::RetryBudget;
use super::state::TraversalState;
use super::wait::StabilizationPolicy;

// ============================================================================
// Results
// ============================================================================

/// How a traversal that produced a tree ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every zone was walked.
    Complete,
    /// The abort signal stopped the walk early.
    Cancelled,
}

/// Result of a traversal that reached `Done`.
#[derive(Debug, Clone)]
pub struct Harvest {
    /// The finalized hierarchy.
    pub tree: Tree,
    /// Branches abandoned along the way, in traversal order.
    pub failures: Vec<BranchFailure>,
    /// How the walk ended.
    pub outcome: Outcome,
}

impl Harvest {
    /// Returns `true` if the walk was not cancelled.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Complete
    }
}

/// A traversal stopped by a fatal error.
///
/// `salvaged` holds the zones finalized before the failing one; nothing of
/// the zone being walked at the time is kept, including its failures.
#[derive(Debug, thiserror::Error)]
#[error("Traversal halted: {error}")]
pub struct Halted {
    /// The fatal error.
    #[source]
    pub error: Error,
    /// Zones finalized before the failure.
    pub salvaged: Tree,
    /// Branches abandoned before the failure.
    pub failures: Vec<BranchFailure>,
}

impl From<Halted> for Error {
    fn from(halted: Halted) -> Self {
        halted.error
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Depth-first walker over one control surface.
pub struct Traversal<'a, S: ControlSurface + ?Sized> {
    surface: &'a S,
    config: &'a TraversalConfig,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
    state: TraversalState,
}

impl<S: ControlSurface + ?Sized> fmt::Debug for Traversal<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("state", &self.state)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<'a, S: ControlSurface + ?Sized> Traversal<'a, S> {
    /// Creates a traversal reporting to a [`TracingSink`].
    #[must_use]
    pub fn new(surface: &'a S, config: &'a TraversalConfig) -> Self {
        Self {
            surface,
            config,
            cancel: CancellationToken::new(),
            sink: Arc::new(TracingSink),
            state: TraversalState::Idle,
        }
    }

    /// Uses an externally owned abort signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns a handle that aborts the traversal when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Walks the whole hierarchy.
    ///
    /// Branch failures never stop the walk; they are returned in
    /// [`Harvest::failures`]. Cancellation yields a harvest whose open
    /// branches are marked partial.
    ///
    /// # Errors
    ///
    /// Returns [`Halted`] on an invalid configuration, when a control cannot
    /// be resolved, when the session is lost, or on any other error that
    /// retrying a node cannot fix. A zone list that keeps timing out is a
    /// branch failure at the root, not a halt.
    pub async fn run(&mut self) -> StdResult<Harvest, Halted> {
        let prepared = self
            .config
            .validate()
            .and_then(|()| StabilizationPolicy::from_config(self.config));

        let policy = match prepared {
            Ok(policy) => policy,
            Err(error) => {
                self.state = TraversalState::Done;
                return Err(Halted {
                    error,
                    salvaged: Tree::default(),
                    failures: Vec::new(),
                });
            }
        };

        let mut walker = Walker {
            surface: self.surface,
            config: self.config,
            resolver: SelectorResolver::new(self.config.selectors.clone()),
            policy,
            acc: Accumulator::new(),
            failures: Vec::new(),
            cancel: self.cancel.clone(),
            sink: Arc::clone(&self.sink),
            shots: self
                .config
                .screenshot_on_failure
                .then(|| ScreenshotStore::new(self.config.screenshot_dir.clone())),
            state: TraversalState::Idle,
        };

        let result = walker.walk().await;
        self.state = walker.state;
        result
    }
}

// ============================================================================
// Walker
// ============================================================================

/// What to do after a recoverable failure.
enum Recovery {
    /// Try again, restoring the selection path first if asked.
    Retry { restore: bool },
    /// Budget spent; the branch is now partial.
    Abandoned,
}

/// Mutable state of one run.
struct Walker<'a, S: ControlSurface + ?Sized> {
    surface: &'a S,
    config: &'a TraversalConfig,
    resolver: SelectorResolver,
    policy: StabilizationPolicy,
    acc: Accumulator,
    failures: Vec<BranchFailure>,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
    shots: Option<ScreenshotStore>,
    state: TraversalState,
}

impl<S: ControlSurface + ?Sized> Walker<'_, S> {
    // ========================================================================
    // Root
    // ========================================================================

    async fn walk(&mut self) -> StdResult<Harvest, Halted> {
        info!("Starting traversal");

        let zones = match self.list_zones().await {
            Ok(zones) => zones,
            Err(Error::Cancelled) => return self.finish(Outcome::Cancelled),
            Err(error) => return Err(self.halt(error, &Path::root())),
        };

        let total = zones.len();
        let mut path = Path::root();

        for (idx, zone) in zones.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return self.finish(Outcome::Cancelled);
            }

            info!(zone = %zone.label, "Processing zone {}/{}", idx + 1, total);
            self.enter(TraversalState::Recursing);
            path.push(zone);

            match self.visit(&mut path).await {
                Ok(()) => {}
                Err(Error::Cancelled) => return self.finish(Outcome::Cancelled),
                Err(error) => return Err(self.halt(error, &path)),
            }

            path.pop();
            self.enter(TraversalState::Backtracking);
        }

        self.finish(Outcome::Complete)
    }

    async fn list_zones(&mut self) -> Result<Vec<Node>> {
        let root = Path::root();
        let mut budget = RetryBudget::new(self.config.retry_budget_per_node);

        loop {
            self.enter(TraversalState::AwaitingChildren);
            match self.try_list_zones().await {
                Ok(zones) => {
                    self.emit(TraversalEvent::ChildrenDiscovered {
                        level: Level::Zone,
                        path: Vec::new(),
                        count: zones.len(),
                    });
                    return Ok(zones);
                }
                Err(error) if error.is_recoverable() => {
                    if budget.charge() {
                        self.pause_before_retry(&root, &error, &budget).await?;
                    } else {
                        self.fail_branch(&root, &error).await?;
                        return Ok(Vec::new());
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn try_list_zones(&mut self) -> Result<Vec<Node>> {
        let zone = self.resolver.resolve(self.surface, Level::Zone).await?;
        self.policy
            .await_options(self.surface, &zone, &[], &self.cancel)
            .await
    }

    fn finish(&mut self, outcome: Outcome) -> StdResult<Harvest, Halted> {
        if outcome == Outcome::Cancelled {
            self.emit(TraversalEvent::Cancelled);
        }
        self.enter(TraversalState::Done);

        let failures = mem::take(&mut self.failures);
        match mem::take(&mut self.acc).finalize() {
            Ok(tree) => {
                self.emit(TraversalEvent::Finished {
                    outcome,
                    zones: tree.len(),
                    villages: tree.village_count(),
                    failures: failures.len(),
                });
                Ok(Harvest {
                    tree,
                    failures,
                    outcome,
                })
            }
            Err(error) => Err(Halted {
                error,
                salvaged: Tree::default(),
                failures,
            }),
        }
    }

    /// Drops the zone in flight, with its failures, and finalizes the rest.
    fn halt(&mut self, error: Error, path: &Path) -> Halted {
        if let Some(zone) = path.nodes().first() {
            self.acc.discard(&Path::root().joined(zone.clone()));
            self.failures
                .retain(|f| f.path.first().is_none_or(|label| *label != zone.label));
        }
        self.enter(TraversalState::Done);
        self.emit(TraversalEvent::Halted {
            message: error.to_string(),
        });

        Halted {
            error,
            salvaged: mem::take(&mut self.acc).finalize().unwrap_or_default(),
            failures: mem::take(&mut self.failures),
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Visits the node at the end of `path`, marking it partial if the walk
    /// is cancelled underneath it.
    fn visit<'s>(&'s mut self, path: &'s mut Path) -> BoxFuture<'s, Result<()>> {
        Box::pin(async move {
            let result = self.visit_node(path).await;
            if let Err(Error::Cancelled) = result {
                self.enter(TraversalState::Backtracking);
                self.acc.mark_partial(path)?;
            }
            result
        })
    }

    async fn visit_node(&mut self, path: &mut Path) -> Result<()> {
        let Some(node) = path.last().cloned() else {
            return Ok(());
        };

        self.enter(TraversalState::Idle);
        self.acc.record(path, &[])?;
        self.emit(TraversalEvent::NodeEntered {
            level: node.level,
            path: path.labels(),
        });

        let mut budget = RetryBudget::new(self.config.retry_budget_per_node);

        let Some(child_level) = node.level.child() else {
            return self.finish_leaf(path, &node, &mut budget).await;
        };

        let Some(children) = self.expand(path, &node, child_level, &mut budget).await? else {
            return Ok(());
        };

        self.enter(TraversalState::EnumeratingChildren);
        self.emit(TraversalEvent::ChildrenDiscovered {
            level: child_level,
            path: path.labels(),
            count: children.len(),
        });

        let interactive = !child_level.is_leaf() || self.config.select_leaves;

        for (idx, child) in children.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if idx > 0 && interactive && !self.confirm_child(path, &child, &mut budget).await? {
                return Ok(());
            }

            self.enter(TraversalState::Recursing);
            path.push(child);
            let result = self.visit(path).await;
            path.pop();
            result?;
            self.enter(TraversalState::Backtracking);
        }

        self.acc.complete(path)
    }

    /// Selects the node and returns its stabilized children.
    ///
    /// Returns `None` once the budget is spent and the branch is partial.
    async fn expand(
        &mut self,
        path: &Path,
        node: &Node,
        child_level: Level,
        budget: &mut RetryBudget,
    ) -> Result<Option<Vec<Node>>> {
        // Reused across retries so a late repopulation still counts as a change.
        let mut snapshot = None;
        let mut restore = false;

        loop {
            let attempt = self
                .try_expand(path, node, child_level, &mut snapshot, restore)
                .await;
            match attempt {
                Ok(children) => return Ok(Some(children)),
                Err(error) => match self.recover(path, budget, error).await? {
                    Recovery::Retry { restore: again } => restore = again,
                    Recovery::Abandoned => return Ok(None),
                },
            }
        }
    }

    async fn try_expand(
        &mut self,
        path: &Path,
        node: &Node,
        child_level: Level,
        snapshot: &mut Option<Vec<Node>>,
        restore: bool,
    ) -> Result<Vec<Node>> {
        if restore {
            self.restore(ancestors(path)).await?;
        }

        self.enter(TraversalState::SelectingParent);
        let child = self.resolver.resolve(self.surface, child_level).await?;
        if snapshot.is_none() {
            *snapshot = Some(self.policy.snapshot(self.surface, &child).await?);
        }

        let own = self.resolver.resolve(self.surface, node.level).await?;
        if restore {
            self.policy
                .await_value(self.surface, &own, &node.value, &self.cancel)
                .await?;
        }
        self.surface.select(&own.id, &node.value).await?;
        trace!(level = %node.level, label = %node.label, "Selected");

        self.enter(TraversalState::AwaitingChildren);
        let previous = snapshot.as_deref().unwrap_or_default();
        self.policy
            .await_options(self.surface, &child, previous, &self.cancel)
            .await
    }

    /// Checks that `child` is still offered before descending into it.
    ///
    /// Returns `false` once the parent's budget is spent and it is partial.
    async fn confirm_child(
        &mut self,
        path: &Path,
        child: &Node,
        budget: &mut RetryBudget,
    ) -> Result<bool> {
        let mut restore = false;

        loop {
            let attempt = self.try_confirm(path, child, restore).await;
            match attempt {
                Ok(()) => return Ok(true),
                Err(error) => match self.recover(path, budget, error).await? {
                    Recovery::Retry { .. } => restore = true,
                    Recovery::Abandoned => return Ok(false),
                },
            }
        }
    }

    async fn try_confirm(&mut self, path: &Path, child: &Node, restore: bool) -> Result<()> {
        if restore {
            self.restore(path.nodes()).await?;
        }
        let control = self.resolver.resolve(self.surface, child.level).await?;
        self.policy
            .await_value(self.surface, &control, &child.value, &self.cancel)
            .await
    }

    async fn finish_leaf(
        &mut self,
        path: &Path,
        node: &Node,
        budget: &mut RetryBudget,
    ) -> Result<()> {
        if self.config.select_leaves {
            let mut restore = false;
            loop {
                let attempt = self.try_select_leaf(path, node, restore).await;
                match attempt {
                    Ok(()) => break,
                    Err(error) => match self.recover(path, budget, error).await? {
                        Recovery::Retry { restore: again } => restore = again,
                        Recovery::Abandoned => return Ok(()),
                    },
                }
            }
        }

        self.acc.complete(path)
    }

    async fn try_select_leaf(&mut self, path: &Path, node: &Node, restore: bool) -> Result<()> {
        if restore {
            self.restore(ancestors(path)).await?;
        }

        self.enter(TraversalState::SelectingParent);
        let control = self.resolver.resolve(self.surface, node.level).await?;
        if restore {
            self.policy
                .await_value(self.surface, &control, &node.value, &self.cancel)
                .await?;
        }
        self.surface.select(&control.id, &node.value).await
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    async fn recover(
        &mut self,
        path: &Path,
        budget: &mut RetryBudget,
        error: Error,
    ) -> Result<Recovery> {
        if !error.is_recoverable() {
            return Err(error);
        }

        if budget.charge() {
            let restore = matches!(error, Error::StaleControl { .. });
            self.pause_before_retry(path, &error, budget).await?;
            Ok(Recovery::Retry { restore })
        } else {
            self.fail_branch(path, &error).await?;
            Ok(Recovery::Abandoned)
        }
    }

    async fn pause_before_retry(
        &mut self,
        path: &Path,
        error: &Error,
        budget: &RetryBudget,
    ) -> Result<()> {
        self.enter(TraversalState::Recovering);
        self.emit(TraversalEvent::RetryScheduled {
            level: path.level().unwrap_or(Level::Zone),
            path: path.labels(),
            attempt: budget.used(),
            remaining: budget.remaining(),
            kind: FailureKind::from(error),
            message: error.to_string(),
        });

        self.sleep(self.config.retry_delay()).await?;
        self.resolver.invalidate();
        Ok(())
    }

    /// Re-selects `nodes` top down, waiting for each value to be offered.
    async fn restore(&mut self, nodes: &[Node]) -> Result<()> {
        self.enter(TraversalState::Recovering);
        for node in nodes {
            let control = self.resolver.resolve(self.surface, node.level).await?;
            self.policy
                .await_value(self.surface, &control, &node.value, &self.cancel)
                .await?;
            self.surface.select(&control.id, &node.value).await?;
        }
        debug!(depth = nodes.len(), "Restored selection path");
        Ok(())
    }

    async fn fail_branch(&mut self, path: &Path, error: &Error) -> Result<()> {
        if !path.is_root() {
            self.acc.mark_partial(path)?;
        }
        self.resolver.invalidate();

        let level = path.level().unwrap_or(Level::Zone);
        let labels = path.labels();
        let screenshot = match &self.shots {
            Some(store) => store.capture(self.surface, level, &labels).await,
            None => None,
        };

        let failure = BranchFailure {
            level,
            path: labels,
            kind: FailureKind::from(error),
            message: error.to_string(),
            screenshot,
        };
        self.emit(TraversalEvent::BranchFailed(failure.clone()));
        self.failures.push(failure);
        Ok(())
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn enter(&mut self, state: TraversalState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "State transition");
            self.state = state;
        }
    }

    fn emit(&self, event: TraversalEvent) {
        self.sink.emit(&event);
    }
}

/// Nodes above the last one.
fn ancestors(path: &Path) -> &[Node] {
    let nodes = path.nodes();
    &nodes[..nodes.len().saturating_sub(1)]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use proptest::prelude::*;

    use crate::accumulator::Branch;
    use crate::events::RecordingSink;
    use crate::surface::memory::{MemorySurface, SiteNode};

    // ------------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------------

    fn config() -> TraversalConfig {
        TraversalConfig::new()
            .with_stabilization_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
            .with_retry_delay(Duration::from_millis(50))
    }

    fn node(label: &str, value: &str, children: Vec<SiteNode>) -> SiteNode {
        SiteNode::new(label, value).with_children(children)
    }

    fn leaf(label: &str, value: &str) -> SiteNode {
        SiteNode::new(label, value)
    }

    /// North: A -> A1 -> [V1, V2], B with no offices.
    fn north() -> SiteNode {
        node(
            "North",
            "1",
            vec![
                node(
                    "A",
                    "11",
                    vec![node("A1", "111", vec![leaf("V1", "1111"), leaf("V2", "1112")])],
                ),
                leaf("B", "12"),
            ],
        )
    }

    fn full_zone(label: &str, value: &str) -> SiteNode {
        node(
            label,
            value,
            vec![node(
                &format!("{label}-D"),
                &format!("{value}1"),
                vec![node(
                    &format!("{label}-S"),
                    &format!("{value}11"),
                    vec![leaf(&format!("{label}-V"), &format!("{value}111"))],
                )],
            )],
        )
    }

    async fn run(
        surface: &MemorySurface,
        config: &TraversalConfig,
    ) -> (StdResult<Harvest, Halted>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let mut traversal = Traversal::new(surface, config).with_sink(sink.clone());
        let result = traversal.run().await;
        assert_eq!(traversal.state(), TraversalState::Done);
        (result, sink)
    }

    fn json(tree: &Tree) -> String {
        serde_json::to_string(tree).expect("serialize")
    }

    fn same_shape(site: &[SiteNode], branches: &[Branch]) -> bool {
        site.len() == branches.len()
            && site
                .iter()
                .zip(branches)
                .all(|(s, b)| s.label == b.label && same_shape(&s.children, &b.children))
    }

    fn preorder(tree: &Tree) -> Vec<Vec<String>> {
        fn walk(branch: &Branch, trail: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
            trail.push(branch.label.clone());
            out.push(trail.clone());
            for child in &branch.children {
                walk(child, trail, out);
            }
            trail.pop();
        }
        let mut out = Vec::new();
        for branch in tree.branches() {
            walk(branch, &mut Vec::new(), &mut out);
        }
        out
    }

    fn cancel_on_select(surface: &MemorySurface, cancel: &CancellationToken, nth: usize) {
        let seen = AtomicUsize::new(0);
        let cancel = cancel.clone();
        surface.on_select(Box::new(move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) + 1 == nth {
                cancel.cancel();
            }
        }));
    }

    // ------------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_empty_district_is_kept_as_partial() {
        let surface = MemorySurface::new(vec![north()]);
        let (result, sink) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        assert!(harvest.is_complete());
        assert_eq!(json(&harvest.tree), r#"{"North":{"A":{"A1":["V1","V2"]},"B":{}}}"#);

        assert_eq!(harvest.failures.len(), 1);
        let failure = &harvest.failures[0];
        assert_eq!(failure.level, Level::District);
        assert_eq!(failure.path, vec!["North", "B"]);
        assert_eq!(failure.kind, FailureKind::StabilizationTimeout);
        assert_eq!(sink.failures(), harvest.failures);

        let b = harvest.tree.get(&["North", "B"]).expect("B");
        assert!(b.is_partial());
        assert!(!harvest.tree.get(&["North", "A"]).expect("A").is_partial());
        assert_eq!(sink.retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_within_budget_leave_no_trace() {
        let surface = MemorySurface::new(vec![full_zone("West", "1"), full_zone("East", "2")]);
        surface.fail_selects("2", 2);

        let (result, sink) = run(&surface, &config().with_retry_budget(3)).await;
        let harvest = result.expect("harvest");

        assert!(harvest.failures.is_empty());
        assert_eq!(sink.retries(), 2);
        assert_eq!(
            json(&harvest.tree),
            r#"{"West":{"West-D":{"West-S":["West-V"]}},"East":{"East-D":{"East-S":["East-V"]}}}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_abandons_only_that_zone() {
        let surface = MemorySurface::new(vec![full_zone("East", "1"), full_zone("West", "2")]);
        surface.fail_selects("1", 2);

        let (result, _) = run(&surface, &config().with_retry_budget(2)).await;
        let harvest = result.expect("harvest");

        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].kind, FailureKind::TransientSelection);
        assert_eq!(harvest.failures[0].path, vec!["East"]);
        assert_eq!(json(&harvest.tree), r#"{"East":{},"West":{"West-D":{"West-S":["West-V"]}}}"#);
        assert!(harvest.tree.branches()[0].is_partial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_district_control_halts_with_prior_zones() {
        let surface = MemorySurface::new(vec![north(), full_zone("South", "2")]);
        let page = surface.clone();
        surface.on_select(Box::new(move |level, value| {
            if level == Level::Zone && value == "2" {
                page.remove_control(Level::District);
            }
        }));

        let (result, sink) = run(&surface, &config()).await;
        let halted = result.expect_err("halted");

        assert!(matches!(
            halted.error,
            Error::NoMatchingSelector {
                level: Level::District,
                ..
            }
        ));
        assert_eq!(json(&halted.salvaged), r#"{"North":{"A":{"A1":["V1","V2"]},"B":{}}}"#);
        assert!(halted.salvaged.get(&["South"]).is_none());
        assert_eq!(halted.failures.len(), 1);
        assert!(
            sink.events()
                .iter()
                .any(|e| matches!(e, TraversalEvent::Halted { .. }))
        );

        let error: Error = halted.into();
        assert!(error.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_zone_control_halts_empty() {
        let surface = MemorySurface::new(vec![north()]);
        surface.remove_control(Level::Zone);

        let (result, _) = run(&surface, &config()).await;
        let halted = result.expect_err("halted");
        assert!(matches!(halted.error, Error::NoMatchingSelector { level: Level::Zone, .. }));
        assert!(halted.salvaged.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_zone_control_is_a_root_failure() {
        let surface = MemorySurface::new(Vec::new());

        let (result, sink) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        assert!(harvest.is_complete());
        assert!(harvest.tree.is_empty());
        assert_eq!(sink.retries(), 2);
        assert_eq!(harvest.failures.len(), 1);
        let failure = &harvest.failures[0];
        assert_eq!(failure.level, Level::Zone);
        assert!(failure.path.is_empty());
        assert_eq!(failure.kind, FailureKind::StabilizationTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_zone_control_is_a_root_failure() {
        let surface = MemorySurface::new(vec![north()]);
        surface.stale_reads(Level::Zone, 10);

        let (result, _) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        assert!(harvest.tree.is_empty());
        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].level, Level::Zone);
        assert!(harvest.failures[0].path.is_empty());
        assert_eq!(harvest.failures[0].kind, FailureKind::StaleControl);
        assert!(surface.selections().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_drops_failures_of_discarded_zone() {
        let south = node(
            "South",
            "2",
            vec![
                leaf("SB", "21"),
                node("SC", "22", vec![node("SC1", "221", vec![leaf("V9", "2211")])]),
            ],
        );
        let surface = MemorySurface::new(vec![north(), south]);
        let page = surface.clone();
        surface.on_select(Box::new(move |level, value| {
            if level == Level::District && value == "22" {
                page.remove_control(Level::SubRegistrarOffice);
            }
        }));

        let (result, sink) = run(&surface, &config()).await;
        let halted = result.expect_err("halted");

        assert!(matches!(
            halted.error,
            Error::NoMatchingSelector {
                level: Level::SubRegistrarOffice,
                ..
            }
        ));
        assert!(halted.salvaged.get(&["South"]).is_none());
        assert_eq!(halted.failures.len(), 1);
        assert_eq!(halted.failures[0].path, vec!["North", "B"]);
        // The event stream still saw the dropped failure.
        assert_eq!(sink.failures().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_children_keep_site_order() {
        let district = |label: &str, value: &str| {
            node(
                label,
                value,
                vec![node(
                    &format!("{label}-S"),
                    &format!("{value}1"),
                    vec![leaf(&format!("{label}-V"), &format!("{value}11"))],
                )],
            )
        };
        let site = vec![node(
            "North",
            "1",
            vec![
                district("Charlie", "13"),
                district("Alpha", "11"),
                district("Bravo", "12"),
            ],
        )];
        let surface = MemorySurface::new(site.clone());

        let (result, _) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        let north = harvest.tree.get(&["North"]).expect("North");
        assert_eq!(north.child_labels(), vec!["Charlie", "Alpha", "Bravo"]);
        assert!(same_shape(&site, harvest.tree.branches()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_spent_between_children_keeps_first_k() {
        let site = vec![
            node(
                "North",
                "1",
                vec![
                    node(
                        "A",
                        "11",
                        vec![
                            node("A1", "111", vec![leaf("V1", "1111")]),
                            node("A2", "112", vec![leaf("V2", "1121")]),
                            node("A3", "113", vec![leaf("V3", "1131")]),
                        ],
                    ),
                    node("B", "12", vec![node("B1", "121", vec![leaf("V4", "1211")])]),
                ],
            ),
        ];
        let surface = MemorySurface::new(site);
        let page = surface.clone();
        surface.on_select(Box::new(move |level, value| {
            if level == Level::SubRegistrarOffice && value == "112" {
                page.stale_reads(Level::SubRegistrarOffice, 3);
            }
        }));

        let (result, _) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        let a = harvest.tree.get(&["North", "A"]).expect("A");
        assert!(a.is_partial());
        assert_eq!(a.child_labels(), vec!["A1", "A2"]);
        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].path, vec!["North", "A"]);
        assert_eq!(harvest.failures[0].kind, FailureKind::StaleControl);

        let b = harvest.tree.get(&["North", "B"]).expect("B");
        assert!(!b.is_partial());
        assert_eq!(b.child_labels(), vec!["B1"]);
        assert!(harvest.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_control_recovers_by_restoring_path() {
        let surface = MemorySurface::new(vec![north()]);
        let page = surface.clone();
        let armed = AtomicBool::new(true);
        surface.on_select(Box::new(move |level, value| {
            if level == Level::District && value == "11" && armed.swap(false, Ordering::SeqCst) {
                page.stale_reads(Level::SubRegistrarOffice, 1);
            }
        }));

        let (result, sink) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        let a1 = harvest.tree.get(&["North", "A", "A1"]).expect("A1");
        assert_eq!(a1.child_labels(), vec!["V1", "V2"]);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            TraversalEvent::RetryScheduled {
                kind: FailureKind::StaleControl,
                ..
            }
        )));
        // Only the empty district B is abandoned.
        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].path, vec!["North", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_page_is_fully_harvested() {
        let surface = MemorySurface::new(vec![full_zone("West", "1"), full_zone("East", "2")]).with_lag(4);
        let (result, sink) = run(&surface, &config()).await;
        let harvest = result.expect("harvest");

        assert!(harvest.failures.is_empty());
        assert_eq!(sink.retries(), 0);
        assert_eq!(harvest.tree.village_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaf_selection() {
        let surface = MemorySurface::new(vec![north()]);
        surface.fail_selects("1112", 10);

        let (result, _) = run(&surface, &config().with_leaf_selection()).await;
        let harvest = result.expect("harvest");

        let villages: Vec<_> = surface
            .selections()
            .into_iter()
            .filter(|(level, _)| *level == Level::Village)
            .map(|(_, value)| value)
            .collect();
        assert_eq!(villages, vec!["1111"]);

        let paths = harvest.tree.partial_paths();
        assert!(paths.contains(&vec!["North".into(), "A".into(), "A1".into(), "V2".into()]));
        assert_eq!(json(&harvest.tree), r#"{"North":{"A":{"A1":["V1","V2"]},"B":{}}}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_marks_open_branches_partial() {
        let surface = MemorySurface::new(vec![north(), full_zone("South", "2")]);
        let cancel = CancellationToken::new();
        // Zone, district, then the office A1.
        cancel_on_select(&surface, &cancel, 3);

        let config = TraversalConfig::new();
        let sink = Arc::new(RecordingSink::new());
        let mut traversal = Traversal::new(&surface, &config)
            .with_cancellation(cancel)
            .with_sink(sink.clone());
        let harvest = traversal.run().await.expect("harvest");

        assert_eq!(harvest.outcome, Outcome::Cancelled);
        assert_eq!(
            harvest.tree.partial_paths(),
            vec![
                vec!["North".to_string()],
                vec!["North".into(), "A".into()],
                vec!["North".into(), "A".into(), "A1".into()],
            ]
        );
        assert_eq!(json(&harvest.tree), r#"{"North":{"A":{"A1":[]}}}"#);
        assert!(sink.events().contains(&TraversalEvent::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let surface = MemorySurface::new(vec![north()]);
        let config = config();
        let mut traversal = Traversal::new(&surface, &config);
        traversal.cancellation_token().cancel();

        let harvest = traversal.run().await.expect("harvest");
        assert_eq!(harvest.outcome, Outcome::Cancelled);
        assert!(harvest.tree.is_empty());
        assert!(surface.selections().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_screenshot_is_attached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let surface = MemorySurface::new(vec![north()]);

        let (result, _) = run(&surface, &config().with_screenshots(dir.path())).await;
        let harvest = result.expect("harvest");

        let shot = harvest.failures[0].screenshot.as_ref().expect("screenshot");
        assert!(shot.exists());
        let name = shot.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("screenshot_district_North-B_"));
    }

    #[tokio::test]
    async fn test_invalid_config_halts_before_touching_surface() {
        let surface = MemorySurface::new(vec![north()]);
        let (result, _) = run(&surface, &config().with_retry_budget(0)).await;

        let halted = result.expect_err("halted");
        assert!(matches!(halted.error, Error::Config { .. }));
        assert_eq!(surface.read_count(), 0);
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("runtime")
            .block_on(future)
    }

    /// Zones of districts of offices of village counts.
    fn shapes() -> impl Strategy<Value = Vec<Vec<Vec<usize>>>> {
        prop::collection::vec(
            prop::collection::vec(prop::collection::vec(0usize..3, 0..3), 0..3),
            1..3,
        )
    }

    fn site_from_shape(shape: &[Vec<Vec<usize>>]) -> Vec<SiteNode> {
        shape
            .iter()
            .enumerate()
            .map(|(z, districts)| {
                let districts = districts
                    .iter()
                    .enumerate()
                    .map(|(d, offices)| {
                        let offices = offices
                            .iter()
                            .enumerate()
                            .map(|(o, villages)| {
                                let villages = (0..*villages)
                                    .map(|v| leaf(&format!("V{v}"), &format!("{z}.{d}.{o}.{v}")))
                                    .collect();
                                node(&format!("S{o}"), &format!("{z}.{d}.{o}"), villages)
                            })
                            .collect();
                        node(&format!("D{d}"), &format!("{z}.{d}"), offices)
                    })
                    .collect();
                node(&format!("Z{z}"), &z.to_string(), districts)
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_traversal_is_order_preserving_and_idempotent(shape in shapes()) {
            let site = site_from_shape(&shape);
            let config = config();

            let (first, second, replayed) = block_on(async {
                let (first, _) = run(&MemorySurface::new(site.clone()), &config).await;
                let first = first.expect("first run");
                let (second, _) = run(&MemorySurface::new(site.clone()), &config).await;
                let (replayed, _) = run(&MemorySurface::from_tree(&first.tree), &config).await;
                (first, second.expect("second run"), replayed.expect("replay"))
            });

            prop_assert!(same_shape(&site, first.tree.branches()));
            prop_assert_eq!(json(&first.tree), json(&second.tree));
            prop_assert_eq!(&first.tree, &replayed.tree);
        }

        #[test]
        fn prop_cancellation_yields_prefix(shape in shapes(), pick in any::<prop::sample::Index>()) {
            let site = site_from_shape(&shape);
            let config = config();

            let (full, selects) = block_on(async {
                let surface = MemorySurface::new(site.clone());
                let (full, _) = run(&surface, &config).await;
                (full.expect("full run"), surface.selections().len())
            });
            prop_assume!(selects > 0);
            let nth = pick.index(selects) + 1;

            let cancelled = block_on(async {
                let surface = MemorySurface::new(site.clone());
                let cancel = CancellationToken::new();
                cancel_on_select(&surface, &cancel, nth);
                Traversal::new(&surface, &config)
                    .with_cancellation(cancel)
                    .with_sink(Arc::new(crate::events::NullSink))
                    .run()
                    .await
                    .expect("cancelled run")
            });

            prop_assert_eq!(cancelled.outcome, Outcome::Cancelled);
            let full_order = preorder(&full.tree);
            let cut_order = preorder(&cancelled.tree);
            prop_assert!(full_order.starts_with(&cut_order));
        }
    }
}
