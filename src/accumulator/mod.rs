//! Hierarchical accumulator.
//!
//! The in-memory tree the traversal engine fills while it walks. It is keyed
//! by label path (labels are only unique among siblings), keeps children in
//! the order the site lists them, and refuses to touch a branch once it has
//! been sealed as complete or partial.
//!
//! The accumulator is never shown to exporters while a traversal runs;
//! [`Accumulator::finalize`] hands out the finished [`Tree`].

// ============================================================================
// Submodules
// ============================================================================

/// Harvested hierarchy types.
pub mod tree;

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::{Node, Path};

pub use tree::{Branch, BranchStatus, Tree};

// ============================================================================
// Accumulator
// ============================================================================

/// Mutable tree under construction.
#[derive(Debug, Default)]
pub struct Accumulator {
    roots: Vec<Branch>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the entry at `path` exists and merges `children` under it.
    ///
    /// Missing ancestors and the entry itself are created in order and left
    /// in progress. Children already present keep their subtrees; new ones
    /// are appended in the given order, villages already complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Accumulator`] if the entry or an ancestor is sealed.
    pub fn record(&mut self, path: &Path, children: &[Node]) -> Result<()> {
        let siblings = if path.is_root() {
            &mut self.roots
        } else {
            let branch = descend(&mut self.roots, path.nodes(), true)?
                .ok_or_else(|| Error::accumulator(format!("cannot create {path}")))?;
            if branch.status.is_sealed() && !children.is_empty() {
                return Err(Error::accumulator(format!("{path} is sealed")));
            }
            &mut branch.children
        };

        for node in children {
            if !siblings.iter().any(|b| b.label == node.label) {
                siblings.push(Branch::open(&node.label, node.level));
            }
        }

        trace!(%path, children = children.len(), "Recorded");
        Ok(())
    }

    /// Flags the branch at `path` as incomplete, keeping its children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Accumulator`] if the branch is missing or was already
    /// sealed as complete.
    pub fn mark_partial(&mut self, path: &Path) -> Result<()> {
        let branch = self.branch_mut(path)?;
        match branch.status {
            BranchStatus::Complete => Err(Error::accumulator(format!(
                "{path} is complete and cannot become partial"
            ))),
            _ => {
                branch.status = BranchStatus::Partial;
                Ok(())
            }
        }
    }

    /// Seals the branch at `path` as complete.
    ///
    /// Sealing an already partial branch keeps it partial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Accumulator`] if the branch is missing.
    pub fn complete(&mut self, path: &Path) -> Result<()> {
        let branch = self.branch_mut(path)?;
        if branch.status == BranchStatus::InProgress {
            branch.status = BranchStatus::Complete;
        }
        Ok(())
    }

    /// Removes the branch at `path` together with its subtree.
    ///
    /// Returns `true` if a branch was removed.
    pub fn discard(&mut self, path: &Path) -> bool {
        let Some((last, ancestors)) = path.nodes().split_last() else {
            return false;
        };

        let siblings = if ancestors.is_empty() {
            &mut self.roots
        } else {
            match descend(&mut self.roots, ancestors, false) {
                Ok(Some(parent)) => &mut parent.children,
                _ => return false,
            }
        };

        let before = siblings.len();
        siblings.retain(|b| b.label != last.label);
        siblings.len() != before
    }

    /// Returns `true` if any branch is still being walked.
    #[must_use]
    pub fn has_open_branches(&self) -> bool {
        fn open(branch: &Branch) -> bool {
            branch.status == BranchStatus::InProgress || branch.children.iter().any(open)
        }
        self.roots.iter().any(open)
    }

    /// Returns the finished tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Accumulator`] while any branch is still in progress.
    pub fn finalize(self) -> Result<Tree> {
        if self.has_open_branches() {
            return Err(Error::accumulator(
                "cannot finalize while branches are in progress",
            ));
        }
        Ok(Tree::from_branches(self.roots))
    }

    fn branch_mut(&mut self, path: &Path) -> Result<&mut Branch> {
        descend(&mut self.roots, path.nodes(), false)?
            .ok_or_else(|| Error::accumulator(format!("no branch at {path}")))
    }
}

/// Walks `nodes` down from `siblings`, optionally creating missing entries.
fn descend<'a>(
    siblings: &'a mut Vec<Branch>,
    nodes: &[Node],
    create: bool,
) -> Result<Option<&'a mut Branch>> {
    let Some((head, rest)) = nodes.split_first() else {
        return Ok(None);
    };

    let pos = match siblings.iter().position(|b| b.label == head.label) {
        Some(pos) => pos,
        None if create => {
            siblings.push(Branch::entered(&head.label, head.level));
            siblings.len() - 1
        }
        None => return Ok(None),
    };

    let branch = &mut siblings[pos];
    if rest.is_empty() {
        return Ok(Some(branch));
    }
    if create && branch.status.is_sealed() {
        return Err(Error::accumulator(format!(
            "cannot extend sealed branch '{}'",
            branch.label
        )));
    }
    descend(&mut branch.children, rest, create)
}

// ============================================================================
// Tests
// ============================================================================
