//! Harvested hierarchy.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::model::Level;

// ============================================================================
// BranchStatus
// ============================================================================

/// Completion state of one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    /// The engine is still walking this branch.
    InProgress,
    /// Every child was visited.
    Complete,
    /// Abandoned after a failure or cancellation; holds the children
    /// collected up to that point.
    Partial,
}

impl BranchStatus {
    /// Returns `true` once the branch can no longer change.
    #[inline]
    #[must_use]
    pub fn is_sealed(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

// ============================================================================
// Branch
// ============================================================================

/// One harvested option and everything collected beneath it.
///
/// Villages are branches without children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Displayed option text.
    pub label: String,
    /// Level the option belongs to.
    pub level: Level,
    /// Completion state.
    pub status: BranchStatus,
    /// Children in site order.
    pub children: Vec<Branch>,
}

impl Branch {
    pub(crate) fn open(label: impl Into<String>, level: Level) -> Self {
        let status = if level.is_leaf() {
            BranchStatus::Complete
        } else {
            BranchStatus::InProgress
        };
        Self {
            label: label.into(),
            level,
            status,
            children: Vec::new(),
        }
    }

    /// Creates a branch the engine is about to walk.
    pub(crate) fn entered(label: impl Into<String>, level: Level) -> Self {
        Self {
            label: label.into(),
            level,
            status: BranchStatus::InProgress,
            children: Vec::new(),
        }
    }

    /// Returns the child with the given label.
    #[must_use]
    pub fn child(&self, label: &str) -> Option<&Branch> {
        self.children.iter().find(|c| c.label == label)
    }

    /// Returns the child labels in order.
    #[must_use]
    pub fn child_labels(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.label.as_str()).collect()
    }

    /// Returns `true` if this branch was abandoned.
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == BranchStatus::Partial
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Finalized harvest: zones in site order, each with its subtree.
///
/// Serializes as the nested mapping
/// `{zone: {district: {office: [village, ...]}}}` in site order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    branches: Vec<Branch>,
}

impl Tree {
    pub(crate) fn from_branches(branches: Vec<Branch>) -> Self {
        Self { branches }
    }

    /// Returns the zone branches.
    #[inline]
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Returns the number of zones.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Returns `true` if no zone was harvested.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Returns the branch at a label path.
    #[must_use]
    pub fn get(&self, labels: &[&str]) -> Option<&Branch> {
        let (first, rest) = labels.split_first()?;
        let mut branch = self.branches.iter().find(|b| b.label == *first)?;
        for label in rest {
            branch = branch.child(label)?;
        }
        Some(branch)
    }

    /// Returns the label paths of every partial branch, in traversal order.
    #[must_use]
    pub fn partial_paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut trail = Vec::new();
        for branch in &self.branches {
            collect_partial(branch, &mut trail, &mut out);
        }
        out
    }

    /// Returns one row per leaf-most branch, padded to four columns.
    ///
    /// Branches with no children still produce a row so empty districts and
    /// offices remain visible in flat listings.
    #[must_use]
    pub fn rows(&self) -> Vec<[String; 4]> {
        let mut out = Vec::new();
        let mut trail = Vec::new();
        for branch in &self.branches {
            collect_rows(branch, &mut trail, &mut out);
        }
        out
    }

    /// Returns the total number of villages.
    #[must_use]
    pub fn village_count(&self) -> usize {
        fn count(branch: &Branch) -> usize {
            if branch.level.is_leaf() {
                1
            } else {
                branch.children.iter().map(count).sum()
            }
        }
        self.branches.iter().map(count).sum()
    }
}

fn collect_partial(branch: &Branch, trail: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    trail.push(branch.label.clone());
    if branch.is_partial() {
        out.push(trail.clone());
    }
    for child in &branch.children {
        collect_partial(child, trail, out);
    }
    trail.pop();
}

fn collect_rows(branch: &Branch, trail: &mut Vec<String>, out: &mut Vec<[String; 4]>) {
    trail.push(branch.label.clone());
    if branch.children.is_empty() {
        let mut row: [String; 4] = Default::default();
        for (slot, label) in row.iter_mut().zip(trail.iter()) {
            slot.clone_from(label);
        }
        out.push(row);
    } else {
        for child in &branch.children {
            collect_rows(child, trail, out);
        }
    }
    trail.pop();
}

// ============================================================================
// Serialization
// ============================================================================

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.branches.len()))?;
        for branch in &self.branches {
            map.serialize_entry(&branch.label, &Contents(branch))?;
        }
        map.end()
    }
}

/// What a branch maps to: a label list above villages, a mapping elsewhere.
struct Contents<'a>(&'a Branch);

impl Serialize for Contents<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.level == Level::SubRegistrarOffice {
            let mut seq = serializer.serialize_seq(Some(self.0.children.len()))?;
            for village in &self.0.children {
                seq.serialize_element(&village.label)?;
            }
            seq.end()
        } else {
            let mut map = serializer.serialize_map(Some(self.0.children.len()))?;
            for child in &self.0.children {
                map.serialize_entry(&child.label, &Contents(child))?;
            }
            map.end()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
