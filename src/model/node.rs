//! Selectable options and traversal paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Level;

// ============================================================================
// Node
// ============================================================================

/// One selectable option at one level.
///
/// `label` is what the page shows and what the accumulator keys by; `value`
/// is what must be handed back to the surface to reselect the option.
/// Labels are unique only among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Level this option belongs to.
    pub level: Level,
    /// Displayed option text.
    pub label: String,
    /// Underlying option value.
    pub value: String,
}

impl Node {
    /// Creates a node.
    #[inline]
    #[must_use]
    pub fn new(level: Level, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            level,
            label: label.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Path
// ============================================================================

/// Position of the depth-first walk, from Zone down to the current node.
///
/// The root position is the empty path. Every push must be one level below
/// the current last node, so `len()` always equals the current level's rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    nodes: Vec<Node>,
}

impl Path {
    /// Creates the root path.
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Appends a node one level below the current position.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the node is not at the next level.
    pub fn push(&mut self, node: Node) {
        debug_assert_eq!(
            node.level.rank(),
            self.nodes.len() + 1,
            "path depth must equal level rank"
        );
        self.nodes.push(node);
    }

    /// Removes and returns the last node.
    #[inline]
    pub fn pop(&mut self) -> Option<Node> {
        self.nodes.pop()
    }

    /// Returns the last node, or `None` at the root.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Returns the level of the last node, or `None` at the root.
    #[inline]
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        self.nodes.last().map(|n| n.level)
    }

    /// Returns the level whose options are children of this position.
    #[inline]
    #[must_use]
    pub fn child_level(&self) -> Option<Level> {
        match self.level() {
            None => Some(Level::Zone),
            Some(level) => level.child(),
        }
    }

    /// Returns the number of nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` at the root.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the nodes top first.
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the labels top first.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.label.clone()).collect()
    }

    /// Returns a copy extended by one node.
    #[must_use]
    pub fn joined(&self, node: Node) -> Self {
        let mut path = self.clone();
        path.push(node);
        path
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return f.write_str("/");
        }
        for node in &self.nodes {
            write!(f, "/{}", node.label)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn north_a() -> Path {
        let mut path = Path::root();
        path.push(Node::new(Level::Zone, "North", "1"));
        path.push(Node::new(Level::District, "A", "11"));
        path
    }

    #[test]
    fn test_len_matches_rank() {
        let path = north_a();
        assert_eq!(path.len(), Level::District.rank());
        assert_eq!(path.level(), Some(Level::District));
        assert_eq!(path.child_level(), Some(Level::SubRegistrarOffice));
    }

    #[test]
    fn test_root() {
        let path = Path::root();
        assert!(path.is_root());
        assert_eq!(path.level(), None);
        assert_eq!(path.child_level(), Some(Level::Zone));
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn test_push_pop() {
        let mut path = north_a();
        let popped = path.pop().expect("node");
        assert_eq!(popped.label, "A");
        assert_eq!(path.labels(), vec!["North".to_string()]);
    }

    #[test]
    fn test_display() {
        assert_eq!(north_a().to_string(), "/North/A");
    }

    #[test]
    fn test_village_has_no_child_level() {
        let path = north_a()
            .joined(Node::new(Level::SubRegistrarOffice, "A1", "111"))
            .joined(Node::new(Level::Village, "V1", "1111"));
        assert_eq!(path.child_level(), None);
    }

    #[test]
    #[should_panic(expected = "path depth must equal level rank")]
    fn test_push_skipping_level_panics() {
        let mut path = Path::root();
        path.push(Node::new(Level::District, "A", "11"));
    }
}
