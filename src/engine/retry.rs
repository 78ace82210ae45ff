//! Per-node retry budget.

// ============================================================================
// RetryBudget
// ============================================================================

/// Counts the recoverable failures a single node may absorb.
///
/// A fresh budget is created every time the engine enters a node. Each
/// recoverable failure is charged once; the failure that brings the count to
/// zero abandons the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    remaining: u32,
}

impl RetryBudget {
    /// Creates a budget allowing `limit` attempts.
    #[inline]
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Charges one failure.
    ///
    /// Returns `true` if another attempt is allowed.
    #[inline]
    pub fn charge(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }

    /// Returns the number of attempts still available.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns the number of failures charged so far.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.limit - self.remaining
    }

    /// Returns `true` once no attempt is left.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
