//! Evaluation limits.

/// Resource limits for one evaluation session.
///
/// Evaluation is a full materialization of every intermediate multiset and
/// backward pointers are full store scans, so hosts bound the work here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalBudget {
    /// Maximum nesting of expression evaluation.
    pub max_depth: usize,
    /// Maximum size of any materialized multiset or input-tuple list.
    pub max_rows: usize,
}

impl Default for EvalBudget {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_rows: 1_000_000,
        }
    }
}

impl EvalBudget {
    /// Create a budget with custom limits.
    pub fn new(max_depth: usize, max_rows: usize) -> Self {
        Self {
            max_depth,
            max_rows,
        }
    }

    /// Create an unlimited budget (use with caution).
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_rows: usize::MAX,
        }
    }

    /// Set the depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the row limit.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}
