//! BipartError: unified error type for mlbipart public APIs
//!
//! Every fallible operation of the crate (graph construction, strategy
//! parsing and evaluation, bipartitioning methods, distributed coarsening)
//! reports through this type. Internal consistency violations are not part of
//! it: they are debug-build invariant panics (see [`crate::debug_invariants`]).

use thiserror::Error;

/// Severity ranking used when two failures must be reduced to one, as in the
/// `select` strategy node. Higher is worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Inconsistent internal state reported by a release-mode check.
    Internal,
    /// A method or condition could not do its job on this graph.
    Method,
    /// The caller's inputs (graph or strategy text) are wrong.
    Input,
    /// The message-passing layer failed.
    Communication,
    /// Memory is exhausted.
    Resource,
}

/// Unified error type for mlbipart operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BipartError {
    /// Allocation failed while building `what`.
    #[error("out of memory while allocating {0}")]
    OutOfMemory(&'static str),
    /// A send, receive or wait on a neighbor failed; the whole round is aborted.
    #[error("communication error with rank {neighbor}: {detail}")]
    CommError {
        neighbor: usize,
        detail: String,
    },
    /// A terminal bipartitioning method could not compute a bipartition.
    #[error("bipartitioning method `{method}` failed: {reason}")]
    MethodFailed {
        method: &'static str,
        reason: String,
    },
    /// A strategy condition could not be evaluated (type mismatch, unknown variable).
    #[error("strategy condition evaluation failed: {0}")]
    StrategyEval(String),
    /// Strategy text is malformed.
    #[error("strategy parse error at offset {pos}: {msg}")]
    StrategyParse { pos: usize, msg: String },
    /// A method received a parameter record it does not understand.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The input graph violates a structural requirement.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// A release-mode internal check failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BipartError {
    /// Severity class of this error.
    pub fn severity(&self) -> Severity {
        match self {
            BipartError::Internal(_) => Severity::Internal,
            BipartError::MethodFailed { .. }
            | BipartError::StrategyEval(_)
            | BipartError::InvalidParameter(_) => Severity::Method,
            BipartError::StrategyParse { .. } | BipartError::InvalidGraph(_) => Severity::Input,
            BipartError::CommError { .. } => Severity::Communication,
            BipartError::OutOfMemory(_) => Severity::Resource,
        }
    }

    /// Returns the more severe of two errors; `self` wins ties.
    pub fn worst(self, other: BipartError) -> BipartError {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub(crate) fn comm(neighbor: usize, what: impl Into<String>) -> Self {
        BipartError::CommError {
            neighbor,
            detail: what.into(),
        }
    }
}

impl From<std::collections::TryReserveError> for BipartError {
    fn from(_: std::collections::TryReserveError) -> Self {
        BipartError::OutOfMemory("array")
    }
}
