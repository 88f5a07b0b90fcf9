//! # Optimizer Errors
//!
//! Only resource-exhaustion outcomes are represented here. They abort the current
//! search operation and travel up to the driver unchanged; memo state committed
//! before the abort stays valid.
//!
//! Invariant violations (duplicate-insert bypass, pattern/arity mismatch, deriving
//! from incomplete children, inserting into a closed group) are programming errors
//! and panic with a message naming the offending group or expression. Binding
//! exhaustion, contradictions and unbounded constraints are ordinary return values.

/// Errors that abort a search operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptError {
    /// The cancellation flag was raised (timeout or explicit cancel).
    #[error("optimization cancelled")]
    Cancelled,
    /// Recursion went deeper than the configured limit.
    #[error("recursion depth limit of {limit} exceeded")]
    DepthExceeded { limit: usize },
    /// A driver handed the join-order enumerator an unusable join graph.
    #[error("invalid join graph: {0}")]
    InvalidJoinGraph(String),
}

impl OptError {
    /// Whether this error means the search was aborted (as opposed to rejected input).
    pub fn is_abort(&self) -> bool {
        matches!(self, OptError::Cancelled | OptError::DepthExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, OptError>;
