//! Error types for graph construction and MCMC execution.
//!
//! Two classes of failure are reported through [`DagError`]:
//!
//! - **Structural** errors (cycles, type mismatches, missing edges) abort the
//!   operation before anything is modified.
//! - **Lifecycle** errors (destroying a referenced node, committing a node that
//!   was never touched) are programming errors in the caller.
//!
//! Numerical excursions are deliberately *not* errors. A log-probability of
//! negative infinity or NaN is a normal value that the move engine turns into
//! a rejection.

use thiserror::Error;

use crate::dag::NodeId;
use crate::value::ValueType;

/// Coarse classification of a [`DagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Lifecycle,
}

/// Errors raised by graph and move operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DagError {
    /// The handle does not refer to a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Inserting the edge would make the graph cyclic.
    #[error("cannot add '{parent}' as a parent of '{child}': the edge would create a cycle")]
    Cycle { parent: String, child: String },

    /// A value or node of the wrong type was supplied for a slot.
    #[error("type mismatch for '{node}': expected {expected}, found {found}")]
    TypeMismatch {
        node: String,
        expected: ValueType,
        found: ValueType,
    },

    /// A value does not satisfy the declared type (range or variant).
    #[error("value {value} is not a valid {expected} for '{node}'")]
    InvalidValue {
        node: String,
        expected: ValueType,
        value: String,
    },

    /// The function or distribution does not take this many arguments.
    #[error("'{node}' cannot take {arity} parent(s)")]
    Arity { node: String, arity: usize },

    /// `old` is not currently a parent of `child`.
    #[error("'{parent}' is not a parent of '{child}'")]
    NotAParent { parent: String, child: String },

    /// The operation only applies to another node kind.
    #[error("'{node}' is a {kind} node, expected {expected}")]
    WrongKind {
        node: String,
        kind: &'static str,
        expected: &'static str,
    },

    /// A node still referenced by parents' children or handles was destroyed.
    #[error("cannot destroy '{node}': {references} reference(s) remain")]
    StillReferenced { node: String, references: usize },

    /// `keep`, `restore` or a similar commit step hit an untouched node.
    #[error("cannot {operation} '{node}': the node was never touched")]
    NotTouched {
        node: String,
        operation: &'static str,
    },

    /// Clamping is only legal on a clean node.
    #[error("cannot clamp '{node}' while it is touched")]
    ClampWhileTouched { node: String },
}

impl DagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DagError::StillReferenced { .. }
            | DagError::NotTouched { .. }
            | DagError::ClampWhileTouched { .. } => ErrorKind::Lifecycle,
            _ => ErrorKind::Structural,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }
}

/// Errors raised while loading a move configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T, E = DagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let cycle = DagError::Cycle {
            parent: "a".into(),
            child: "b".into(),
        };
        assert_eq!(cycle.kind(), ErrorKind::Structural);

        let referenced = DagError::StillReferenced {
            node: "a".into(),
            references: 2,
        };
        assert_eq!(referenced.kind(), ErrorKind::Lifecycle);
        assert!(!referenced.is_structural());
    }

    #[test]
    fn messages_name_the_nodes() {
        let err = DagError::NotAParent {
            parent: "mu".into(),
            child: "x".into(),
        };
        assert_eq!(err.to_string(), "'mu' is not a parent of 'x'");
    }
}
