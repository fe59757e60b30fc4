// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error type shared by every stage of the graph pipeline.

use animexpr_motion::MotionError;
use thiserror::Error;

/// Errors raised while compiling, evaluating or converting a graph.
///
/// All of these describe a defect in the graph as built; none are meant to
/// be retried.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node lacks a field its type requires
    #[error("{field} missing in {node_type}")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
        /// Wire type of the node
        node_type: &'static str,
    },

    /// A wire type string has no node type
    #[error("node type {0} not found")]
    UnknownNodeType(String),

    /// A conversion was asked for a node that does not exist
    #[error("value not defined")]
    ValueNotDefined,

    /// A node that must write to a cell targets something else
    #[error("target of {node_type} is not a value node")]
    InvalidTarget {
        /// Wire type of the writing node
        node_type: &'static str,
    },

    /// A procedure was called with the wrong number of arguments
    #[error("procedure expects {expected} arguments, got {got}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// A serialized tree refers to a cell that is not registered
    #[error("no cell registered for tag {0}")]
    UnknownCellTag(u64),

    /// An animation run was configured with invalid physics
    #[error("invalid motion config: {0}")]
    Motion(#[from] MotionError),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encoding error
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    /// RON decoding error
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// Binary encoding error
    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
}

impl GraphError {
    /// Shorthand for [`GraphError::MissingField`]
    pub fn missing(field: &'static str, node_type: &'static str) -> Self {
        Self::MissingField { field, node_type }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_field_and_type() {
        assert_eq!(
            GraphError::missing("source", "set").to_string(),
            "source missing in set"
        );
        assert_eq!(
            GraphError::UnknownNodeType("bogus".into()).to_string(),
            "node type bogus not found"
        );
    }
}
