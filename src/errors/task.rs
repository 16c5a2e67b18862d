// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The error taxonomy shared by packets, graph configuration and task runners.
//!
//! Every variant maps to one failure category callers can match on. Messages are
//! free-form and meant for humans; tests and callers should match on the variant.

use thiserror::Error;

/// Failure categories surfaced by every public operation in the crate.
///
/// `TaskError` is `Clone` so that a failure recorded on a graph engine thread can be
/// handed out again to each caller that touches the runner afterwards.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Malformed configuration, missing required fields, incompatible
    /// mode/callback pairing or an out-of-range value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not legal for the runner's mode or the runner is closed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A buffer index was not smaller than its dimension.
    #[error("Index {index} is out of bounds for dimension {dimension} of size {size}")]
    IndexOutOfBounds {
        dimension: usize,
        index: usize,
        size: usize,
    },

    /// The number of buffer indices does not fit the buffer's shape.
    #[error("Expected {expected} indices, got {actual}")]
    DimensionMismatch { expected: String, actual: usize },

    /// An integer does not fit the requested width.
    #[error("Value {value} does not fit in {target}")]
    Overflow { value: String, target: &'static str },

    /// A calculator, side packet, stream or message type could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Opaque failure reported by the graph engine.
    #[error("Graph engine failure: {0}")]
    EngineFailure(String),
}

impl TaskError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        TaskError::InvalidArgument(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        TaskError::InvalidState(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        TaskError::NotFound(message.into())
    }

    pub(crate) fn engine_failure(message: impl Into<String>) -> Self {
        TaskError::EngineFailure(message.into())
    }

    pub(crate) fn overflow(value: impl ToString, target: &'static str) -> Self {
        TaskError::Overflow {
            value: value.to_string(),
            target,
        }
    }

    /// Short, stable name of the category, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::InvalidArgument(_) => "invalid_argument",
            TaskError::InvalidState(_) => "invalid_state",
            TaskError::IndexOutOfBounds { .. } => "index_out_of_bounds",
            TaskError::DimensionMismatch { .. } => "dimension_mismatch",
            TaskError::Overflow { .. } => "overflow",
            TaskError::NotFound(_) => "not_found",
            TaskError::EngineFailure(_) => "engine_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = TaskError::IndexOutOfBounds {
            dimension: 1,
            index: 7,
            size: 4,
        };
        assert_eq!(
            err.to_string(),
            "Index 7 is out of bounds for dimension 1 of size 4"
        );

        let err = TaskError::overflow(128, "int8");
        assert_eq!(err.to_string(), "Value 128 does not fit in int8");
        assert_eq!(err.kind(), "overflow");
    }
}
