// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Structural problems found while validating a graph configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A stream reference could not be parsed
    MalformedStream {
        /// Node label, or `graph` for graph-level declarations
        owner: String,
        /// Parser message
        reason: String,
    },
    /// Two nodes, or a node and the graph inputs, produce the same stream
    DuplicateProducer {
        stream: String,
        producers: Vec<String>,
    },
    /// A node consumes a stream that nothing produces
    UnresolvedStream { node: String, stream: String },
    /// A declared graph input stream is never consumed
    UnusedInput { stream: String },
    /// A declared graph output stream is never produced
    MissingOutput { stream: String },
    /// Nodes form a cycle that is not broken by a back edge
    CyclicStream {
        /// The node path showing the cycle
        cycle: Vec<String>,
    },
    /// Node options do not name a serializable message type
    UnresolvableOptions { node: String, type_url: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedStream { owner, reason } => {
                write!(f, "'{}' has a malformed stream: {}", owner, reason)
            }
            ValidationError::DuplicateProducer { stream, producers } => {
                write!(
                    f,
                    "Stream '{}' is produced more than once: {}",
                    stream,
                    producers.join(", ")
                )
            }
            ValidationError::UnresolvedStream { node, stream } => {
                write!(
                    f,
                    "Node '{}' consumes '{}' which nothing produces",
                    node, stream
                )
            }
            ValidationError::UnusedInput { stream } => {
                write!(f, "Graph input '{}' is never consumed", stream)
            }
            ValidationError::MissingOutput { stream } => {
                write!(f, "Graph output '{}' is never produced", stream)
            }
            ValidationError::CyclicStream { cycle } => {
                write!(f, "Cyclic stream dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvableOptions { node, type_url } => {
                write!(
                    f,
                    "Node '{}' has options of unresolvable type '{}'",
                    node, type_url
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
