// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph validation and assembly.

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Graph validation started.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct GraphValidationStarted {
    pub node_count: usize,
    pub input_count: usize,
    pub output_count: usize,
}

impl Display for GraphValidationStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Validating graph: {} nodes, {} inputs, {} outputs",
            self.node_count, self.input_count, self.output_count
        )
    }
}

impl StructuredLog for GraphValidationStarted {
    fn log(&self) {
        tracing::debug!(
            node_count = self.node_count,
            input_count = self.input_count,
            output_count = self.output_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "validation",
            span_name = name,
            node_count = self.node_count,
        )
    }
}

/// One structural problem found in a graph.
///
/// # Log Level
/// `error!` - The graph will be rejected
pub struct GraphValidationIssue<'a> {
    pub error: &'a ValidationError,
}

impl Display for GraphValidationIssue<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph validation failed: {}", self.error)
    }
}

impl StructuredLog for GraphValidationIssue<'_> {
    fn log(&self) {
        tracing::error!(issue = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("validation", span_name = name, issue = %self.error)
    }
}

/// Cycle found among graph nodes.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct CyclicStreamDetected<'a> {
    pub cycle: &'a [String],
}

impl Display for CyclicStreamDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic stream dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicStreamDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "validation",
            span_name = name,
            cycle = self.cycle.join(" -> "),
        )
    }
}

/// A task graph was assembled and validated.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct GraphAssembled<'a> {
    pub task_graph: &'a str,
    pub node_count: usize,
    pub flow_limiting: bool,
}

impl Display for GraphAssembled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Assembled graph for '{}' with {} node(s), flow limiting {}",
            self.task_graph,
            self.node_count,
            if self.flow_limiting { "on" } else { "off" }
        )
    }
}

impl StructuredLog for GraphAssembled<'_> {
    fn log(&self) {
        tracing::debug!(
            task_graph = self.task_graph,
            node_count = self.node_count,
            flow_limiting = self.flow_limiting,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "graph",
            span_name = name,
            task_graph = self.task_graph,
            flow_limiting = self.flow_limiting,
        )
    }
}
