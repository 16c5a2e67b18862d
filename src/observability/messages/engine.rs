// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph engine lifecycle and scheduling events.
//!
//! This module contains message types for logging events related to:
//! * Engine start, finish and abort
//! * Calculator failures
//! * Inputs dropped by flow control
//! * Output delivery

use crate::errors::TaskError;
use crate::observability::messages::StructuredLog;
use crate::packets::Timestamp;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Graph engine opened its nodes and is accepting inputs.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EngineStarted<'a> {
    pub node_count: usize,
    pub input_streams: &'a [String],
    pub output_streams: &'a [String],
}

impl Display for EngineStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph engine started: {} nodes, inputs [{}], outputs [{}]",
            self.node_count,
            self.input_streams.join(", "),
            self.output_streams.join(", ")
        )
    }
}

impl StructuredLog for EngineStarted<'_> {
    fn log(&self) {
        tracing::info!(
            node_count = self.node_count,
            input_streams = self.input_streams.join(","),
            output_streams = self.output_streams.join(","),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "engine",
            span_name = name,
            node_count = self.node_count,
        )
    }
}

/// A calculator returned an error; the graph stops.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct CalculatorFailed<'a> {
    pub node: &'a str,
    pub calculator: &'a str,
    pub timestamp: Timestamp,
    pub error: &'a TaskError,
}

impl Display for CalculatorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' ({}) failed at {}: {}",
            self.node, self.calculator, self.timestamp, self.error
        )
    }
}

impl StructuredLog for CalculatorFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node = self.node,
            calculator = self.calculator,
            timestamp = %self.timestamp,
            error_kind = self.error.kind(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "engine",
            span_name = name,
            node = self.node,
            timestamp = %self.timestamp,
        )
    }
}

/// A node dropped the inputs at one timestamp.
///
/// # Log Level
/// `debug!` - Expected under flow control
pub struct InputDropped<'a> {
    pub node: &'a str,
    pub timestamp: Timestamp,
}

impl Display for InputDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' dropped inputs at {}", self.node, self.timestamp)
    }
}

impl StructuredLog for InputDropped<'_> {
    fn log(&self) {
        tracing::debug!(node = self.node, timestamp = %self.timestamp, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "engine",
            span_name = name,
            node = self.node,
            timestamp = %self.timestamp,
        )
    }
}

/// Outputs for one timestamp are complete and were handed off.
///
/// # Log Level
/// `trace!` - Per-timestamp detail
pub struct OutputsDelivered {
    pub timestamp: Timestamp,
    pub stream_count: usize,
    pub to_waiter: bool,
}

impl Display for OutputsDelivered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Delivered {} output stream(s) at {} to {}",
            self.stream_count,
            self.timestamp,
            if self.to_waiter { "waiter" } else { "callback" }
        )
    }
}

impl StructuredLog for OutputsDelivered {
    fn log(&self) {
        tracing::trace!(
            timestamp = %self.timestamp,
            stream_count = self.stream_count,
            to_waiter = self.to_waiter,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "engine",
            span_name = name,
            timestamp = %self.timestamp,
        )
    }
}

/// The graph was stopped before its queued work drained.
///
/// # Log Level
/// `warn!` - Work was discarded
pub struct EngineAborted {
    pub pending_invocations: usize,
}

impl Display for EngineAborted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph engine aborted with {} pending invocation(s)",
            self.pending_invocations
        )
    }
}

impl StructuredLog for EngineAborted {
    fn log(&self) {
        tracing::warn!(pending_invocations = self.pending_invocations, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "engine",
            span_name = name,
            pending_invocations = self.pending_invocations,
        )
    }
}

/// The graph drained and closed every node.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EngineFinished {
    pub invocations: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl Display for EngineFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph engine finished: {} invocations, {} output sets delivered, {} inputs dropped",
            self.invocations, self.delivered, self.dropped
        )
    }
}

impl StructuredLog for EngineFinished {
    fn log(&self) {
        tracing::info!(
            invocations = self.invocations,
            delivered = self.delivered,
            dropped = self.dropped,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "engine",
            span_name = name,
            invocations = self.invocations,
        )
    }
}
