// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for task runner events.
//!
//! This module contains message types for logging events related to:
//! * Runner construction
//! * Dispatch calls rejected before reaching the engine
//! * Engine failures handed back to callers
//! * Runner shutdown

use crate::errors::TaskError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A runner started its graph engine.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunnerCreated<'a> {
    pub mode: &'a str,
    pub input_count: usize,
    pub output_count: usize,
}

impl Display for RunnerCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task runner created in {} mode with {} inputs and {} outputs",
            self.mode, self.input_count, self.output_count
        )
    }
}

impl StructuredLog for RunnerCreated<'_> {
    fn log(&self) {
        tracing::info!(
            mode = self.mode,
            input_count = self.input_count,
            output_count = self.output_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("runner", span_name = name, mode = self.mode)
    }
}

/// A dispatch call was refused before touching the engine.
///
/// # Log Level
/// `warn!` - Caller error
pub struct DispatchRejected<'a> {
    pub operation: &'a str,
    pub mode: &'a str,
    pub error: &'a TaskError,
}

impl Display for DispatchRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected {} on {} runner: {}",
            self.operation, self.mode, self.error
        )
    }
}

impl StructuredLog for DispatchRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            mode = self.mode,
            error_kind = self.error.kind(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "runner",
            span_name = name,
            operation = self.operation,
            mode = self.mode,
        )
    }
}

/// A timestamp did not advance past the last one sent.
///
/// # Log Level
/// `warn!` - Caller error
pub struct TimestampRejected<'a> {
    pub mode: &'a str,
    pub timestamp_ms: i64,
    pub last_ms: i64,
}

impl Display for TimestampRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Timestamp {} ms is not after the last sent {} ms",
            self.timestamp_ms, self.last_ms
        )
    }
}

impl StructuredLog for TimestampRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            mode = self.mode,
            timestamp_ms = self.timestamp_ms,
            last_ms = self.last_ms,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("runner", span_name = name, mode = self.mode)
    }
}

/// The engine recorded a failure that is now surfaced to a caller.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct EngineFailureSurfaced<'a> {
    pub mode: &'a str,
    pub error: &'a TaskError,
}

impl Display for EngineFailureSurfaced<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task runner ({}) observed engine failure: {}", self.mode, self.error)
    }
}

impl StructuredLog for EngineFailureSurfaced<'_> {
    fn log(&self) {
        tracing::error!(
            mode = self.mode,
            error_kind = self.error.kind(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("runner", span_name = name, mode = self.mode)
    }
}

/// The runner closed its engine after draining pending work.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunnerClosed<'a> {
    pub mode: &'a str,
    pub sent: u64,
}

impl Display for RunnerClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task runner ({}) closed after {} dispatched calls",
            self.mode, self.sent
        )
    }
}

impl StructuredLog for RunnerClosed<'_> {
    fn log(&self) {
        tracing::info!(mode = self.mode, sent = self.sent, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("runner", span_name = name, mode = self.mode)
    }
}

/// A runner went out of scope without `close()`; its engine was aborted.
///
/// # Log Level
/// `warn!` - Pending work may have been lost
pub struct RunnerDroppedOpen<'a> {
    pub mode: &'a str,
}

impl Display for RunnerDroppedOpen<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task runner ({}) dropped without close; aborting graph engine",
            self.mode
        )
    }
}

impl StructuredLog for RunnerDroppedOpen<'_> {
    fn log(&self) {
        tracing::warn!(mode = self.mode, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("runner", span_name = name, mode = self.mode)
    }
}
