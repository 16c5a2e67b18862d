// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable text and
//! [`StructuredLog`] to emit the same event with structured fields at its level.
//!
//! # Organization
//!
//! * `buffer` - borrowed buffer aliasing and external reference release
//! * `config` - graph validation and assembly
//! * `engine` - graph engine lifecycle, calculator failures and dropped inputs
//! * `runner` - task runner construction, dispatch rejections and shutdown
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_taskrunner::observability::messages::runner::RunnerClosed;
//! use the_taskrunner::observability::messages::StructuredLog;
//!
//! RunnerClosed { mode: "streaming", sent: 12 }.log();
//! ```

use tracing::Span;

pub mod buffer;
pub mod config;
pub mod engine;
pub mod runner;

/// A log event that knows its level and structured fields.
pub trait StructuredLog {
    /// Emit the event at its level with structured fields.
    fn log(&self);

    /// Build a span carrying the event's fields.
    fn span(&self, name: &str) -> Span;
}
