// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Option messages understood by the built-in calculators.
//!
//! These are hand-declared `prost` messages; they travel inside
//! [`NodeOptions`](crate::config::NodeOptions) as type-url-tagged bytes.

use crate::config::consts::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_MAX_IN_QUEUE};

/// Bounds for the flow limiter node.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FlowLimiterOptions {
    /// Inputs admitted downstream that have not yet produced a `FINISHED` packet.
    #[prost(uint32, tag = "1")]
    pub max_in_flight: u32,
    /// Inputs held back while the in-flight limit is reached. Zero drops them outright.
    #[prost(uint32, tag = "2")]
    pub max_in_queue: u32,
}

impl FlowLimiterOptions {
    pub fn bounded() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_in_queue: DEFAULT_MAX_IN_QUEUE,
        }
    }
}

impl prost::Name for FlowLimiterOptions {
    const NAME: &'static str = "FlowLimiterOptions";
    const PACKAGE: &'static str = "taskrunner";
}

/// Options for the pass-through calculator.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PassThroughOptions {
    /// Simulated per-invocation work, in milliseconds.
    #[prost(uint32, tag = "1")]
    pub delay_ms: u32,
    /// Fail every invocation whose input timestamp is at or past this many microseconds.
    #[prost(int64, optional, tag = "2")]
    pub fail_at_micros: Option<i64>,
}

impl prost::Name for PassThroughOptions {
    const NAME: &'static str = "PassThroughOptions";
    const PACKAGE: &'static str = "taskrunner";
}
