// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Calculator that bounds in-flight and queued inputs for live streams.
pub const FLOW_LIMITER_CALCULATOR: &str = "FlowLimiterCalculator";
/// Calculator that forwards every input stream to the output stream at the same position.
pub const PASS_THROUGH_CALCULATOR: &str = "PassThroughCalculator";
/// Prefix given to the limiter's output streams.
pub const THROTTLED_PREFIX: &str = "throttled_";
/// Tag of the limiter's back-edge input, fed by the task node's first output.
pub const FINISHED_TAG: &str = "FINISHED";
/// At most one input is processed at a time when flow limiting is enabled.
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 1;
/// At most one input waits behind the in-flight one; older waiting inputs are dropped.
pub const DEFAULT_MAX_IN_QUEUE: u32 = 1;
/// Caller-facing timestamps are milliseconds, engine timestamps are microseconds.
pub const MICROS_PER_MILLI: i64 = 1_000;
