// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Task runners: the caller-facing layer over a graph engine.
//!
//! [`TaskRunner`] accepts all three running modes and checks each call against the
//! mode at runtime. [`SingleShotRunner`], [`SequentialRunner`] and [`StreamingRunner`]
//! fix the mode in the type instead.

pub mod runner;
pub mod running_mode;
pub mod typed;

pub use runner::{ScopedFuture, TaskRunner, TaskRunnerBuilder};
pub use running_mode::{Operation, RunningMode, RunningModeValidator};
pub use typed::{Runner, SequentialRunner, SingleShotRunner, StreamingRunner};
