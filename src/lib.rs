// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // graph config, builder, validation, task files
pub mod engine;        // local graph engine + built-in calculators
pub mod errors;        // error handling
pub mod observability; // structured log messages
pub mod packets;       // packets, buffers, timestamps
pub mod task;          // task runners and running modes
pub mod traits;        // calculator + engine abstractions
