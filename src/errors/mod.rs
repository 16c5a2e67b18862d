// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod task;
mod validation;

pub use config::ConfigError;
pub use task::TaskError;
pub use validation::ValidationError;
