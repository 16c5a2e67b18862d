// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod builder;
mod graph;
mod loader;
mod options;
mod stream;
mod validation;

pub mod consts;

pub use builder::GraphConfigBuilder;
pub use graph::{GraphConfig, NodeConfig, NodeOptions};
pub use loader::{load_and_build, load_task_config, SideValue, TaskConfig, TaskNodeConfig};
pub use options::{FlowLimiterOptions, PassThroughOptions};
pub use stream::{parse_streams, StreamSpec};
pub use validation::validate_graph;
