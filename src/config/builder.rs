// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Assembly of task graphs.
//!
//! [`GraphConfigBuilder`] wraps one task node in a graph. With flow limiting enabled a
//! [`FlowLimiterCalculator`](crate::engine::FlowLimiterCalculator) node is placed in
//! front of the task node:
//!
//! ```text
//!   in ──► FlowLimiter ──throttled_in──► task ──► out
//!              ▲                               │
//!              └────────── FINISHED:out ◄──────┘
//! ```
//!
//! The limiter sees the task's first output on its `FINISHED` back edge and admits the
//! next input only then, dropping stale inputs that arrive in between.

use crate::config::consts::{FINISHED_TAG, FLOW_LIMITER_CALCULATOR};
use crate::config::graph::{GraphConfig, NodeConfig, NodeOptions};
use crate::config::options::FlowLimiterOptions;
use crate::config::stream::{parse_streams, StreamSpec};
use crate::errors::TaskError;
use crate::observability::messages::config::GraphAssembled;
use crate::observability::messages::StructuredLog;

#[derive(Clone, Debug, Default)]
pub struct GraphConfigBuilder {
    task_graph: Option<String>,
    input_streams: Vec<String>,
    output_streams: Vec<String>,
    options: Option<NodeOptions>,
    flow_limiting: bool,
    input_side_packets: Vec<String>,
    output_side_packets: Vec<String>,
}

impl GraphConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator name of the task node.
    pub fn task_graph(mut self, name: impl Into<String>) -> Self {
        self.task_graph = Some(name.into());
        self
    }

    pub fn input_stream(mut self, spec: impl Into<String>) -> Self {
        self.input_streams.push(spec.into());
        self
    }

    pub fn input_streams<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_streams.extend(specs.into_iter().map(Into::into));
        self
    }

    pub fn output_stream(mut self, spec: impl Into<String>) -> Self {
        self.output_streams.push(spec.into());
        self
    }

    pub fn output_streams<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_streams.extend(specs.into_iter().map(Into::into));
        self
    }

    pub fn options(mut self, options: NodeOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Pack a `prost` message as the task node's options.
    pub fn options_message<M: prost::Message + prost::Name>(self, message: &M) -> Self {
        self.options(NodeOptions::pack(message))
    }

    pub fn enable_flow_limiting(mut self, enabled: bool) -> Self {
        self.flow_limiting = enabled;
        self
    }

    pub fn input_side_packet(mut self, name: impl Into<String>) -> Self {
        self.input_side_packets.push(name.into());
        self
    }

    pub fn output_side_packet(mut self, name: impl Into<String>) -> Self {
        self.output_side_packets.push(name.into());
        self
    }

    pub fn build(&self) -> Result<GraphConfig, TaskError> {
        let task_graph = self
            .task_graph
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TaskError::invalid_argument("task graph name is required"))?;
        let options = self
            .options
            .as_ref()
            .ok_or_else(|| TaskError::invalid_argument("task options are required"))?;
        if self.input_streams.is_empty() {
            return Err(TaskError::invalid_argument(
                "at least one input stream is required",
            ));
        }
        if self.output_streams.is_empty() {
            return Err(TaskError::invalid_argument(
                "at least one output stream is required",
            ));
        }
        options.check_type_url()?;

        let inputs = parse_streams(&self.input_streams)?;
        let outputs = parse_streams(&self.output_streams)?;

        let mut task_node = NodeConfig::new(task_graph);
        task_node.output_streams = self.output_streams.clone();
        task_node.options = Some(options.clone());
        task_node.input_side_packets = self.input_side_packets.clone();
        task_node.output_side_packets = self.output_side_packets.clone();

        let nodes = if self.flow_limiting {
            task_node.input_streams = inputs
                .iter()
                .map(|spec| spec.throttled().to_string())
                .collect();
            vec![flow_limiter_node(&inputs, &outputs[0]), task_node]
        } else {
            task_node.input_streams = self.input_streams.clone();
            vec![task_node]
        };

        let graph = GraphConfig {
            input_streams: self.input_streams.clone(),
            output_streams: self.output_streams.clone(),
            input_side_packets: self.input_side_packets.clone(),
            nodes,
        };
        graph.validate()?;

        GraphAssembled {
            task_graph,
            node_count: graph.nodes.len(),
            flow_limiting: self.flow_limiting,
        }
        .log();
        Ok(graph)
    }
}

/// Limiter over the untagged inputs, with the task's first output fed back as `FINISHED`.
fn flow_limiter_node(inputs: &[StreamSpec], first_output: &StreamSpec) -> NodeConfig {
    let mut input_streams: Vec<String> = inputs
        .iter()
        .map(|spec| spec.stripped().to_string())
        .collect();
    input_streams.push(StreamSpec::tagged(FINISHED_TAG, first_output.name.clone()).to_string());

    let mut node = NodeConfig::new(FLOW_LIMITER_CALCULATOR);
    node.input_streams = input_streams;
    node.output_streams = inputs
        .iter()
        .map(|spec| spec.stripped().throttled().to_string())
        .collect();
    node.back_edges = vec![FINISHED_TAG.to_string()];
    node.options = Some(NodeOptions::pack(&FlowLimiterOptions::bounded()));
    node
}
