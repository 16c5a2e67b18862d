// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::errors::TaskError;
use crate::packets::{Packet, PacketMap};

/// Multi-stream output callback. Invoked on an engine-owned task with the outputs of one
/// timestamp keyed by output stream name, or once with the error that stopped the graph.
pub type OutputCallback = Arc<dyn Fn(Result<PacketMap, TaskError>) + Send + Sync>;

/// A running dataflow graph.
///
/// A task runner owns exactly one engine and drives it through this contract; it never
/// inspects nodes or calculators directly.
#[async_trait]
pub trait GraphEngine: Send {
    /// Register the callback for outputs not claimed by [`GraphEngine::process`].
    /// Must be called before [`GraphEngine::start`].
    fn observe_outputs(&mut self, callback: OutputCallback) -> Result<(), TaskError>;

    /// Open every node with the given input side packets and begin accepting inputs.
    async fn start(&mut self, side_packets: PacketMap) -> Result<(), TaskError>;

    /// Whether [`GraphEngine::send`] would accept `packet` on `stream` right now.
    /// Lets a caller check a whole set of inputs before queueing any of them.
    fn check_input(&self, stream: &str, packet: &Packet) -> Result<(), TaskError>;

    /// Hand one stamped packet to a graph input stream. Returns once the packet is
    /// queued, not once it has been processed.
    async fn send(&mut self, stream: &str, packet: Packet) -> Result<(), TaskError>;

    /// Send one packet per graph input, all with the same timestamp, and wait for the
    /// outputs at that timestamp. A timestamp dropped inside the graph yields an empty map.
    async fn process(&mut self, inputs: PacketMap) -> Result<PacketMap, TaskError>;

    /// Close all graph inputs and wait until every queued input has been processed.
    async fn wait_until_done(&mut self) -> Result<(), TaskError>;

    fn get_output_side_packet(&self, name: &str) -> Result<Packet, TaskError>;

    /// The first failure recorded by the graph, if any.
    fn failure(&self) -> Option<TaskError>;

    /// Stop the graph without draining queued inputs.
    fn abort(&mut self);
}

/// Builds engines for graph configurations.
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &GraphConfig) -> Result<Box<dyn GraphEngine>, TaskError>;
}
