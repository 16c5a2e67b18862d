// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::{NodeOptions, StreamSpec};
use crate::errors::TaskError;
use crate::packets::{Packet, PacketMap, Timestamp};

/// Static description of a graph node as seen by its calculator.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    /// Node name used in logs and errors.
    pub label: String,
    pub inputs: Vec<StreamSpec>,
    pub outputs: Vec<StreamSpec>,
    pub input_side_packets: Vec<String>,
    pub output_side_packets: Vec<String>,
    pub options: Option<NodeOptions>,
}

impl NodeInfo {
    pub fn input_index(&self, tag: &str) -> Option<usize> {
        self.inputs.iter().position(|spec| spec.has_tag(tag))
    }

    pub fn output_index(&self, tag: &str) -> Option<usize> {
        self.outputs.iter().position(|spec| spec.has_tag(tag))
    }
}

/// A unit of work inside a graph.
///
/// The engine calls `open` once before any input, `process` once per
/// timestamp-aligned set of inputs (or per back-edge packet) and `close` once at the end.
#[async_trait]
pub trait Calculator: Send {
    async fn open(&mut self, _ctx: &mut OpenContext<'_>) -> Result<(), TaskError> {
        Ok(())
    }

    async fn process(&mut self, ctx: &mut CalculatorContext<'_>) -> Result<(), TaskError>;

    async fn close(&mut self) -> Result<(), TaskError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Context handed to [`Calculator::open`].
pub struct OpenContext<'a> {
    node: &'a NodeInfo,
    side_packets: &'a PacketMap,
    produced: PacketMap,
}

impl<'a> OpenContext<'a> {
    pub(crate) fn new(node: &'a NodeInfo, side_packets: &'a PacketMap) -> Self {
        Self {
            node,
            side_packets,
            produced: PacketMap::new(),
        }
    }

    pub fn node(&self) -> &NodeInfo {
        self.node
    }

    pub fn options(&self) -> Option<&NodeOptions> {
        self.node.options.as_ref()
    }

    pub fn side_packet(&self, name: &str) -> Result<&Packet, TaskError> {
        lookup_side_packet(self.node, self.side_packets, name)
    }

    /// Publish one of the node's declared output side packets.
    pub fn set_output_side_packet(&mut self, name: &str, packet: Packet) -> Result<(), TaskError> {
        if !self.node.output_side_packets.iter().any(|n| n == name) {
            return Err(TaskError::invalid_argument(format!(
                "node '{}' does not declare output side packet '{}'",
                self.node.label, name
            )));
        }
        self.produced.insert(name.to_string(), packet);
        Ok(())
    }

    pub(crate) fn into_output_side_packets(self) -> PacketMap {
        self.produced
    }
}

/// Context handed to [`Calculator::process`]: the aligned inputs for one timestamp
/// and the sinks for outputs and dropped timestamps.
pub struct CalculatorContext<'a> {
    node: &'a NodeInfo,
    side_packets: &'a PacketMap,
    timestamp: Timestamp,
    inputs: Vec<Option<Packet>>,
    emitted: Vec<(usize, Packet)>,
    discarded: Vec<Timestamp>,
}

impl<'a> CalculatorContext<'a> {
    pub(crate) fn new(
        node: &'a NodeInfo,
        side_packets: &'a PacketMap,
        timestamp: Timestamp,
        inputs: Vec<Option<Packet>>,
    ) -> Self {
        Self {
            node,
            side_packets,
            timestamp,
            inputs,
            emitted: Vec::new(),
            discarded: Vec::new(),
        }
    }

    pub fn node(&self) -> &NodeInfo {
        self.node
    }

    pub fn options(&self) -> Option<&NodeOptions> {
        self.node.options.as_ref()
    }

    /// Timestamp of the inputs in this invocation.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.node.outputs.len()
    }

    pub fn input(&self, index: usize) -> Option<&Packet> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    pub fn input_by_tag(&self, tag: &str) -> Option<&Packet> {
        self.node.input_index(tag).and_then(|i| self.input(i))
    }

    pub fn take_input(&mut self, index: usize) -> Option<Packet> {
        self.inputs.get_mut(index).and_then(Option::take)
    }

    /// Emit `packet` on output `index`. Unstamped packets get the invocation timestamp.
    pub fn emit(&mut self, index: usize, packet: Packet) -> Result<(), TaskError> {
        if index >= self.node.outputs.len() {
            return Err(TaskError::invalid_argument(format!(
                "node '{}' has {} outputs, cannot emit on output {}",
                self.node.label,
                self.node.outputs.len(),
                index
            )));
        }
        let packet = if packet.timestamp().is_set() {
            packet
        } else {
            packet.at(self.timestamp)?
        };
        self.emitted.push((index, packet));
        Ok(())
    }

    pub fn emit_by_tag(&mut self, tag: &str, packet: Packet) -> Result<(), TaskError> {
        let index = self.node.output_index(tag).ok_or_else(|| {
            TaskError::not_found(format!(
                "node '{}' has no output tagged '{}'",
                self.node.label, tag
            ))
        })?;
        self.emit(index, packet)
    }

    /// Report that the inputs at `timestamp` were dropped and will produce no outputs.
    pub fn discard(&mut self, timestamp: Timestamp) {
        self.discarded.push(timestamp);
    }

    pub fn side_packet(&self, name: &str) -> Result<&Packet, TaskError> {
        lookup_side_packet(self.node, self.side_packets, name)
    }

    pub(crate) fn into_results(self) -> (Vec<(usize, Packet)>, Vec<Timestamp>) {
        (self.emitted, self.discarded)
    }
}

fn lookup_side_packet<'p>(
    node: &NodeInfo,
    side_packets: &'p PacketMap,
    name: &str,
) -> Result<&'p Packet, TaskError> {
    if !node.input_side_packets.iter().any(|n| n == name) {
        return Err(TaskError::not_found(format!(
            "node '{}' does not declare input side packet '{}'",
            node.label, name
        )));
    }
    side_packets.get(name).ok_or_else(|| {
        TaskError::not_found(format!("side packet '{}' was not provided", name))
    })
}
