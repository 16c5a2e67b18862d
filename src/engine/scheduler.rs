// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The engine-owned task that runs calculators.
//!
//! One scheduler task serves one graph. Each loop iteration first drains every event
//! already queued by the caller, then runs a single calculator invocation. Inputs that
//! arrive while a calculator is busy therefore reach flow control before the next
//! invocation starts.
//!
//! Packets on regular input ports are aligned by timestamp: a node runs once all of its
//! regular ports hold a packet for the same timestamp. Packets on back-edge ports run the
//! node immediately. Graph outputs are grouped by timestamp and handed, once complete,
//! to the synchronous waiter for that timestamp or else to the output callback.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::errors::TaskError;
use crate::observability::messages::engine::{
    CalculatorFailed, EngineAborted, EngineFinished, InputDropped, OutputsDelivered,
};
use crate::observability::messages::StructuredLog;
use crate::packets::{Packet, PacketMap, Timestamp};
use crate::traits::{Calculator, CalculatorContext, NodeInfo, OutputCallback};

pub(crate) type Reply = oneshot::Sender<Result<PacketMap, TaskError>>;

pub(crate) enum EngineEvent {
    Input { stream: String, packet: Packet },
    Await { timestamp: Timestamp, reply: Reply },
    Close,
}

/// State read by the engine handle while the scheduler runs.
#[derive(Default)]
pub(crate) struct SharedState {
    pub failure: Option<TaskError>,
    pub output_side_packets: PacketMap,
}

pub(crate) type Shared = Arc<Mutex<SharedState>>;

pub(crate) fn lock(shared: &Shared) -> Result<MutexGuard<'_, SharedState>, TaskError> {
    shared
        .lock()
        .map_err(|_| TaskError::engine_failure("engine state lock poisoned"))
}

/// Failures raised by a node surface as engine failures naming the node.
pub(crate) fn node_failure(label: &str, error: TaskError) -> TaskError {
    match error {
        TaskError::EngineFailure(_) => error,
        other => TaskError::engine_failure(format!("node '{label}': {other}")),
    }
}

pub(crate) struct NodeRuntime {
    pub info: NodeInfo,
    pub calculator: Box<dyn Calculator>,
    /// Per input port: fed by a back edge.
    pub back_edges: Vec<bool>,
}

struct Invocation {
    node: usize,
    timestamp: Timestamp,
    inputs: Vec<Option<Packet>>,
    /// Timestamp-aligned invocation, as opposed to one triggered by a back edge.
    aligned: bool,
}

pub(crate) struct Scheduler {
    nodes: Vec<NodeRuntime>,
    side_packets: PacketMap,
    /// stream name -> (node, input port)
    consumers: HashMap<String, Vec<(usize, usize)>>,
    graph_outputs: Vec<String>,
    pending_inputs: Vec<BTreeMap<Timestamp, Vec<Option<Packet>>>>,
    pending_outputs: BTreeMap<Timestamp, PacketMap>,
    waiters: HashMap<Timestamp, Reply>,
    ready: VecDeque<Invocation>,
    callback: Option<OutputCallback>,
    shared: Shared,
    cancel: CancellationToken,
    invocations: u64,
    delivered: u64,
    dropped: u64,
}

impl Scheduler {
    pub(crate) fn new(
        nodes: Vec<NodeRuntime>,
        side_packets: PacketMap,
        graph_outputs: Vec<String>,
        callback: Option<OutputCallback>,
        shared: Shared,
        cancel: CancellationToken,
    ) -> Self {
        let mut consumers: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for (port, spec) in node.info.inputs.iter().enumerate() {
                consumers
                    .entry(spec.name.clone())
                    .or_default()
                    .push((index, port));
            }
        }
        let pending_inputs = vec![BTreeMap::new(); nodes.len()];

        Self {
            nodes,
            side_packets,
            consumers,
            graph_outputs,
            pending_inputs,
            pending_outputs: BTreeMap::new(),
            waiters: HashMap::new(),
            ready: VecDeque::new(),
            callback,
            shared,
            cancel,
            invocations: 0,
            delivered: 0,
            dropped: 0,
        }
    }

    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
        let mut closing = false;
        loop {
            while !closing {
                match events.try_recv() {
                    Ok(EngineEvent::Close) => closing = true,
                    Ok(event) => self.apply(event),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => closing = true,
                }
            }

            if self.cancel.is_cancelled() {
                self.abort();
                return;
            }

            if let Some(invocation) = self.ready.pop_front() {
                if let Err(error) = self.invoke(invocation).await {
                    self.fail(error);
                    self.close_nodes().await;
                    return;
                }
                continue;
            }

            if closing {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.abort();
                    return;
                }
                event = events.recv() => match event {
                    Some(EngineEvent::Close) | None => closing = true,
                    Some(event) => self.apply(event),
                },
            }
        }

        self.close_nodes().await;
        for (timestamp, reply) in self.waiters.drain() {
            let _ = reply.send(Err(TaskError::engine_failure(format!(
                "graph finished without outputs at {timestamp}"
            ))));
        }
        EngineFinished {
            invocations: self.invocations,
            delivered: self.delivered,
            dropped: self.dropped,
        }
        .log();
    }

    fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Input { stream, packet } => self.route(&stream, packet),
            EngineEvent::Await { timestamp, reply } => {
                self.waiters.insert(timestamp, reply);
            }
            EngineEvent::Close => {}
        }
    }

    fn route(&mut self, stream: &str, packet: Packet) {
        let consumers = self.consumers.get(stream).cloned().unwrap_or_default();
        for (node, port) in consumers {
            let packet = packet.clone();
            if self.nodes[node].back_edges[port] {
                let mut inputs = vec![None; self.nodes[node].info.inputs.len()];
                let timestamp = packet.timestamp();
                inputs[port] = Some(packet);
                self.ready.push_back(Invocation {
                    node,
                    timestamp,
                    inputs,
                    aligned: false,
                });
            } else {
                self.align(node, port, packet);
            }
        }

        if self.graph_outputs.iter().any(|name| name == stream) {
            let timestamp = packet.timestamp();
            self.pending_outputs
                .entry(timestamp)
                .or_default()
                .insert(stream.to_string(), packet);
            self.deliver_if_complete(timestamp);
        }
    }

    fn align(&mut self, node: usize, port: usize, packet: Packet) {
        let timestamp = packet.timestamp();
        let back_edges = &self.nodes[node].back_edges;
        let slots = self.pending_inputs[node]
            .entry(timestamp)
            .or_insert_with(|| vec![None; back_edges.len()]);
        slots[port] = Some(packet);

        let complete = slots
            .iter()
            .zip(back_edges)
            .all(|(slot, back_edge)| *back_edge || slot.is_some());
        if complete {
            if let Some(inputs) = self.pending_inputs[node].remove(&timestamp) {
                self.ready.push_back(Invocation {
                    node,
                    timestamp,
                    inputs,
                    aligned: true,
                });
            }
        }
    }

    async fn invoke(&mut self, invocation: Invocation) -> Result<(), TaskError> {
        let Invocation {
            node: index,
            timestamp,
            inputs,
            aligned,
        } = invocation;

        let node = &mut self.nodes[index];
        let mut ctx = CalculatorContext::new(&node.info, &self.side_packets, timestamp, inputs);
        let result = node.calculator.process(&mut ctx).await;
        let (emitted, discarded) = ctx.into_results();
        self.invocations += 1;

        let label = self.nodes[index].info.label.clone();
        if let Err(error) = result {
            CalculatorFailed {
                node: &label,
                calculator: self.nodes[index].calculator.name(),
                timestamp,
                error: &error,
            }
            .log();
            return Err(node_failure(&label, error));
        }

        for dropped in &discarded {
            self.dropped += 1;
            InputDropped {
                node: &label,
                timestamp: *dropped,
            }
            .log();
            self.pending_outputs.remove(dropped);
            if let Some(reply) = self.waiters.remove(dropped) {
                let _ = reply.send(Ok(PacketMap::new()));
            }
        }

        let mut produced = HashSet::new();
        for (output, packet) in emitted {
            let stream = self.nodes[index].info.outputs[output].name.clone();
            if !packet.timestamp().is_allowed_in_stream() {
                return Err(node_failure(
                    &label,
                    TaskError::invalid_argument(format!(
                        "emitted {} on '{}', outside the stream range",
                        packet.timestamp(),
                        stream
                    )),
                ));
            }
            if packet.timestamp() == timestamp {
                produced.insert(stream.clone());
            }
            self.route(&stream, packet);
        }

        // Aligned invocations settle every graph output they own at this timestamp.
        if aligned && !discarded.contains(&timestamp) {
            let unsettled: Vec<String> = self.nodes[index]
                .info
                .outputs
                .iter()
                .map(|spec| spec.name.clone())
                .filter(|name| !produced.contains(name) && self.graph_outputs.contains(name))
                .collect();
            for stream in unsettled {
                let empty = Packet::empty().at(timestamp)?;
                self.route(&stream, empty);
            }
        }
        Ok(())
    }

    fn deliver_if_complete(&mut self, timestamp: Timestamp) {
        let complete = self.pending_outputs.get(&timestamp).is_some_and(|outputs| {
            self.graph_outputs
                .iter()
                .all(|name| outputs.contains_key(name))
        });
        if !complete {
            return;
        }
        let Some(outputs) = self.pending_outputs.remove(&timestamp) else {
            return;
        };

        self.delivered += 1;
        let stream_count = outputs.len();
        let to_waiter = if let Some(reply) = self.waiters.remove(&timestamp) {
            let _ = reply.send(Ok(outputs));
            true
        } else {
            if let Some(callback) = &self.callback {
                callback(Ok(outputs));
            }
            false
        };
        OutputsDelivered {
            timestamp,
            stream_count,
            to_waiter,
        }
        .log();
    }

    fn fail(&mut self, error: TaskError) {
        if let Ok(mut state) = lock(&self.shared) {
            state.failure.get_or_insert_with(|| error.clone());
        }
        for (_, reply) in self.waiters.drain() {
            let _ = reply.send(Err(error.clone()));
        }
        if let Some(callback) = &self.callback {
            callback(Err(error));
        }
    }

    fn abort(&mut self) {
        EngineAborted {
            pending_invocations: self.ready.len(),
        }
        .log();
        self.ready.clear();
        for (_, reply) in self.waiters.drain() {
            let _ = reply.send(Err(TaskError::invalid_state("graph was aborted")));
        }
    }

    async fn close_nodes(&mut self) {
        for node in &mut self.nodes {
            if let Err(error) = node.calculator.close().await {
                let error = node_failure(&node.info.label, error);
                if let Ok(mut state) = lock(&self.shared) {
                    state.failure.get_or_insert(error);
                }
            }
        }
    }
}
