// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process graph engine.
//!
//! [`LocalGraphEngine`] instantiates one calculator per node from a
//! [`CalculatorRegistry`], opens them on `start` and hands them to a scheduler task
//! spawned on the current tokio runtime. The handle talks to that task over an
//! unbounded channel; failures and output side packets are read from shared state.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::GraphConfig;
use crate::engine::registry::CalculatorRegistry;
use crate::engine::scheduler::{
    lock, node_failure, EngineEvent, NodeRuntime, Scheduler, Shared, SharedState,
};
use crate::errors::TaskError;
use crate::observability::messages::engine::EngineStarted;
use crate::observability::messages::StructuredLog;
use crate::packets::{Packet, PacketMap, Timestamp};
use crate::traits::{EngineFactory, GraphEngine, NodeInfo, OpenContext, OutputCallback};

enum EngineState {
    Idle(Vec<NodeRuntime>),
    Running {
        events: mpsc::UnboundedSender<EngineEvent>,
        handle: JoinHandle<()>,
    },
    Done,
}

pub struct LocalGraphEngine {
    config: GraphConfig,
    input_names: Vec<String>,
    output_names: Vec<String>,
    state: EngineState,
    callback: Option<OutputCallback>,
    shared: Shared,
    cancel: CancellationToken,
    last_sent: HashMap<String, Timestamp>,
}

impl LocalGraphEngine {
    /// Validate `config` and instantiate its calculators.
    pub fn new(config: GraphConfig, registry: &CalculatorRegistry) -> Result<Self, TaskError> {
        config.validate()?;

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for (position, node) in config.nodes.iter().enumerate() {
            let inputs = node.input_specs()?;
            let back_edges = inputs.iter().map(|spec| node.is_back_edge(spec)).collect();
            let info = NodeInfo {
                label: node.label(position),
                inputs,
                outputs: node.output_specs()?,
                input_side_packets: node.input_side_packets.clone(),
                output_side_packets: node.output_side_packets.clone(),
                options: node.options.clone(),
            };
            let calculator = registry.create(&node.calculator, &info)?;
            nodes.push(NodeRuntime {
                info,
                calculator,
                back_edges,
            });
        }

        Ok(Self {
            input_names: config.input_stream_names()?,
            output_names: config.output_stream_names()?,
            config,
            state: EngineState::Idle(nodes),
            callback: None,
            shared: Arc::new(Mutex::new(SharedState::default())),
            cancel: CancellationToken::new(),
            last_sent: HashMap::new(),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn events(&self) -> Result<&mpsc::UnboundedSender<EngineEvent>, TaskError> {
        match &self.state {
            EngineState::Running { events, .. } => Ok(events),
            EngineState::Idle(_) => Err(TaskError::invalid_state("graph has not been started")),
            EngineState::Done => Err(self
                .failure()
                .unwrap_or_else(|| TaskError::invalid_state("graph is no longer running"))),
        }
    }

    fn push(&self, event: EngineEvent) -> Result<(), TaskError> {
        self.events()?.send(event).map_err(|_| {
            self.failure()
                .unwrap_or_else(|| TaskError::engine_failure("graph stopped accepting inputs"))
        })
    }

    fn push_input(&mut self, stream: &str, packet: Packet) -> Result<(), TaskError> {
        let timestamp = packet.timestamp();
        self.push(EngineEvent::Input {
            stream: stream.to_string(),
            packet,
        })?;
        self.last_sent.insert(stream.to_string(), timestamp);
        Ok(())
    }
}

#[async_trait]
impl GraphEngine for LocalGraphEngine {
    fn observe_outputs(&mut self, callback: OutputCallback) -> Result<(), TaskError> {
        if !matches!(self.state, EngineState::Idle(_)) {
            return Err(TaskError::invalid_state(
                "output callbacks must be registered before the graph starts",
            ));
        }
        self.callback = Some(callback);
        Ok(())
    }

    async fn start(&mut self, side_packets: PacketMap) -> Result<(), TaskError> {
        let mut nodes = match mem::replace(&mut self.state, EngineState::Done) {
            EngineState::Idle(nodes) => nodes,
            other => {
                self.state = other;
                return Err(TaskError::invalid_state("graph was already started"));
            }
        };

        for name in &self.config.input_side_packets {
            if !side_packets.contains_key(name) {
                return Err(TaskError::not_found(format!(
                    "graph input side packet '{name}' was not provided"
                )));
            }
        }

        for node in &mut nodes {
            let mut ctx = OpenContext::new(&node.info, &side_packets);
            node.calculator
                .open(&mut ctx)
                .await
                .map_err(|e| node_failure(&node.info.label, e))?;
            let produced = ctx.into_output_side_packets();
            lock(&self.shared)?.output_side_packets.extend(produced);
        }

        let started = EngineStarted {
            node_count: nodes.len(),
            input_streams: &self.input_names,
            output_streams: &self.output_names,
        };
        started.log();
        let span = started.span("scheduler");

        let (events, receiver) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(
            nodes,
            side_packets,
            self.output_names.clone(),
            self.callback.clone(),
            Arc::clone(&self.shared),
            self.cancel.clone(),
        );
        let handle = tokio::spawn(scheduler.run(receiver).instrument(span));
        self.state = EngineState::Running { events, handle };
        Ok(())
    }

    fn check_input(&self, stream: &str, packet: &Packet) -> Result<(), TaskError> {
        if !self.input_names.iter().any(|name| name == stream) {
            return Err(TaskError::invalid_argument(format!(
                "'{stream}' is not an input stream of this graph"
            )));
        }
        let timestamp = packet.timestamp();
        if !timestamp.is_allowed_in_stream() {
            return Err(TaskError::invalid_argument(format!(
                "packet for '{stream}' has timestamp {timestamp}, outside the stream range"
            )));
        }
        if let Some(last) = self.last_sent.get(stream) {
            if timestamp <= *last {
                return Err(TaskError::invalid_argument(format!(
                    "packet for '{stream}' at {timestamp} is not after the previous packet at {last}"
                )));
            }
        }
        Ok(())
    }

    async fn send(&mut self, stream: &str, packet: Packet) -> Result<(), TaskError> {
        if let Some(failure) = self.failure() {
            return Err(failure);
        }
        self.check_input(stream, &packet)?;
        self.push_input(stream, packet)
    }

    async fn process(&mut self, mut inputs: PacketMap) -> Result<PacketMap, TaskError> {
        if let Some(failure) = self.failure() {
            return Err(failure);
        }
        if inputs.len() != self.input_names.len()
            || !self.input_names.iter().all(|name| inputs.contains_key(name))
        {
            return Err(TaskError::invalid_argument(format!(
                "process needs exactly the inputs [{}]",
                self.input_names.join(", ")
            )));
        }
        let timestamp = {
            let mut timestamps = inputs.values().map(Packet::timestamp);
            let first = timestamps.next().unwrap_or(Timestamp::UNSET);
            if timestamps.any(|other| other != first) {
                return Err(TaskError::invalid_argument(
                    "all inputs of one process call must share a timestamp",
                ));
            }
            first
        };
        for (stream, packet) in &inputs {
            self.check_input(stream, packet)?;
        }

        let (reply, outputs) = oneshot::channel();
        self.push(EngineEvent::Await { timestamp, reply })?;
        for name in self.input_names.clone() {
            if let Some(packet) = inputs.remove(&name) {
                self.push_input(&name, packet)?;
            }
        }

        match outputs.await {
            Ok(result) => result,
            Err(_) => Err(self.failure().unwrap_or_else(|| {
                TaskError::engine_failure("graph stopped before producing outputs")
            })),
        }
    }

    async fn wait_until_done(&mut self) -> Result<(), TaskError> {
        let state = mem::replace(&mut self.state, EngineState::Done);
        if let EngineState::Running { events, handle } = state {
            let _ = events.send(EngineEvent::Close);
            drop(events);
            handle
                .await
                .map_err(|e| TaskError::engine_failure(format!("scheduler task failed: {e}")))?;
        }
        match self.failure() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn get_output_side_packet(&self, name: &str) -> Result<Packet, TaskError> {
        lock(&self.shared)?
            .output_side_packets
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::not_found(format!("output side packet '{name}' was not produced")))
    }

    fn failure(&self) -> Option<TaskError> {
        match lock(&self.shared) {
            Ok(state) => state.failure.clone(),
            Err(poisoned) => Some(poisoned),
        }
    }

    fn abort(&mut self) {
        self.cancel.cancel();
        self.state = EngineState::Done;
    }
}

/// Creates [`LocalGraphEngine`]s backed by a shared calculator registry.
#[derive(Clone, Debug)]
pub struct LocalEngineFactory {
    registry: Arc<CalculatorRegistry>,
}

impl LocalEngineFactory {
    pub fn new(registry: CalculatorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &CalculatorRegistry {
        &self.registry
    }
}

impl Default for LocalEngineFactory {
    fn default() -> Self {
        Self::new(CalculatorRegistry::with_builtins())
    }
}

impl EngineFactory for LocalEngineFactory {
    fn create(&self, config: &GraphConfig) -> Result<Box<dyn GraphEngine>, TaskError> {
        Ok(Box::new(LocalGraphEngine::new(config.clone(), &self.registry)?))
    }
}
