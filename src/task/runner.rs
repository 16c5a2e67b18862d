// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The task runner: one graph engine driven in one running mode.
//!
//! A [`TaskRunner`] validates every call before it reaches the engine: the operation
//! must match the running mode, the inputs must be exactly the graph's input streams,
//! and in timestamped modes each timestamp must be strictly greater than the last one
//! sent. Once the engine records a failure, every later call returns it.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::config::GraphConfig;
use crate::errors::TaskError;
use crate::observability::messages::runner::{
    DispatchRejected, EngineFailureSurfaced, RunnerClosed, RunnerCreated, RunnerDroppedOpen,
    TimestampRejected,
};
use crate::observability::messages::StructuredLog;
use crate::packets::{Packet, PacketMap, Timestamp};
use crate::task::running_mode::{Operation, RunningMode, RunningModeValidator};
use crate::traits::{EngineFactory, GraphEngine, OutputCallback};
use tracing::{Instrument, Span};

/// Future returned by the body of [`TaskRunnerBuilder::run_scoped`].
pub type ScopedFuture<'r, T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'r>>;

/// Collects everything needed to start a [`TaskRunner`].
pub struct TaskRunnerBuilder {
    graph: GraphConfig,
    mode: RunningMode,
    callback: Option<OutputCallback>,
    side_packets: PacketMap,
}

impl TaskRunnerBuilder {
    pub fn running_mode(mut self, mode: RunningMode) -> Self {
        self.mode = mode;
        self
    }

    /// Result callback for streaming mode. Invoked on an engine task with the outputs
    /// of one timestamp, or once with the error that stopped the graph.
    pub fn result_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Result<PacketMap, TaskError>) + Send + Sync + 'static,
    {
        self.callback = Some(std::sync::Arc::new(callback));
        self
    }

    pub fn output_callback(mut self, callback: OutputCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn side_packet(mut self, name: impl Into<String>, packet: Packet) -> Self {
        self.side_packets.insert(name.into(), packet);
        self
    }

    pub fn side_packets(mut self, packets: PacketMap) -> Self {
        self.side_packets.extend(packets);
        self
    }

    /// Validate the mode/callback pairing, create the engine and start it.
    pub async fn build(self, factory: &dyn EngineFactory) -> Result<TaskRunner, TaskError> {
        let validator = RunningModeValidator::new(self.mode, self.callback.is_some())?;
        let input_names = self.graph.input_stream_names()?;
        let output_names = self.graph.output_stream_names()?;

        let mut engine = factory.create(&self.graph)?;
        if let Some(callback) = self.callback {
            engine.observe_outputs(callback)?;
        }
        if let Err(e) = engine.start(self.side_packets).await {
            engine.abort();
            return Err(e);
        }

        let created = RunnerCreated {
            mode: validator.mode().as_str(),
            input_count: input_names.len(),
            output_count: output_names.len(),
        };
        created.log();
        let span = created.span("task_runner");

        Ok(TaskRunner {
            validator,
            engine: Some(engine),
            input_names,
            output_names,
            last_sent: None,
            next_synthetic_ms: 0,
            sent: 0,
            span,
        })
    }

    /// Build a runner, hand it to `body`, and close it on every exit path.
    ///
    /// The body's error wins over a close error.
    pub async fn run_scoped<T, F>(self, factory: &dyn EngineFactory, body: F) -> Result<T, TaskError>
    where
        F: for<'r> FnOnce(&'r mut TaskRunner) -> ScopedFuture<'r, T>,
    {
        let mut runner = self.build(factory).await?;
        let result = body(&mut runner).await;
        let closed = runner.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

/// Drives one graph engine in one running mode.
pub struct TaskRunner {
    validator: RunningModeValidator,
    /// `None` once closed.
    engine: Option<Box<dyn GraphEngine>>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    last_sent: Option<Timestamp>,
    next_synthetic_ms: i64,
    sent: u64,
    /// Engine calls run inside this span.
    span: Span,
}

impl TaskRunner {
    pub fn builder(graph: GraphConfig) -> TaskRunnerBuilder {
        TaskRunnerBuilder {
            graph,
            mode: RunningMode::SingleShot,
            callback: None,
            side_packets: PacketMap::new(),
        }
    }

    pub fn mode(&self) -> RunningMode {
        self.validator.mode()
    }

    pub fn input_stream_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_stream_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Timestamp of the last call that reached the engine in a timestamped mode.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_sent
    }

    /// Process one independent set of inputs and wait for the outputs.
    pub async fn process_single(&mut self, inputs: PacketMap) -> Result<PacketMap, TaskError> {
        self.admit(Operation::ProcessSingle, &inputs)?;
        let timestamp = Timestamp::from_millis(self.next_synthetic_ms)?;
        let stamped = stamp(inputs, timestamp)?;
        self.next_synthetic_ms += 1;
        self.sent += 1;
        let span = self.span.clone();
        let engine = self.engine_mut()?;
        let result = engine.process(stamped).instrument(span).await;
        self.surface(Operation::ProcessSingle, result)
    }

    /// Process one set of inputs from a recorded sequence and wait for the outputs.
    pub async fn process_sequential(
        &mut self,
        inputs: PacketMap,
        timestamp_ms: i64,
    ) -> Result<PacketMap, TaskError> {
        self.admit(Operation::ProcessSequential, &inputs)?;
        let timestamp = self.next_timestamp(timestamp_ms)?;
        let stamped = stamp(inputs, timestamp)?;
        self.last_sent = Some(timestamp);
        self.sent += 1;
        let span = self.span.clone();
        let engine = self.engine_mut()?;
        let result = engine.process(stamped).instrument(span).await;
        self.surface(Operation::ProcessSequential, result)
    }

    /// Queue one set of live inputs; results arrive on the result callback.
    ///
    /// Returns once every input is queued. Inputs may be dropped inside the graph when
    /// the task cannot keep up. The engine accepts every packet before any is sent, so
    /// a rejected call queues nothing.
    pub async fn send_streaming(&mut self, inputs: PacketMap, timestamp_ms: i64) -> Result<(), TaskError> {
        self.admit(Operation::SendStreaming, &inputs)?;
        let timestamp = self.next_timestamp(timestamp_ms)?;
        let mut stamped = stamp(inputs, timestamp)?;

        let mut ordered = Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let packet = stamped
                .remove(name)
                .ok_or_else(|| TaskError::invalid_argument(format!("missing input '{name}'")))?;
            ordered.push((name.clone(), packet));
        }
        let checked = {
            let engine = self.engine_mut()?;
            ordered
                .iter()
                .try_for_each(|(name, packet)| engine.check_input(name, packet))
        };
        self.surface(Operation::SendStreaming, checked)?;

        self.last_sent = Some(timestamp);
        self.sent += 1;
        for (name, packet) in ordered {
            let span = self.span.clone();
            let engine = self.engine_mut()?;
            let result = engine.send(&name, packet).instrument(span).await;
            self.surface(Operation::SendStreaming, result)?;
        }
        Ok(())
    }

    /// Drain pending work and release the engine. A second call fails.
    pub async fn close(&mut self) -> Result<(), TaskError> {
        let mut engine = self
            .engine
            .take()
            .ok_or_else(|| TaskError::invalid_state("task runner is already closed"))?;
        let result = engine.wait_until_done().instrument(self.span.clone()).await;
        RunnerClosed {
            mode: self.mode().as_str(),
            sent: self.sent,
        }
        .log();
        result
    }

    pub fn output_side_packet(&self, name: &str) -> Result<Packet, TaskError> {
        self.engine
            .as_ref()
            .ok_or_else(|| TaskError::invalid_state("task runner is closed"))?
            .get_output_side_packet(name)
    }

    /// Every check that must pass before a call may touch the engine.
    fn admit(&self, operation: Operation, inputs: &PacketMap) -> Result<(), TaskError> {
        let checked = self
            .validator
            .check_dispatch(operation)
            .and_then(|_| self.check_open())
            .and_then(|_| self.check_inputs(inputs));
        if let Err(e) = &checked {
            if !matches!(e, TaskError::EngineFailure(_)) {
                DispatchRejected {
                    operation: &operation.to_string(),
                    mode: self.mode().as_str(),
                    error: e,
                }
                .log();
            }
        }
        checked
    }

    fn check_open(&self) -> Result<(), TaskError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| TaskError::invalid_state("task runner is closed"))?;
        match engine.failure() {
            Some(error) => {
                EngineFailureSurfaced {
                    mode: self.mode().as_str(),
                    error: &error,
                }
                .log();
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn check_inputs(&self, inputs: &PacketMap) -> Result<(), TaskError> {
        let expected: BTreeSet<&str> = self.input_names.iter().map(String::as_str).collect();
        let given: BTreeSet<&str> = inputs.keys().map(String::as_str).collect();
        if expected == given {
            return Ok(());
        }
        let missing: Vec<&str> = expected.difference(&given).copied().collect();
        let unexpected: Vec<&str> = given.difference(&expected).copied().collect();
        Err(TaskError::invalid_argument(format!(
            "inputs must be exactly [{}]; missing [{}], unexpected [{}]",
            self.input_names.join(", "),
            missing.join(", "),
            unexpected.join(", ")
        )))
    }

    /// Convert and check a caller timestamp. Leaves `last_sent` untouched on failure.
    fn next_timestamp(&self, timestamp_ms: i64) -> Result<Timestamp, TaskError> {
        let timestamp = Timestamp::from_millis(timestamp_ms)?;
        if !timestamp.is_allowed_in_stream() {
            return Err(TaskError::invalid_argument(format!(
                "timestamp {timestamp_ms} ms is outside the range allowed in a stream"
            )));
        }
        if let Some(last) = self.last_sent {
            if timestamp <= last {
                TimestampRejected {
                    mode: self.mode().as_str(),
                    timestamp_ms,
                    last_ms: last.millis(),
                }
                .log();
                return Err(TaskError::invalid_argument(format!(
                    "non-monotonic timestamp: {timestamp_ms} ms is not after {} ms",
                    last.millis()
                )));
            }
        }
        Ok(timestamp)
    }

    fn engine_mut(&mut self) -> Result<&mut Box<dyn GraphEngine>, TaskError> {
        self.engine
            .as_mut()
            .ok_or_else(|| TaskError::invalid_state("task runner is closed"))
    }

    /// Engine errors reach callers unchanged; only the log line depends on the kind.
    fn surface<T>(&self, operation: Operation, result: Result<T, TaskError>) -> Result<T, TaskError> {
        if let Err(error) = &result {
            let mode = self.mode().as_str();
            match error {
                TaskError::EngineFailure(_) => EngineFailureSurfaced { mode, error }.log(),
                _ => DispatchRejected {
                    operation: &operation.to_string(),
                    mode,
                    error,
                }
                .log(),
            }
        }
        result
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            RunnerDroppedOpen {
                mode: self.mode().as_str(),
            }
            .log();
            engine.abort();
        }
    }
}

fn stamp(inputs: PacketMap, timestamp: Timestamp) -> Result<PacketMap, TaskError> {
    inputs
        .into_iter()
        .map(|(name, packet)| Ok((name, packet.at(timestamp)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphConfigBuilder, PassThroughOptions};
    use crate::engine::LocalEngineFactory;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Engine double: records accepted sends, rejects one stream, fails `process` on demand.
    #[derive(Clone, Default)]
    struct ScriptedEngine {
        rejected_stream: Option<&'static str>,
        process_error: Option<TaskError>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl GraphEngine for ScriptedEngine {
        fn observe_outputs(&mut self, _callback: OutputCallback) -> Result<(), TaskError> {
            Ok(())
        }

        async fn start(&mut self, _side_packets: PacketMap) -> Result<(), TaskError> {
            Ok(())
        }

        fn check_input(&self, stream: &str, _packet: &Packet) -> Result<(), TaskError> {
            match self.rejected_stream {
                Some(rejected) if rejected == stream => {
                    Err(TaskError::invalid_argument(format!("'{stream}' is closed")))
                }
                _ => Ok(()),
            }
        }

        async fn send(&mut self, stream: &str, packet: Packet) -> Result<(), TaskError> {
            self.check_input(stream, &packet)?;
            self.sent.lock().unwrap().push(stream.to_string());
            Ok(())
        }

        async fn process(&mut self, _inputs: PacketMap) -> Result<PacketMap, TaskError> {
            match &self.process_error {
                Some(error) => Err(error.clone()),
                None => Ok(PacketMap::new()),
            }
        }

        async fn wait_until_done(&mut self) -> Result<(), TaskError> {
            Ok(())
        }

        fn get_output_side_packet(&self, name: &str) -> Result<Packet, TaskError> {
            Err(TaskError::not_found(format!("no side packet '{name}'")))
        }

        fn failure(&self) -> Option<TaskError> {
            None
        }

        fn abort(&mut self) {}
    }

    impl EngineFactory for ScriptedEngine {
        fn create(&self, _config: &GraphConfig) -> Result<Box<dyn GraphEngine>, TaskError> {
            Ok(Box::new(self.clone()))
        }
    }

    fn image_and_depth() -> GraphConfig {
        GraphConfigBuilder::new()
            .task_graph("PassThroughCalculator")
            .input_stream("IMAGE:image_in")
            .input_stream("DEPTH:depth_in")
            .output_stream("IMAGE:image_out")
            .output_stream("DEPTH:depth_out")
            .options_message(&PassThroughOptions::default())
            .build()
            .unwrap()
    }

    fn image_and_depth_inputs(value: i64) -> PacketMap {
        PacketMap::from([
            ("image_in".to_string(), Packet::create_int64(value).unwrap()),
            ("depth_in".to_string(), Packet::create_int64(-value).unwrap()),
        ])
    }

    fn graph(options: PassThroughOptions, flow_limiting: bool) -> GraphConfig {
        GraphConfigBuilder::new()
            .task_graph("PassThroughCalculator")
            .input_stream("IMAGE:image_in")
            .output_stream("IMAGE:image_out")
            .options_message(&options)
            .enable_flow_limiting(flow_limiting)
            .build()
            .unwrap()
    }

    fn image(value: i64) -> PacketMap {
        PacketMap::from([("image_in".to_string(), Packet::create_int64(value).unwrap())])
    }

    #[tokio::test]
    async fn test_single_shot_returns_outputs() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .build(&factory)
            .await
            .unwrap();

        for value in [7, 8] {
            let outputs = runner.process_single(image(value)).await.unwrap();
            assert_eq!(outputs["image_out"].get_int().unwrap(), value);
        }
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_mode_and_callback_must_agree() {
        let factory = LocalEngineFactory::default();
        let missing = TaskRunner::builder(graph(PassThroughOptions::default(), true))
            .running_mode(RunningMode::Streaming)
            .build(&factory)
            .await;
        assert!(matches!(missing, Err(TaskError::InvalidArgument(_))));

        let unexpected = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .running_mode(RunningMode::Sequential)
            .result_callback(|_| {})
            .build(&factory)
            .await;
        assert!(matches!(unexpected, Err(TaskError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_wrong_operation_is_rejected() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .running_mode(RunningMode::Sequential)
            .build(&factory)
            .await
            .unwrap();

        let err = runner.process_single(image(1)).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidState(_)));
        let err = runner.send_streaming(image(1), 1).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidState(_)));

        // Rejections do not disturb a later valid call.
        let outputs = runner.process_sequential(image(3), 1).await.unwrap();
        assert_eq!(outputs["image_out"].timestamp(), Timestamp::from_micros(1_000));
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sequential_requires_increasing_timestamps() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .running_mode(RunningMode::Sequential)
            .build(&factory)
            .await
            .unwrap();

        runner.process_sequential(image(1), 10).await.unwrap();
        for stale in [10, 5] {
            match runner.process_sequential(image(2), stale).await {
                Err(TaskError::InvalidArgument(msg)) => assert!(msg.contains("non-monotonic")),
                other => panic!("expected InvalidArgument, got {other:?}"),
            }
        }
        assert_eq!(runner.last_timestamp(), Some(Timestamp::from_micros(10_000)));

        let outputs = runner.process_sequential(image(3), 11).await.unwrap();
        assert_eq!(outputs["image_out"].get_int().unwrap(), 3);
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_inputs_must_match_graph_inputs() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .build(&factory)
            .await
            .unwrap();

        let err = runner.process_single(PacketMap::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let mut extra = image(1);
        extra.insert("depth".to_string(), Packet::create_bool(true));
        let err = runner.process_single(extra).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(msg) if msg.contains("depth")));
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_streaming_delivers_to_callback() {
        let factory = LocalEngineFactory::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), true))
            .running_mode(RunningMode::Streaming)
            .result_callback(move |result| {
                let outputs = result.unwrap();
                sink.lock().unwrap().push(outputs["image_out"].timestamp().millis());
            })
            .build(&factory)
            .await
            .unwrap();

        for ms in 1..=3 {
            runner.send_streaming(image(ms), ms).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let err = runner.send_streaming(image(4), 3).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
        runner.close().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_close_twice_and_use_after_close() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .build(&factory)
            .await
            .unwrap();

        runner.close().await.unwrap();
        assert!(runner.is_closed());
        assert!(matches!(runner.close().await, Err(TaskError::InvalidState(_))));
        assert!(matches!(
            runner.process_single(image(1)).await,
            Err(TaskError::InvalidState(_))
        ));
        assert!(matches!(
            runner.output_side_packet("anything"),
            Err(TaskError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_engine_failure_is_sticky() {
        let factory = LocalEngineFactory::default();
        let options = PassThroughOptions {
            delay_ms: 0,
            fail_at_micros: Some(2_000),
        };
        let mut runner = TaskRunner::builder(graph(options, false))
            .running_mode(RunningMode::Sequential)
            .build(&factory)
            .await
            .unwrap();

        runner.process_sequential(image(1), 1).await.unwrap();
        let err = runner.process_sequential(image(2), 2).await.unwrap_err();
        assert!(matches!(err, TaskError::EngineFailure(_)));

        let again = runner.process_sequential(image(3), 3).await.unwrap_err();
        assert!(matches!(again, TaskError::EngineFailure(_)));
        assert!(matches!(runner.close().await, Err(TaskError::EngineFailure(_))));
    }

    #[tokio::test]
    async fn test_run_scoped_closes_runner() {
        let factory = LocalEngineFactory::default();
        let value = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .run_scoped(&factory, |runner| {
                Box::pin(async move {
                    let outputs = runner.process_single(image(42)).await?;
                    outputs["image_out"].get_int()
                })
            })
            .await
            .unwrap();
        assert_eq!(value, 42);

        let err = TaskRunner::builder(graph(PassThroughOptions::default(), false))
            .run_scoped(&factory, |runner| {
                Box::pin(async move { runner.process_single(PacketMap::new()).await })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_engine_errors_reach_caller_unchanged() {
        for error in [
            TaskError::invalid_argument("frame is not an image"),
            TaskError::not_found("model asset 'detector.bin'"),
            TaskError::engine_failure("inference crashed"),
        ] {
            let engine = ScriptedEngine {
                process_error: Some(error.clone()),
                ..ScriptedEngine::default()
            };
            let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), false))
                .running_mode(RunningMode::Sequential)
                .build(&engine)
                .await
                .unwrap();
            assert_eq!(runner.process_sequential(image(1), 1).await.unwrap_err(), error);
            runner.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unknown_stream_is_invalid_argument() {
        let factory = LocalEngineFactory::default();
        let mut runner = TaskRunner::builder(graph(PassThroughOptions::default(), true))
            .running_mode(RunningMode::Streaming)
            .result_callback(|_| {})
            .build(&factory)
            .await
            .unwrap();

        let unknown = PacketMap::from([("audio_in".to_string(), Packet::create_bool(true))]);
        match runner.send_streaming(unknown, 1).await {
            Err(TaskError::InvalidArgument(msg)) => assert!(msg.contains("audio_in")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        assert_eq!(runner.last_timestamp(), None);

        runner.send_streaming(image(1), 1).await.unwrap();
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_streaming_rejection_queues_no_input() {
        let rejecting = ScriptedEngine {
            rejected_stream: Some("depth_in"),
            ..ScriptedEngine::default()
        };
        let mut runner = TaskRunner::builder(image_and_depth())
            .running_mode(RunningMode::Streaming)
            .result_callback(|_| {})
            .build(&rejecting)
            .await
            .unwrap();

        let err = runner.send_streaming(image_and_depth_inputs(1), 1).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(msg) if msg.contains("depth_in")));
        assert!(rejecting.sent.lock().unwrap().is_empty());
        assert_eq!(runner.last_timestamp(), None);
        runner.close().await.unwrap();

        let accepting = ScriptedEngine::default();
        let mut runner = TaskRunner::builder(image_and_depth())
            .running_mode(RunningMode::Streaming)
            .result_callback(|_| {})
            .build(&accepting)
            .await
            .unwrap();
        runner.send_streaming(image_and_depth_inputs(1), 1).await.unwrap();
        assert_eq!(*accepting.sent.lock().unwrap(), vec!["image_in", "depth_in"]);
        assert_eq!(runner.last_timestamp(), Some(Timestamp::from_micros(1_000)));
        runner.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_options_fail_build() {
        let mut options = crate::config::NodeOptions::pack(&PassThroughOptions::default());
        options.value = vec![0xFF];
        let graph = GraphConfigBuilder::new()
            .task_graph("PassThroughCalculator")
            .input_stream("IMAGE:image_in")
            .output_stream("IMAGE:image_out")
            .options(options)
            .build()
            .unwrap();

        let result = TaskRunner::builder(graph)
            .build(&LocalEngineFactory::default())
            .await;
        assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    }
}
