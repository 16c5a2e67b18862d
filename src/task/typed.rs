// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Mode-specific runners.
//!
//! Each wrapper fixes the running mode at construction and exposes only the dispatch
//! operation legal for it, so a mismatched call does not compile. They share the
//! [`Runner`] trait for lifecycle operations.

use async_trait::async_trait;

use crate::config::GraphConfig;
use crate::errors::TaskError;
use crate::packets::{Packet, PacketMap};
use crate::task::running_mode::RunningMode;
use crate::task::runner::TaskRunner;
use crate::traits::EngineFactory;

/// Lifecycle operations common to every runner.
#[async_trait]
pub trait Runner: Send {
    fn mode(&self) -> RunningMode;

    fn output_side_packet(&self, name: &str) -> Result<Packet, TaskError>;

    /// Drain pending work and release the engine.
    async fn close(&mut self) -> Result<(), TaskError>;
}

#[async_trait]
impl Runner for TaskRunner {
    fn mode(&self) -> RunningMode {
        TaskRunner::mode(self)
    }

    fn output_side_packet(&self, name: &str) -> Result<Packet, TaskError> {
        TaskRunner::output_side_packet(self, name)
    }

    async fn close(&mut self) -> Result<(), TaskError> {
        TaskRunner::close(self).await
    }
}

macro_rules! delegate_runner {
    ($wrapper:ty) => {
        #[async_trait]
        impl Runner for $wrapper {
            fn mode(&self) -> RunningMode {
                self.inner.mode()
            }

            fn output_side_packet(&self, name: &str) -> Result<Packet, TaskError> {
                self.inner.output_side_packet(name)
            }

            async fn close(&mut self) -> Result<(), TaskError> {
                self.inner.close().await
            }
        }
    };
}

/// Runner for independent inputs such as single images.
pub struct SingleShotRunner {
    inner: TaskRunner,
}

impl SingleShotRunner {
    pub async fn create(
        graph: GraphConfig,
        side_packets: PacketMap,
        factory: &dyn EngineFactory,
    ) -> Result<Self, TaskError> {
        let inner = TaskRunner::builder(graph)
            .running_mode(RunningMode::SingleShot)
            .side_packets(side_packets)
            .build(factory)
            .await?;
        Ok(Self { inner })
    }

    pub async fn process(&mut self, inputs: PacketMap) -> Result<PacketMap, TaskError> {
        self.inner.process_single(inputs).await
    }
}

/// Runner for decoded frames of a recorded sequence.
pub struct SequentialRunner {
    inner: TaskRunner,
}

impl SequentialRunner {
    pub async fn create(
        graph: GraphConfig,
        side_packets: PacketMap,
        factory: &dyn EngineFactory,
    ) -> Result<Self, TaskError> {
        let inner = TaskRunner::builder(graph)
            .running_mode(RunningMode::Sequential)
            .side_packets(side_packets)
            .build(factory)
            .await?;
        Ok(Self { inner })
    }

    pub async fn process(&mut self, inputs: PacketMap, timestamp_ms: i64) -> Result<PacketMap, TaskError> {
        self.inner.process_sequential(inputs, timestamp_ms).await
    }
}

/// Runner for live input; results arrive on the callback.
pub struct StreamingRunner {
    inner: TaskRunner,
}

impl StreamingRunner {
    pub async fn create<F>(
        graph: GraphConfig,
        side_packets: PacketMap,
        callback: F,
        factory: &dyn EngineFactory,
    ) -> Result<Self, TaskError>
    where
        F: Fn(Result<PacketMap, TaskError>) + Send + Sync + 'static,
    {
        let inner = TaskRunner::builder(graph)
            .running_mode(RunningMode::Streaming)
            .side_packets(side_packets)
            .result_callback(callback)
            .build(factory)
            .await?;
        Ok(Self { inner })
    }

    pub async fn send(&mut self, inputs: PacketMap, timestamp_ms: i64) -> Result<(), TaskError> {
        self.inner.send_streaming(inputs, timestamp_ms).await
    }
}

delegate_runner!(SingleShotRunner);
delegate_runner!(SequentialRunner);
delegate_runner!(StreamingRunner);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphConfigBuilder, PassThroughOptions};
    use crate::engine::LocalEngineFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn graph(flow_limiting: bool) -> GraphConfig {
        GraphConfigBuilder::new()
            .task_graph("PassThroughCalculator")
            .input_stream("TEXT:text_in")
            .output_stream("TEXT:text_out")
            .options_message(&PassThroughOptions::default())
            .enable_flow_limiting(flow_limiting)
            .input_side_packet("label")
            .output_side_packet("label_out")
            .build()
            .unwrap()
    }

    fn side_packets() -> PacketMap {
        PacketMap::from([("label".to_string(), Packet::create_string("demo"))])
    }

    fn text(value: &str) -> PacketMap {
        PacketMap::from([("text_in".to_string(), Packet::create_string(value))])
    }

    async fn close_all(runners: Vec<&mut dyn Runner>) {
        for runner in runners {
            runner.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_typed_runners_fix_their_mode() {
        let factory = LocalEngineFactory::default();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);

        let mut single = SingleShotRunner::create(graph(false), side_packets(), &factory)
            .await
            .unwrap();
        let mut sequential = SequentialRunner::create(graph(false), side_packets(), &factory)
            .await
            .unwrap();
        let mut streaming = StreamingRunner::create(
            graph(true),
            side_packets(),
            move |result| {
                if result.is_ok() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
            &factory,
        )
        .await
        .unwrap();

        assert_eq!(Runner::mode(&single), RunningMode::SingleShot);
        assert_eq!(Runner::mode(&sequential), RunningMode::Sequential);
        assert_eq!(Runner::mode(&streaming), RunningMode::Streaming);

        let out = single.process(text("a")).await.unwrap();
        assert_eq!(out["text_out"].get_str().unwrap(), "a");
        let out = sequential.process(text("b"), 5).await.unwrap();
        assert_eq!(out["text_out"].get_str().unwrap(), "b");
        streaming.send(text("c"), 5).await.unwrap();

        assert_eq!(
            single.output_side_packet("label_out").unwrap().get_str().unwrap(),
            "demo"
        );

        close_all(vec![&mut single, &mut sequential, &mut streaming]).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_side_packet_fails_creation() {
        let factory = LocalEngineFactory::default();
        let result = SingleShotRunner::create(graph(false), PacketMap::new(), &factory).await;
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }
}
