// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Admission control for live streams.
//!
//! The limiter forwards each aligned input set to its `throttled_` outputs while fewer
//! than `max_in_flight` sets are being processed downstream. Sets arriving while the
//! limit is reached wait in a queue of at most `max_in_queue` entries; when the queue
//! overflows the oldest waiting set is dropped and its timestamp reported to the engine.
//! A packet on the `FINISHED` back edge marks one in-flight set as done.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::config::consts::{FINISHED_TAG, FLOW_LIMITER_CALCULATOR};
use crate::config::FlowLimiterOptions;
use crate::errors::TaskError;
use crate::packets::{Packet, Timestamp};
use crate::traits::{Calculator, CalculatorContext, NodeInfo};

pub struct FlowLimiterCalculator {
    max_in_flight: u32,
    max_in_queue: u32,
    in_flight: u32,
    finished_index: Option<usize>,
    /// Input port of each data stream, in output order.
    data_inputs: Vec<usize>,
    queue: VecDeque<(Timestamp, Vec<Option<Packet>>)>,
}

impl FlowLimiterCalculator {
    pub fn from_node(node: &NodeInfo) -> Result<Self, TaskError> {
        let options = match &node.options {
            Some(options) => options.unpack::<FlowLimiterOptions>()?,
            None => FlowLimiterOptions::bounded(),
        };
        if options.max_in_flight == 0 {
            return Err(TaskError::invalid_argument(format!(
                "flow limiter '{}' must allow at least one input in flight",
                node.label
            )));
        }

        let finished_index = node.input_index(FINISHED_TAG);
        let data_inputs: Vec<usize> = (0..node.inputs.len())
            .filter(|i| Some(*i) != finished_index)
            .collect();
        if data_inputs.len() != node.outputs.len() {
            return Err(TaskError::invalid_argument(format!(
                "flow limiter '{}' has {} data inputs but {} outputs",
                node.label,
                data_inputs.len(),
                node.outputs.len()
            )));
        }

        Ok(Self {
            max_in_flight: options.max_in_flight,
            max_in_queue: options.max_in_queue,
            in_flight: 0,
            finished_index,
            data_inputs,
            queue: VecDeque::new(),
        })
    }

    fn admit(&mut self, ctx: &mut CalculatorContext<'_>) -> Result<(), TaskError> {
        while self.in_flight < self.max_in_flight {
            let Some((_, packets)) = self.queue.pop_front() else {
                break;
            };
            for (output, packet) in packets.into_iter().enumerate() {
                if let Some(packet) = packet {
                    ctx.emit(output, packet)?;
                }
            }
            self.in_flight += 1;
        }
        Ok(())
    }

    fn drop_overflow(&mut self, ctx: &mut CalculatorContext<'_>) {
        while self.queue.len() > self.max_in_queue as usize {
            if let Some((timestamp, _)) = self.queue.pop_front() {
                ctx.discard(timestamp);
            }
        }
    }
}

#[async_trait]
impl Calculator for FlowLimiterCalculator {
    async fn process(&mut self, ctx: &mut CalculatorContext<'_>) -> Result<(), TaskError> {
        let finished = self
            .finished_index
            .is_some_and(|index| ctx.input(index).is_some());

        if finished {
            self.in_flight = self.in_flight.saturating_sub(1);
        } else {
            let packets = self
                .data_inputs
                .iter()
                .map(|&index| ctx.take_input(index))
                .collect();
            self.queue.push_back((ctx.timestamp(), packets));
        }

        self.admit(ctx)?;
        self.drop_overflow(ctx);
        Ok(())
    }

    fn name(&self) -> &'static str {
        FLOW_LIMITER_CALCULATOR
    }
}
