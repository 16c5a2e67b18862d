// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::time::Duration;

use crate::config::consts::PASS_THROUGH_CALCULATOR;
use crate::config::PassThroughOptions;
use crate::errors::TaskError;
use crate::traits::{Calculator, CalculatorContext, NodeInfo, OpenContext};

/// Forwards input `i` to output `i`, and input side packet `i` to output side packet `i`.
///
/// Optional [`PassThroughOptions`] add a fixed processing delay or make invocations fail
/// from a given timestamp on; both are used to exercise flow control and failure paths.
pub struct PassThroughCalculator {
    delay: Duration,
    fail_at_micros: Option<i64>,
}

impl PassThroughCalculator {
    pub fn from_node(node: &NodeInfo) -> Result<Self, TaskError> {
        let options = match &node.options {
            Some(options) => options.unpack::<PassThroughOptions>()?,
            None => PassThroughOptions::default(),
        };
        Ok(Self {
            delay: Duration::from_millis(u64::from(options.delay_ms)),
            fail_at_micros: options.fail_at_micros,
        })
    }
}

#[async_trait]
impl Calculator for PassThroughCalculator {
    async fn open(&mut self, ctx: &mut OpenContext<'_>) -> Result<(), TaskError> {
        let pairs: Vec<(String, String)> = ctx
            .node()
            .input_side_packets
            .iter()
            .cloned()
            .zip(ctx.node().output_side_packets.iter().cloned())
            .collect();
        for (input, output) in pairs {
            let packet = ctx.side_packet(&input)?.clone();
            ctx.set_output_side_packet(&output, packet)?;
        }
        Ok(())
    }

    async fn process(&mut self, ctx: &mut CalculatorContext<'_>) -> Result<(), TaskError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(limit) = self.fail_at_micros {
            if ctx.timestamp().micros() >= limit {
                return Err(TaskError::engine_failure(format!(
                    "'{}' rejected input at {}",
                    ctx.node().label,
                    ctx.timestamp()
                )));
            }
        }

        let forwarded = ctx.input_count().min(ctx.output_count());
        for index in 0..forwarded {
            if let Some(packet) = ctx.take_input(index) {
                ctx.emit(index, packet)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        PASS_THROUGH_CALCULATOR
    }
}
