// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use the_taskrunner::config::{load_and_build, TaskConfig};
use the_taskrunner::engine::LocalEngineFactory;
use the_taskrunner::errors::TaskError;
use the_taskrunner::packets::{Packet, PacketMap};
use the_taskrunner::task::{RunningMode, TaskRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FRAMES: i64 = 5;
/// Spacing between synthetic frames, in milliseconds.
const FRAME_INTERVAL_MS: i64 = 33;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,the_taskrunner=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <task-config> [frames]", args[0]);
        eprintln!("Example: {} configs/streaming-pass-through.yaml 20", args[0]);
        std::process::exit(1);
    }
    let frames = match args.get(2) {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("frame count '{raw}' is not a number"))?,
        None => DEFAULT_FRAMES,
    };
    if frames < 1 {
        bail!("frame count must be at least 1");
    }

    let (task, graph) =
        load_and_build(&args[1]).with_context(|| format!("failed to load {}", args[1]))?;
    let input_names = graph.input_stream_names()?;

    println!("Task runner demo");
    println!("Config: {}", args[1]);
    println!("Mode: {}, frames: {}", task.running_mode, frames);
    println!("Nodes: {}", graph.nodes.len());
    println!();

    let factory = LocalEngineFactory::default();
    let mut builder = TaskRunner::builder(graph)
        .running_mode(task.running_mode)
        .side_packets(task.side_packets()?);
    if task.running_mode == RunningMode::Streaming {
        builder = builder.result_callback(|result: Result<PacketMap, TaskError>| match result {
            Ok(outputs) => print_outputs("callback", &outputs),
            Err(e) => eprintln!("Graph failed: {e}"),
        });
    }

    let started = Instant::now();
    let mut runner = builder.build(&factory).await?;
    let outcome = drive(&mut runner, &task, &input_names, frames).await;
    if outcome.is_ok() {
        for name in &task.task.output_side_packets {
            let packet = runner.output_side_packet(name)?;
            println!("Output side packet '{}': {}", name, describe(&packet));
        }
    }
    let closed = runner.close().await;
    outcome?;
    closed?;
    println!("\nDone in {:?}", started.elapsed());
    Ok(())
}

async fn drive(
    runner: &mut TaskRunner,
    task: &TaskConfig,
    input_names: &[String],
    frames: i64,
) -> anyhow::Result<()> {
    for frame in 0..frames {
        let inputs = frame_inputs(input_names, frame)?;
        let timestamp_ms = frame * FRAME_INTERVAL_MS;
        match task.running_mode {
            RunningMode::SingleShot => {
                let outputs = runner.process_single(inputs).await?;
                print_outputs("single_shot", &outputs);
            }
            RunningMode::Sequential => {
                let outputs = runner.process_sequential(inputs, timestamp_ms).await?;
                print_outputs("sequential", &outputs);
            }
            RunningMode::Streaming => {
                runner.send_streaming(inputs, timestamp_ms).await?;
                tokio::time::sleep(Duration::from_millis(FRAME_INTERVAL_MS as u64)).await;
            }
        }
    }
    Ok(())
}

fn frame_inputs(input_names: &[String], frame: i64) -> Result<PacketMap, TaskError> {
    input_names
        .iter()
        .map(|name| Ok((name.clone(), Packet::create_int64(frame)?)))
        .collect()
}

fn print_outputs(source: &str, outputs: &PacketMap) {
    if outputs.is_empty() {
        println!("[{source}] dropped");
        return;
    }
    let mut names: Vec<&String> = outputs.keys().collect();
    names.sort();
    for name in names {
        let packet = &outputs[name];
        println!(
            "[{}] {} @ {}: {}",
            source,
            name,
            packet.timestamp(),
            describe(packet)
        );
    }
}

fn describe(packet: &Packet) -> String {
    if packet.is_empty() {
        return "empty".to_string();
    }
    packet
        .get_int()
        .map(|v| v.to_string())
        .or_else(|_| packet.get_str().map(str::to_string))
        .unwrap_or_else(|_| packet.type_tag().to_string())
}
