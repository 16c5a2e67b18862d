// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::builder::GraphConfigBuilder;
use crate::config::graph::{GraphConfig, NodeOptions};
use crate::errors::{ConfigError, TaskError};
use crate::packets::{Packet, PacketMap};
use crate::task::RunningMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A task described in a config file: one task node, its running mode and side packets.
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    pub running_mode: RunningMode,
    /// Unset means on for streaming tasks and off otherwise.
    #[serde(default)]
    pub flow_limiting: Option<bool>,
    pub task: TaskNodeConfig,
    #[serde(default)]
    pub side_packets: BTreeMap<String, SideValue>,
}

#[derive(Debug, Deserialize)]
pub struct TaskNodeConfig {
    pub calculator: String,
    pub input_streams: Vec<String>,
    pub output_streams: Vec<String>,
    pub options: Option<NodeOptions>,
    #[serde(default)]
    pub input_side_packets: Vec<String>,
    #[serde(default)]
    pub output_side_packets: Vec<String>,
}

/// Plain side packet values that can be written in a config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SideValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl SideValue {
    pub fn to_packet(&self) -> Result<Packet, TaskError> {
        Ok(match self {
            SideValue::Bool(v) => Packet::create_bool(*v),
            SideValue::Int(v) => Packet::create_int64(*v)?,
            SideValue::Double(v) => Packet::create_double(*v),
            SideValue::String(v) => Packet::create_string(v.clone()),
        })
    }
}

impl TaskConfig {
    pub fn flow_limiting_enabled(&self) -> bool {
        self.flow_limiting
            .unwrap_or(self.running_mode == RunningMode::Streaming)
    }

    /// Assemble the graph for this task.
    pub fn graph_config(&self) -> Result<GraphConfig, TaskError> {
        let mut builder = GraphConfigBuilder::new()
            .task_graph(self.task.calculator.clone())
            .input_streams(self.task.input_streams.iter().cloned())
            .output_streams(self.task.output_streams.iter().cloned())
            .enable_flow_limiting(self.flow_limiting_enabled());
        if let Some(options) = &self.task.options {
            builder = builder.options(options.clone());
        }
        for name in &self.task.input_side_packets {
            builder = builder.input_side_packet(name.clone());
        }
        for name in &self.task.output_side_packets {
            builder = builder.output_side_packet(name.clone());
        }
        builder.build()
    }

    pub fn side_packets(&self) -> Result<PacketMap, TaskError> {
        self.side_packets
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.to_packet()?)))
            .collect()
    }
}

/// Read a task config, choosing the decoder from the file extension.
pub fn load_task_config<P: AsRef<Path>>(path: P) -> Result<TaskConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let content = fs::read_to_string(path)?;
    let cfg: TaskConfig = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    Ok(cfg)
}

/// Read a task config and assemble its graph, failing on any structural problem.
pub fn load_and_build<P: AsRef<Path>>(path: P) -> Result<(TaskConfig, GraphConfig), ConfigError> {
    let cfg = load_task_config(path)?;
    let graph = cfg.graph_config()?;
    Ok((cfg, graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const YAML: &str = r#"
running_mode: streaming
flow_limiting: true
task:
  calculator: PassThroughCalculator
  input_streams: ["IMAGE:image_in"]
  output_streams: ["IMAGE:image_out"]
  options:
    type_url: type.googleapis.com/taskrunner.PassThroughOptions
    value: CAU=
side_packets:
  model_path: models/detector.bin
  num_threads: 2
"#;

    #[test]
    fn test_load_yaml_and_build() {
        let file = write_temp(".yaml", YAML);
        let (cfg, graph) = load_and_build(file.path()).unwrap();
        assert_eq!(cfg.running_mode, RunningMode::Streaming);
        assert!(graph.flow_limiter_node().is_some());
        assert_eq!(
            cfg.side_packets.get("num_threads"),
            Some(&SideValue::Int(2))
        );
        let side_packets = cfg.side_packets().unwrap();
        assert_eq!(
            side_packets["model_path"].get_str().unwrap(),
            "models/detector.bin"
        );

        let options: crate::config::PassThroughOptions = graph
            .task_node()
            .and_then(|node| node.options.as_ref())
            .unwrap()
            .unpack()
            .unwrap();
        assert_eq!(options.delay_ms, 5);
    }

    #[test]
    fn test_load_json_and_toml() {
        let json = r#"{
  "running_mode": "sequential",
  "task": {
    "calculator": "PassThroughCalculator",
    "input_streams": ["in"],
    "output_streams": ["out"],
    "options": { "type_url": "/taskrunner.PassThroughOptions", "value": "" }
  }
}"#;
        let file = write_temp(".json", json);
        let cfg = load_task_config(file.path()).unwrap();
        assert_eq!(cfg.running_mode, RunningMode::Sequential);
        assert_eq!(cfg.flow_limiting, None);
        assert!(!cfg.flow_limiting_enabled());

        let toml = r#"
running_mode = "single_shot"

[task]
calculator = "PassThroughCalculator"
input_streams = ["in"]
output_streams = ["out"]

[task.options]
type_url = "/taskrunner.PassThroughOptions"
value = ""
"#;
        let file = write_temp(".toml", toml);
        let cfg = load_task_config(file.path()).unwrap();
        assert_eq!(cfg.running_mode, RunningMode::SingleShot);
        assert_eq!(cfg.graph_config().unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".ini", "running_mode = streaming");
        assert!(matches!(
            load_task_config(file.path()),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_missing_options_fails_build() {
        let yaml = r#"
running_mode: single_shot
task:
  calculator: PassThroughCalculator
  input_streams: ["in"]
  output_streams: ["out"]
"#;
        let file = write_temp(".yml", yaml);
        let err = load_and_build(file.path()).unwrap_err();
        assert!(matches!(
            TaskError::from(err),
            TaskError::InvalidArgument(msg) if msg.contains("options")
        ));
    }

    #[test]
    fn test_bundled_configs_build() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");
        for (file, mode, nodes) in [
            ("single-shot-pass-through.yaml", RunningMode::SingleShot, 1),
            ("sequential-pass-through.yaml", RunningMode::Sequential, 1),
            ("streaming-pass-through.yaml", RunningMode::Streaming, 2),
        ] {
            let (cfg, graph) = load_and_build(dir.join(file)).unwrap();
            assert_eq!(cfg.running_mode, mode, "{file}");
            assert_eq!(graph.nodes.len(), nodes, "{file}");
        }
    }

    #[test]
    fn test_flow_limiting_defaults_to_running_mode() {
        let task = r#"
task:
  calculator: PassThroughCalculator
  input_streams: ["in"]
  output_streams: ["out"]
  options:
    type_url: /taskrunner.PassThroughOptions
    value: ""
"#;
        for (header, enabled) in [
            ("running_mode: streaming", true),
            ("running_mode: sequential", false),
            ("running_mode: single_shot", false),
            ("running_mode: streaming\nflow_limiting: false", false),
            ("running_mode: sequential\nflow_limiting: true", true),
        ] {
            let file = write_temp(".yaml", &format!("{header}{task}"));
            let (cfg, graph) = load_and_build(file.path()).unwrap();
            assert_eq!(cfg.flow_limiting_enabled(), enabled, "{header}");
            assert_eq!(graph.flow_limiter_node().is_some(), enabled, "{header}");
        }
    }
}
