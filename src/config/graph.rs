// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph configuration handed to the graph engine.
//!
//! A [`GraphConfig`] lists the graph-level input and output streams and the nodes that
//! connect them. Task graphs built by [`GraphConfigBuilder`](crate::config::GraphConfigBuilder)
//! contain the task node and, for live streams, a flow limiter node in front of it.
//!
//! # Example
//! ```yaml
//! input_streams: ["IMAGE:image_in"]
//! output_streams: ["IMAGE:image_out"]
//! nodes:
//!   - calculator: PassThroughCalculator
//!     input_streams: ["IMAGE:image_in"]
//!     output_streams: ["IMAGE:image_out"]
//! ```

use crate::config::consts::FLOW_LIMITER_CALCULATOR;
use crate::config::stream::{parse_streams, StreamSpec};
use crate::config::validation::validate_graph;
use crate::errors::TaskError;
use serde::{Deserialize, Serialize};

/// Serialized, type-tagged node options.
///
/// The value is the `prost` encoding of the message named by `type_url`
/// (`<prefix>/<fully.qualified.Name>`). In config files the bytes are written as base64.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeOptions {
    pub type_url: String,
    #[serde(with = "base64_bytes", default)]
    pub value: Vec<u8>,
}

impl NodeOptions {
    pub fn pack<M: prost::Message + prost::Name>(message: &M) -> Self {
        Self {
            type_url: M::type_url(),
            value: message.encode_to_vec(),
        }
    }

    /// Fully qualified message name, i.e. the part of the type url after the last `/`.
    pub fn message_name(&self) -> &str {
        self.type_url
            .rsplit_once('/')
            .map_or(self.type_url.as_str(), |(_, name)| name)
    }

    /// Check that the type url names a well-formed message type. The payload is only
    /// decoded by [`NodeOptions::unpack`], when the node's calculator is created.
    pub fn check_type_url(&self) -> Result<&str, TaskError> {
        let name = self.message_name();
        let well_formed = !name.is_empty()
            && name
                .split('.')
                .all(|part| {
                    !part.is_empty()
                        && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                });
        if !well_formed {
            return Err(TaskError::invalid_argument(format!(
                "options type '{}' does not name a serializable message",
                self.type_url
            )));
        }
        Ok(name)
    }

    /// Decode the options as `M`; fails with `NotFound` when they hold another type.
    pub fn unpack<M: prost::Message + prost::Name + Default>(&self) -> Result<M, TaskError> {
        let wanted = M::full_name();
        if self.message_name() != wanted {
            return Err(TaskError::not_found(format!(
                "options hold '{}', no '{}' found",
                self.message_name(),
                wanted
            )));
        }
        M::decode(self.value.as_slice())
            .map_err(|e| TaskError::invalid_argument(format!("cannot decode {wanted}: {e}")))
    }
}

/// One calculator in the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub calculator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub input_streams: Vec<String>,
    #[serde(default)]
    pub output_streams: Vec<String>,
    /// Tags of input streams fed by a back edge; they bypass timestamp alignment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub back_edges: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_side_packets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_side_packets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<NodeOptions>,
}

impl NodeConfig {
    pub fn new(calculator: impl Into<String>) -> Self {
        Self {
            calculator: calculator.into(),
            name: None,
            input_streams: Vec::new(),
            output_streams: Vec::new(),
            back_edges: Vec::new(),
            input_side_packets: Vec::new(),
            output_side_packets: Vec::new(),
            options: None,
        }
    }

    /// Name used in logs and errors: the explicit name, or `calculator#position`.
    pub fn label(&self, position: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}#{}", self.calculator, position))
    }

    pub fn input_specs(&self) -> Result<Vec<StreamSpec>, TaskError> {
        parse_streams(&self.input_streams)
    }

    pub fn output_specs(&self) -> Result<Vec<StreamSpec>, TaskError> {
        parse_streams(&self.output_streams)
    }

    pub fn is_back_edge(&self, spec: &StreamSpec) -> bool {
        spec.tag
            .as_deref()
            .is_some_and(|tag| self.back_edges.iter().any(|edge| edge == tag))
    }
}

/// Complete graph handed to a [`GraphEngine`](crate::traits::GraphEngine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub input_streams: Vec<String>,
    #[serde(default)]
    pub output_streams: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_side_packets: Vec<String>,
    pub nodes: Vec<NodeConfig>,
}

impl GraphConfig {
    /// The node doing the task's work: the first node that is not a flow limiter.
    pub fn task_node(&self) -> Option<&NodeConfig> {
        self.nodes
            .iter()
            .find(|node| node.calculator != FLOW_LIMITER_CALCULATOR)
    }

    pub fn flow_limiter_node(&self) -> Option<&NodeConfig> {
        self.nodes
            .iter()
            .find(|node| node.calculator == FLOW_LIMITER_CALCULATOR)
    }

    /// Untagged names of the declared input streams, in declaration order.
    pub fn input_stream_names(&self) -> Result<Vec<String>, TaskError> {
        Ok(parse_streams(&self.input_streams)?
            .into_iter()
            .map(|spec| spec.name)
            .collect())
    }

    /// Untagged names of the declared output streams, in declaration order.
    pub fn output_stream_names(&self) -> Result<Vec<String>, TaskError> {
        Ok(parse_streams(&self.output_streams)?
            .into_iter()
            .map(|spec| spec.name)
            .collect())
    }

    /// Run every structural check, combining all findings into one `InvalidArgument`.
    pub fn validate(&self) -> Result<(), TaskError> {
        validate_graph(self).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            TaskError::invalid_argument(format!(
                "Graph validation failed:\n{}",
                messages.join("\n")
            ))
        })
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowLimiterOptions;

    #[test]
    fn test_options_pack_and_unpack() {
        let options = NodeOptions::pack(&FlowLimiterOptions {
            max_in_flight: 2,
            max_in_queue: 3,
        });
        assert_eq!(options.message_name(), "taskrunner.FlowLimiterOptions");
        assert_eq!(options.check_type_url().unwrap(), "taskrunner.FlowLimiterOptions");

        let decoded: FlowLimiterOptions = options.unpack().unwrap();
        assert_eq!(decoded.max_in_flight, 2);
        assert_eq!(decoded.max_in_queue, 3);
    }

    #[test]
    fn test_options_type_url_failures() {
        let blank = NodeOptions {
            type_url: "type.googleapis.com/".to_string(),
            value: vec![],
        };
        assert!(matches!(blank.check_type_url(), Err(TaskError::InvalidArgument(_))));

        let other = NodeOptions {
            type_url: "/demo.OtherOptions".to_string(),
            value: vec![],
        };
        assert!(other.check_type_url().is_ok());
        assert!(matches!(
            other.unpack::<FlowLimiterOptions>(),
            Err(TaskError::NotFound(_))
        ));
    }

    #[test]
    fn test_options_serialize_as_base64() {
        let options = NodeOptions {
            type_url: "/demo.Options".to_string(),
            value: vec![1, 2, 3],
        };
        let yaml = serde_yaml::to_string(&options).unwrap();
        assert!(yaml.contains("AQID"));
        let back: NodeOptions = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_parse_graph_yaml() {
        let yaml = r#"
input_streams: ["IMAGE:image_in"]
output_streams: ["IMAGE:image_out"]
nodes:
  - calculator: PassThroughCalculator
    input_streams: ["IMAGE:image_in"]
    output_streams: ["IMAGE:image_out"]
"#;
        let graph: GraphConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(graph.input_stream_names().unwrap(), vec!["image_in"]);
        assert!(graph.flow_limiter_node().is_none());
        assert_eq!(
            graph.task_node().map(|n| n.calculator.as_str()),
            Some("PassThroughCalculator")
        );
        assert!(graph.validate().is_ok());
    }
}
