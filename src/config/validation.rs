// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation for graph configurations.
//!
//! Checks run in order and accumulate so that callers see every problem at once:
//!
//! 1. **Stream syntax**: every stream reference parses
//! 2. **Unique producers**: each stream has exactly one producer (a node or the graph inputs)
//! 3. **Resolution**: every consumed stream is produced, every graph input is consumed and
//!    every graph output is produced
//! 4. **Options**: node options name a serializable message type
//! 5. **Cycle detection**: DFS over producer -> consumer edges, skipping back-edge inputs
//!
//! Cycle detection only runs when the earlier checks pass, since it needs a resolved graph.

use crate::config::graph::GraphConfig;
use crate::config::stream::{parse_streams, StreamSpec};
use crate::errors::ValidationError;
use crate::observability::messages::config::{
    CyclicStreamDetected, GraphValidationIssue, GraphValidationStarted,
};
use crate::observability::messages::StructuredLog;
use std::collections::{HashMap, HashSet};

const GRAPH_OWNER: &str = "graph";

struct ParsedNode {
    label: String,
    inputs: Vec<(StreamSpec, bool)>,
    outputs: Vec<StreamSpec>,
}

/// Validate a graph configuration, returning every problem found.
pub fn validate_graph(graph: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    GraphValidationStarted {
        node_count: graph.nodes.len(),
        input_count: graph.input_streams.len(),
        output_count: graph.output_streams.len(),
    }
    .log();

    let result = run_checks(graph);
    if let Err(errors) = &result {
        for error in errors {
            GraphValidationIssue { error }.log();
        }
    }
    result
}

fn run_checks(graph: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let (graph_inputs, graph_outputs, nodes) = parse_all(graph)?;

    let mut errors = Vec::new();

    // stream name -> producer labels
    let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
    for spec in &graph_inputs {
        producers.entry(spec.name.as_str()).or_default().push(GRAPH_OWNER);
    }
    for node in &nodes {
        for spec in &node.outputs {
            producers
                .entry(spec.name.as_str())
                .or_default()
                .push(node.label.as_str());
        }
    }
    let mut duplicated: Vec<_> = producers
        .iter()
        .filter(|(_, owners)| owners.len() > 1)
        .collect();
    duplicated.sort_by_key(|(stream, _)| **stream);
    for (stream, owners) in duplicated {
        errors.push(ValidationError::DuplicateProducer {
            stream: stream.to_string(),
            producers: owners.iter().map(|o| o.to_string()).collect(),
        });
    }

    let mut consumed: HashSet<&str> = HashSet::new();
    for node in &nodes {
        for (spec, _) in &node.inputs {
            consumed.insert(spec.name.as_str());
            if !producers.contains_key(spec.name.as_str()) {
                errors.push(ValidationError::UnresolvedStream {
                    node: node.label.clone(),
                    stream: spec.name.clone(),
                });
            }
        }
    }
    for spec in &graph_outputs {
        consumed.insert(spec.name.as_str());
        if !producers.contains_key(spec.name.as_str()) {
            errors.push(ValidationError::MissingOutput {
                stream: spec.name.clone(),
            });
        }
    }
    for spec in &graph_inputs {
        if !consumed.contains(spec.name.as_str()) {
            errors.push(ValidationError::UnusedInput {
                stream: spec.name.clone(),
            });
        }
    }

    for (position, node) in graph.nodes.iter().enumerate() {
        if let Some(options) = &node.options {
            if options.check_type_url().is_err() {
                errors.push(ValidationError::UnresolvableOptions {
                    node: node.label(position),
                    type_url: options.type_url.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        if let Some(cycle) = find_cycle(&nodes) {
            CyclicStreamDetected { cycle: &cycle }.log();
            errors.push(ValidationError::CyclicStream { cycle });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

type Parsed = (Vec<StreamSpec>, Vec<StreamSpec>, Vec<ParsedNode>);

fn parse_all(graph: &GraphConfig) -> Result<Parsed, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut parse = |owner: &str, streams: &[String]| match parse_streams(streams) {
        Ok(specs) => specs,
        Err(e) => {
            errors.push(ValidationError::MalformedStream {
                owner: owner.to_string(),
                reason: e.to_string(),
            });
            Vec::new()
        }
    };

    let graph_inputs = parse(GRAPH_OWNER, &graph.input_streams);
    let graph_outputs = parse(GRAPH_OWNER, &graph.output_streams);
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for (position, node) in graph.nodes.iter().enumerate() {
        let label = node.label(position);
        let inputs = parse(&label, &node.input_streams)
            .into_iter()
            .map(|spec| {
                let back_edge = node.is_back_edge(&spec);
                (spec, back_edge)
            })
            .collect();
        let outputs = parse(&label, &node.output_streams);
        nodes.push(ParsedNode {
            label,
            inputs,
            outputs,
        });
    }

    if errors.is_empty() {
        Ok((graph_inputs, graph_outputs, nodes))
    } else {
        Err(errors)
    }
}

/// Three-color DFS over node indices; edges run from a stream's producer to its consumers.
fn find_cycle(nodes: &[ParsedNode]) -> Option<Vec<String>> {
    let mut producer_of: HashMap<&str, usize> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for spec in &node.outputs {
            producer_of.insert(spec.name.as_str(), index);
        }
    }

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (consumer, node) in nodes.iter().enumerate() {
        for (spec, back_edge) in &node.inputs {
            if *back_edge {
                continue;
            }
            if let Some(&producer) = producer_of.get(spec.name.as_str()) {
                edges[producer].push(consumer);
            }
        }
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();
    for start in 0..nodes.len() {
        if !visited.contains(&start) {
            if let Some(cycle) = dfs(start, &edges, &mut visited, &mut rec_stack, &mut path) {
                return Some(cycle.into_iter().map(|i| nodes[i].label.clone()).collect());
            }
        }
    }
    None
}

fn dfs(
    node: usize,
    edges: &[Vec<usize>],
    visited: &mut HashSet<usize>,
    rec_stack: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for &neighbor in &edges[node] {
        if !visited.contains(&neighbor) {
            if let Some(cycle) = dfs(neighbor, edges, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(&neighbor) {
            let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(neighbor);
            return Some(cycle);
        }
    }

    rec_stack.remove(&node);
    path.pop();
    None
}
