// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::consts::{FLOW_LIMITER_CALCULATOR, PASS_THROUGH_CALCULATOR};
use crate::engine::calculators::{FlowLimiterCalculator, PassThroughCalculator};
use crate::errors::TaskError;
use crate::traits::{Calculator, NodeInfo};

/// Builds a calculator instance for one node, reading the node's options.
pub type CalculatorConstructor =
    Arc<dyn Fn(&NodeInfo) -> Result<Box<dyn Calculator>, TaskError> + Send + Sync>;

/// Calculator implementations available to a graph engine, keyed by calculator name.
#[derive(Clone, Default)]
pub struct CalculatorRegistry {
    constructors: HashMap<String, CalculatorConstructor>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the flow limiter and pass-through calculators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(FLOW_LIMITER_CALCULATOR, |node| {
            Ok(Box::new(FlowLimiterCalculator::from_node(node)?) as Box<dyn Calculator>)
        });
        registry.register(PASS_THROUGH_CALCULATOR, |node| {
            Ok(Box::new(PassThroughCalculator::from_node(node)?) as Box<dyn Calculator>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeInfo) -> Result<Box<dyn Calculator>, TaskError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    pub fn create(&self, calculator: &str, node: &NodeInfo) -> Result<Box<dyn Calculator>, TaskError> {
        let constructor = self.constructors.get(calculator).ok_or_else(|| {
            TaskError::not_found(format!(
                "calculator '{}' for node '{}' is not registered",
                calculator, node.label
            ))
        })?;
        constructor(node)
    }

    pub fn contains(&self, calculator: &str) -> bool {
        self.constructors.contains_key(calculator)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("calculators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeOptions, PassThroughOptions, StreamSpec};

    fn node(label: &str) -> NodeInfo {
        NodeInfo {
            label: label.to_string(),
            inputs: vec![StreamSpec::untagged("in")],
            outputs: vec![StreamSpec::untagged("out")],
            input_side_packets: vec![],
            output_side_packets: vec![],
            options: Some(NodeOptions::pack(&PassThroughOptions::default())),
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = CalculatorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["FlowLimiterCalculator", "PassThroughCalculator"]
        );
        let calculator = registry.create("PassThroughCalculator", &node("p")).unwrap();
        assert_eq!(calculator.name(), "PassThroughCalculator");
    }

    #[test]
    fn test_unknown_calculator_not_found() {
        let registry = CalculatorRegistry::with_builtins();
        let err = registry.create("ImageClassifier", &node("classifier")).err().unwrap();
        assert!(matches!(err, TaskError::NotFound(msg) if msg.contains("ImageClassifier")));
    }
}
