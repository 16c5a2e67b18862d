// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod calculator;
pub mod engine;

pub use calculator::{Calculator, CalculatorContext, NodeInfo, OpenContext};
pub use engine::{EngineFactory, GraphEngine, OutputCallback};
