// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod calculators;
pub mod local;
pub mod registry;
mod scheduler;

pub use calculators::{FlowLimiterCalculator, PassThroughCalculator};
pub use local::{LocalEngineFactory, LocalGraphEngine};
pub use registry::{CalculatorConstructor, CalculatorRegistry};
