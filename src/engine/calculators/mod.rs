// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod flow_limiter;
mod pass_through;

pub use flow_limiter::FlowLimiterCalculator;
pub use pass_through::PassThroughCalculator;
