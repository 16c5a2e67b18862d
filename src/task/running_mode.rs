// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TaskError;

/// How a caller drives a task. Fixed for the lifetime of a runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningMode {
    /// Independent inputs, one synchronous call each.
    SingleShot,
    /// Timestamped inputs from a recorded sequence, one synchronous call each.
    Sequential,
    /// Timestamped live inputs; results arrive on a callback.
    Streaming,
}

impl RunningMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunningMode::SingleShot => "single_shot",
            RunningMode::Sequential => "sequential",
            RunningMode::Streaming => "streaming",
        }
    }

    /// Whether callers supply timestamps that must strictly increase.
    pub fn is_timestamped(self) -> bool {
        !matches!(self, RunningMode::SingleShot)
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch operations of a task runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    ProcessSingle,
    ProcessSequential,
    SendStreaming,
}

impl Operation {
    /// The only mode in which this operation is legal.
    pub fn mode(self) -> RunningMode {
        match self {
            Operation::ProcessSingle => RunningMode::SingleShot,
            Operation::ProcessSequential => RunningMode::Sequential,
            Operation::SendStreaming => RunningMode::Streaming,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::ProcessSingle => "process_single",
            Operation::ProcessSequential => "process_sequential",
            Operation::SendStreaming => "send_streaming",
        })
    }
}

/// Accepts a mode once and rejects every operation inconsistent with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunningModeValidator {
    mode: RunningMode,
}

impl RunningModeValidator {
    /// A result callback is required in streaming mode and forbidden otherwise.
    pub fn new(mode: RunningMode, has_callback: bool) -> Result<Self, TaskError> {
        match (mode, has_callback) {
            (RunningMode::Streaming, false) => Err(TaskError::invalid_argument(
                "streaming mode requires a result callback",
            )),
            (RunningMode::SingleShot | RunningMode::Sequential, true) => {
                Err(TaskError::invalid_argument(format!(
                    "a result callback is only allowed in streaming mode, not in {mode} mode"
                )))
            }
            _ => Ok(Self { mode }),
        }
    }

    pub fn mode(&self) -> RunningMode {
        self.mode
    }

    pub fn check_dispatch(&self, operation: Operation) -> Result<(), TaskError> {
        if operation.mode() == self.mode {
            Ok(())
        } else {
            Err(TaskError::invalid_state(format!(
                "{operation} is not allowed in {} mode",
                self.mode
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_pairing() {
        assert!(RunningModeValidator::new(RunningMode::Streaming, true).is_ok());
        assert!(RunningModeValidator::new(RunningMode::SingleShot, false).is_ok());
        assert!(RunningModeValidator::new(RunningMode::Sequential, false).is_ok());

        for (mode, has_callback) in [
            (RunningMode::Streaming, false),
            (RunningMode::SingleShot, true),
            (RunningMode::Sequential, true),
        ] {
            assert!(matches!(
                RunningModeValidator::new(mode, has_callback),
                Err(TaskError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_dispatch_names_operation_and_mode() {
        let validator = RunningModeValidator::new(RunningMode::SingleShot, false).unwrap();
        assert!(validator.check_dispatch(Operation::ProcessSingle).is_ok());

        match validator.check_dispatch(Operation::SendStreaming) {
            Err(TaskError::InvalidState(msg)) => {
                assert!(msg.contains("send_streaming"));
                assert!(msg.contains("single_shot"));
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_parses_from_config_names() {
        let mode: RunningMode = serde_yaml::from_str("sequential").unwrap();
        assert_eq!(mode, RunningMode::Sequential);
        assert!(mode.is_timestamped());
        assert!(!RunningMode::SingleShot.is_timestamped());
    }
}
