// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for loading task configuration files.

use crate::errors::TaskError;
use thiserror::Error;

/// Errors that can occur while reading and decoding a task configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file extension is not one of yaml, yml, json or toml.
    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    /// The file decoded but does not describe a usable task.
    #[error("Invalid task config: {0}")]
    Invalid(#[from] TaskError),
}

impl From<ConfigError> for TaskError {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::Invalid(inner) => inner,
            other => TaskError::InvalidArgument(other.to_string()),
        }
    }
}
