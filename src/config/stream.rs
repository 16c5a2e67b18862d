// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stream specifications of the form `TAG:index:name`, `TAG:name` or `name`.

use crate::config::consts::THROTTLED_PREFIX;
use crate::errors::TaskError;
use std::fmt;
use std::str::FromStr;

/// A parsed stream reference as written in a node's stream list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    pub tag: Option<String>,
    pub index: Option<u32>,
    pub name: String,
}

impl StreamSpec {
    pub fn parse(spec: &str) -> Result<Self, TaskError> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (tag, index, name) = match parts.as_slice() {
            [name] => (None, None, *name),
            [tag, name] => (Some(*tag), None, *name),
            [tag, index, name] => {
                let index = index.parse::<u32>().map_err(|_| {
                    TaskError::invalid_argument(format!(
                        "stream '{spec}' has a non-numeric index '{index}'"
                    ))
                })?;
                (Some(*tag), Some(index), *name)
            }
            _ => {
                return Err(TaskError::invalid_argument(format!(
                    "stream '{spec}' has too many ':' separated parts"
                )))
            }
        };

        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(TaskError::invalid_argument(format!(
                    "stream '{spec}' has an invalid tag '{tag}'"
                )));
            }
        }
        if !is_valid_name(name) {
            return Err(TaskError::invalid_argument(format!(
                "stream '{spec}' has an invalid name '{name}'"
            )));
        }

        Ok(Self {
            tag: tag.map(str::to_string),
            index,
            name: name.to_string(),
        })
    }

    pub fn untagged(name: impl Into<String>) -> Self {
        Self {
            tag: None,
            index: None,
            name: name.into(),
        }
    }

    pub fn tagged(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            index: None,
            name: name.into(),
        }
    }

    /// The same stream without tag or index.
    pub fn stripped(&self) -> Self {
        Self::untagged(self.name.clone())
    }

    /// The same tag and index pointing at a differently named stream.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            tag: self.tag.clone(),
            index: self.index,
            name: name.into(),
        }
    }

    /// The stream the flow limiter emits in place of this one.
    pub fn throttled(&self) -> Self {
        self.renamed(format!("{THROTTLED_PREFIX}{}", self.name))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tag, self.index) {
            (Some(tag), Some(index)) => write!(f, "{tag}:{index}:{}", self.name),
            (Some(tag), None) => write!(f, "{tag}:{}", self.name),
            (None, _) => f.write_str(&self.name),
        }
    }
}

impl FromStr for StreamSpec {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse every entry of a stream list.
pub fn parse_streams(specs: &[String]) -> Result<Vec<StreamSpec>, TaskError> {
    specs.iter().map(|s| StreamSpec::parse(s)).collect()
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
