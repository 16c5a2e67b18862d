// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for buffer ownership events.

use crate::observability::messages::StructuredLog;
use crate::packets::ElementType;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A buffer borrowed caller memory that is still writeable.
///
/// # Log Level
/// `warn!` - Caller mutation after this point is undetected aliasing
pub struct UnsafeAliasingWarning<'a> {
    pub element_type: ElementType,
    pub shape: &'a [usize],
    pub external_refs: usize,
}

impl Display for UnsafeAliasingWarning<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Borrowing writeable {} array of shape {:?}; mark it read-only before handing it to a task",
            self.element_type, self.shape
        )
    }
}

impl StructuredLog for UnsafeAliasingWarning<'_> {
    fn log(&self) {
        tracing::warn!(
            element_type = %self.element_type,
            shape = ?self.shape,
            external_refs = self.external_refs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "buffer",
            span_name = name,
            element_type = %self.element_type,
            shape = ?self.shape,
        )
    }
}

/// The last handle on a borrowed buffer released its external reference.
///
/// # Log Level
/// `trace!` - High-frequency ownership detail
pub struct ExternalReferenceReleased {
    pub element_type: ElementType,
    pub remaining_refs: usize,
}

impl Display for ExternalReferenceReleased {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Released external {} allocation ({} references remain)",
            self.element_type, self.remaining_refs
        )
    }
}

impl StructuredLog for ExternalReferenceReleased {
    fn log(&self) {
        tracing::trace!(
            element_type = %self.element_type,
            remaining_refs = self.remaining_refs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "buffer",
            span_name = name,
            element_type = %self.element_type,
            remaining_refs = self.remaining_refs,
        )
    }
}
