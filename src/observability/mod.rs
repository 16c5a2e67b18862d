// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! All diagnostic and operational logging goes through message types defined in
//! [`messages`]. Each type carries its fields, renders a human-readable line via
//! `Display`, and emits itself through `tracing` at a fixed level. Call sites never
//! format log strings inline.
//!
//! Messages are organized by subsystem:
//! * `messages::buffer` - caller allocations borrowed by buffers
//! * `messages::config` - graph validation and assembly
//! * `messages::engine` - graph engine lifecycle and scheduling
//! * `messages::runner` - task runner dispatch and shutdown
//!
//! Subscribers are installed by the binary; the library only emits events.

pub mod messages;
