// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Packets, buffers and timestamps: the data exchanged with the graph engine.

pub mod buffer;
pub mod host_array;
pub mod packet;
pub mod timestamp;
pub mod value;

pub use buffer::{Buffer, BufferView, Element, ElementType, Ownership};
pub use host_array::HostArray;
pub use packet::{Packet, PacketMap, PacketType, Payload, SerializedMessage};
pub use timestamp::Timestamp;
pub use value::Value;
