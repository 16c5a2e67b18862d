// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Timestamped, type-tagged envelopes exchanged with the graph engine.

use crate::errors::TaskError;
use crate::packets::buffer::Buffer;
use crate::packets::timestamp::Timestamp;
use crate::packets::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A message already encoded by the caller, tagged with its fully qualified type name.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedMessage {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

/// What a non-empty packet carries.
#[derive(Debug)]
pub enum Payload {
    Value(Value),
    Buffer(Buffer),
    Message(SerializedMessage),
    List(Vec<Packet>),
    Map(BTreeMap<String, Packet>),
}

/// Type tag of a packet, derived from its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PacketType {
    Empty,
    Value(&'static str),
    Buffer,
    Message(String),
    List,
    Map,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Empty => f.write_str("empty"),
            PacketType::Value(name) => f.write_str(name),
            PacketType::Buffer => f.write_str("buffer"),
            PacketType::Message(name) => write!(f, "message<{name}>"),
            PacketType::List => f.write_str("list"),
            PacketType::Map => f.write_str("map"),
        }
    }
}

/// Immutable, cheaply clonable packet.
///
/// Clones alias the same payload through an atomic reference count; a packet holding a
/// [`Buffer`] keeps that buffer alive until the last clone is dropped, whichever thread
/// drops it. The timestamp never changes once attached: [`Packet::at`] returns a new
/// packet instead.
#[derive(Clone, Default)]
pub struct Packet {
    payload: Option<Arc<Payload>>,
    timestamp: Timestamp,
}

/// Packets keyed by stream name.
pub type PacketMap = std::collections::HashMap<String, Packet>;

fn narrow<T, N>(value: T, target: &'static str) -> Result<N, TaskError>
where
    T: TryInto<N> + fmt::Display + Copy,
{
    value
        .try_into()
        .map_err(|_| TaskError::overflow(value, target))
}

impl Packet {
    /// A packet with no payload.
    pub fn empty() -> Packet {
        Packet::default()
    }

    fn from_payload(payload: Payload) -> Packet {
        Packet {
            payload: Some(Arc::new(payload)),
            timestamp: Timestamp::UNSET,
        }
    }

    fn from_value(value: Value) -> Packet {
        Self::from_payload(Payload::Value(value))
    }

    pub fn create_bool(value: bool) -> Packet {
        Self::from_value(Value::Bool(value))
    }

    /// Fails with `Overflow` when `value` does not fit in 8 signed bits.
    pub fn create_int8<T: TryInto<i8> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::Int8(narrow(value, "int8")?)))
    }

    pub fn create_int16<T: TryInto<i16> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::Int16(narrow(value, "int16")?)))
    }

    pub fn create_int32<T: TryInto<i32> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::Int32(narrow(value, "int32")?)))
    }

    pub fn create_int64<T: TryInto<i64> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::Int64(narrow(value, "int64")?)))
    }

    pub fn create_uint8<T: TryInto<u8> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::UInt8(narrow(value, "uint8")?)))
    }

    pub fn create_uint16<T: TryInto<u16> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::UInt16(narrow(value, "uint16")?)))
    }

    pub fn create_uint32<T: TryInto<u32> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::UInt32(narrow(value, "uint32")?)))
    }

    pub fn create_uint64<T: TryInto<u64> + fmt::Display + Copy>(value: T) -> Result<Packet, TaskError> {
        Ok(Self::from_value(Value::UInt64(narrow(value, "uint64")?)))
    }

    pub fn create_float(value: f32) -> Packet {
        Self::from_value(Value::Float(value))
    }

    pub fn create_double(value: f64) -> Packet {
        Self::from_value(Value::Double(value))
    }

    pub fn create_string(value: impl Into<String>) -> Packet {
        Self::from_value(Value::String(value.into()))
    }

    pub fn create_bytes(value: impl Into<Vec<u8>>) -> Packet {
        Self::from_value(Value::Bytes(value.into()))
    }

    pub fn create_bool_vector(values: Vec<bool>) -> Packet {
        Self::from_value(Value::BoolVector(values))
    }

    pub fn create_int_vector(values: Vec<i64>) -> Packet {
        Self::from_value(Value::IntVector(values))
    }

    pub fn create_float_vector(values: Vec<f32>) -> Packet {
        Self::from_value(Value::FloatVector(values))
    }

    pub fn create_string_vector(values: Vec<String>) -> Packet {
        Self::from_value(Value::StringVector(values))
    }

    /// Wrap a buffer. The packet shares the buffer; nothing is copied.
    pub fn create_buffer(buffer: Buffer) -> Packet {
        Self::from_payload(Payload::Buffer(buffer))
    }

    pub fn create_message(bytes: Vec<u8>, type_name: impl Into<String>) -> Result<Packet, TaskError> {
        let type_name = type_name.into();
        if type_name.trim().is_empty() {
            return Err(TaskError::invalid_argument(
                "serialized message needs a type name",
            ));
        }
        Ok(Self::from_payload(Payload::Message(SerializedMessage {
            type_name,
            bytes,
        })))
    }

    /// Encode a `prost` message and tag it with its fully qualified name.
    pub fn create_proto<M: prost::Message + prost::Name>(message: &M) -> Packet {
        Self::from_payload(Payload::Message(SerializedMessage {
            type_name: M::full_name(),
            bytes: message.encode_to_vec(),
        }))
    }

    pub fn create_list(packets: Vec<Packet>) -> Packet {
        Self::from_payload(Payload::List(packets))
    }

    pub fn create_map<I>(entries: I) -> Packet
    where
        I: IntoIterator<Item = (String, Packet)>,
    {
        Self::from_payload(Payload::Map(entries.into_iter().collect()))
    }

    /// The same payload stamped with `timestamp`.
    ///
    /// Fails with `InvalidArgument` for timestamps before `Timestamp::PRE_STREAM`.
    pub fn at(&self, timestamp: Timestamp) -> Result<Packet, TaskError> {
        if timestamp < Timestamp::PRE_STREAM {
            return Err(TaskError::invalid_argument(format!(
                "cannot stamp a packet with {timestamp}"
            )));
        }
        Ok(Packet {
            payload: self.payload.clone(),
            timestamp,
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// True iff the packet carries no payload at all; an empty list is still a payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_deref()
    }

    pub fn type_tag(&self) -> PacketType {
        match self.payload() {
            None => PacketType::Empty,
            Some(Payload::Value(value)) => PacketType::Value(value.type_name()),
            Some(Payload::Buffer(_)) => PacketType::Buffer,
            Some(Payload::Message(message)) => PacketType::Message(message.type_name.clone()),
            Some(Payload::List(_)) => PacketType::List,
            Some(Payload::Map(_)) => PacketType::Map,
        }
    }

    /// Whether two packets share the same payload allocation.
    pub fn shares_payload_with(&self, other: &Packet) -> bool {
        match (&self.payload, &other.payload) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn mismatch(&self, wanted: &str) -> TaskError {
        TaskError::invalid_argument(format!("packet holds {}, not {}", self.type_tag(), wanted))
    }

    fn value(&self) -> Option<&Value> {
        match self.payload() {
            Some(Payload::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_bool(&self) -> Result<bool, TaskError> {
        match self.value() {
            Some(Value::Bool(v)) => Ok(*v),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Any integer payload as `i64`; fails with `Overflow` for uint64 values above `i64::MAX`.
    pub fn get_int(&self) -> Result<i64, TaskError> {
        let wide = self
            .value()
            .and_then(Value::as_integer)
            .ok_or_else(|| self.mismatch("an integer"))?;
        narrow(wide, "int64")
    }

    /// Any non-negative integer payload as `u64`.
    pub fn get_uint(&self) -> Result<u64, TaskError> {
        let wide = self
            .value()
            .and_then(Value::as_integer)
            .ok_or_else(|| self.mismatch("an integer"))?;
        narrow(wide, "uint64")
    }

    pub fn get_float(&self) -> Result<f64, TaskError> {
        match self.value() {
            Some(Value::Float(v)) => Ok(f64::from(*v)),
            Some(Value::Double(v)) => Ok(*v),
            _ => Err(self.mismatch("a floating point number")),
        }
    }

    pub fn get_str(&self) -> Result<&str, TaskError> {
        match self.value() {
            Some(Value::String(v)) => Ok(v),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn get_bytes(&self) -> Result<&[u8], TaskError> {
        match self.value() {
            Some(Value::Bytes(v)) => Ok(v),
            Some(Value::String(v)) => Ok(v.as_bytes()),
            _ => Err(self.mismatch("bytes")),
        }
    }

    pub fn get_bool_vector(&self) -> Result<&[bool], TaskError> {
        match self.value() {
            Some(Value::BoolVector(v)) => Ok(v),
            _ => Err(self.mismatch("bool_vector")),
        }
    }

    pub fn get_int_vector(&self) -> Result<&[i64], TaskError> {
        match self.value() {
            Some(Value::IntVector(v)) => Ok(v),
            _ => Err(self.mismatch("int_vector")),
        }
    }

    pub fn get_float_vector(&self) -> Result<&[f32], TaskError> {
        match self.value() {
            Some(Value::FloatVector(v)) => Ok(v),
            _ => Err(self.mismatch("float_vector")),
        }
    }

    pub fn get_string_vector(&self) -> Result<&[String], TaskError> {
        match self.value() {
            Some(Value::StringVector(v)) => Ok(v),
            _ => Err(self.mismatch("string_vector")),
        }
    }

    /// Another handle on the carried buffer.
    pub fn get_buffer(&self) -> Result<Buffer, TaskError> {
        match self.payload() {
            Some(Payload::Buffer(buffer)) => Ok(buffer.clone()),
            _ => Err(self.mismatch("buffer")),
        }
    }

    pub fn get_message(&self) -> Result<&SerializedMessage, TaskError> {
        match self.payload() {
            Some(Payload::Message(message)) => Ok(message),
            _ => Err(self.mismatch("a serialized message")),
        }
    }

    /// Decode the carried message as `M`, checking the type name first.
    pub fn get_proto<M: prost::Message + prost::Name + Default>(&self) -> Result<M, TaskError> {
        let message = self.get_message()?;
        let wanted = M::full_name();
        if message.type_name != wanted {
            return Err(TaskError::invalid_argument(format!(
                "packet holds message {}, not {}",
                message.type_name, wanted
            )));
        }
        M::decode(message.bytes.as_slice()).map_err(|e| {
            TaskError::invalid_argument(format!("cannot decode {wanted}: {e}"))
        })
    }

    pub fn get_list(&self) -> Result<&[Packet], TaskError> {
        match self.payload() {
            Some(Payload::List(packets)) => Ok(packets),
            _ => Err(self.mismatch("list")),
        }
    }

    pub fn get_map(&self) -> Result<&BTreeMap<String, Packet>, TaskError> {
        match self.payload() {
            Some(Payload::Map(entries)) => Ok(entries),
            _ => Err(self.mismatch("map")),
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type", &self.type_tag().to_string())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
