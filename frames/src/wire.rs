//! Protobuf shape of a [`Frame`].
//!
//! The envelope fields map one to one. The JSON payload travels as a
//! `google.protobuf.Value`, which has a single double-precision number type:
//! every JSON number comes back as a float, and non-finite doubles come back
//! as `null`. Consumers that need integers (`z_index`) accept integral floats.

use prost_types::value::Kind;
use prost_types::{ListValue, NullValue, Struct};
use serde_json::{Map, Number, Value};

use crate::{CodecError, Frame, Status};

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WireFrame {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, optional, tag = "2")]
    pub parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    pub ts: i64,
    #[prost(string, optional, tag = "4")]
    pub board_id: Option<String>,
    /// Relay-stamped sender.
    #[prost(string, optional, tag = "5")]
    pub sender: Option<String>,
    #[prost(string, tag = "6")]
    pub syscall: String,
    #[prost(enumeration = "WireStatus", tag = "7")]
    pub status: i32,
    #[prost(message, optional, tag = "8")]
    pub data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub(crate) enum WireStatus {
    Request = 0,
    Done = 1,
    Error = 2,
}

impl From<Status> for WireStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Request => Self::Request,
            Status::Done => Self::Done,
            Status::Error => Self::Error,
        }
    }
}

impl TryFrom<i32> for Status {
    type Error = CodecError;

    fn try_from(value: i32) -> Result<Self, CodecError> {
        match WireStatus::try_from(value) {
            Ok(WireStatus::Request) => Ok(Self::Request),
            Ok(WireStatus::Done) => Ok(Self::Done),
            Ok(WireStatus::Error) => Ok(Self::Error),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

impl From<&Frame> for WireFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id.clone(),
            parent_id: frame.parent_id.clone(),
            ts: frame.ts,
            board_id: frame.board_id.clone(),
            sender: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: WireStatus::from(frame.status) as i32,
            data: Some(to_proto(&frame.data)),
        }
    }
}

impl TryFrom<WireFrame> for Frame {
    type Error = CodecError;

    fn try_from(wire: WireFrame) -> Result<Self, CodecError> {
        Ok(Self {
            status: Status::try_from(wire.status)?,
            // Absent payload reads as `{}`.
            data: wire.data.as_ref().map_or_else(|| Value::Object(Map::new()), from_proto),
            id: wire.id,
            parent_id: wire.parent_id,
            ts: wire.ts,
            board_id: wire.board_id,
            from: wire.sender,
            syscall: wire.syscall,
        })
    }
}

pub(crate) fn to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue { values: items.iter().map(to_proto).collect() }),
        Value::Object(map) => {
            Kind::StructValue(Struct { fields: map.iter().map(|(k, v)| (k.clone(), to_proto(v))).collect() })
        }
    };
    prost_types::Value { kind: Some(kind) }
}

pub(crate) fn from_proto(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(from_proto).collect()),
        Some(Kind::StructValue(st)) => {
            Value::Object(st.fields.iter().map(|(k, v)| (k.clone(), from_proto(v))).collect())
        }
    }
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
