//! Native values: what host code hands to the bridge
//!
//! Unlike [`crate::Value`] these are plain data and `Send`, so an event
//! built on a worker thread can sit in the dispatch queue until the engine
//! thread picks it up.

use crate::pointer::OpaquePointer;
use crate::registry::CallbackHandle;
use serde::Serialize;
use std::collections::BTreeMap;

/// String-keyed mapping of native values (event payloads, nested tables).
pub type Hashtable = BTreeMap<String, NativeValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NativeValue {
    Nil,
    Boolean(bool),
    /// Scripts have a single number type; integers are widened to `f64`.
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Pointer(OpaquePointer),
    Map(Hashtable),
    /// Another registered callback; resolved to its callable when pushed.
    Handle(CallbackHandle),
}

impl NativeValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, NativeValue::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Boolean(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Number(value)
    }
}

impl From<f32> for NativeValue {
    fn from(value: f32) -> Self {
        NativeValue::Number(value as f64)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Number(value as f64)
    }
}

impl From<u32> for NativeValue {
    fn from(value: u32) -> Self {
        NativeValue::Number(value as f64)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Number(value as f64)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(value: Vec<u8>) -> Self {
        NativeValue::Bytes(value)
    }
}

impl From<&[u8]> for NativeValue {
    fn from(value: &[u8]) -> Self {
        NativeValue::Bytes(value.to_vec())
    }
}

impl From<OpaquePointer> for NativeValue {
    fn from(value: OpaquePointer) -> Self {
        NativeValue::Pointer(value)
    }
}

impl From<Hashtable> for NativeValue {
    fn from(value: Hashtable) -> Self {
        NativeValue::Map(value)
    }
}

impl From<CallbackHandle> for NativeValue {
    fn from(value: CallbackHandle) -> Self {
        NativeValue::Handle(value)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Nil, Into::into)
    }
}
