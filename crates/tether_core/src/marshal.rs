//! Conversion between native values and script values
//!
//! Pushing resolves embedded callback handles through the registry, so a
//! marshaller borrows one. Payloads must be acyclic; a cyclic payload
//! cannot be built from owned [`NativeValue`]s anyway.

use crate::error::Result;
use crate::event::Event;
use crate::native::{Hashtable, NativeValue};
use crate::registry::CallbackRegistry;
use crate::value::{Table, Value};

pub struct Marshaller<'r> {
    registry: &'r CallbackRegistry,
}

impl<'r> Marshaller<'r> {
    pub fn new(registry: &'r CallbackRegistry) -> Self {
        Self { registry }
    }

    /// Native value to script value.
    ///
    /// Handles resolve to whatever they captured; a released handle is a
    /// `StaleHandle` error. Pointers are carried as-is, never dereferenced.
    pub fn push_value(&self, value: &NativeValue) -> Result<Value> {
        Ok(match value {
            NativeValue::Nil => Value::Nil,
            NativeValue::Boolean(b) => Value::Boolean(*b),
            NativeValue::Number(n) => Value::Number(*n),
            NativeValue::String(s) => Value::String(s.clone()),
            NativeValue::Bytes(bytes) => Value::ByteArray(bytes.clone()),
            NativeValue::Pointer(pointer) => Value::LightUserdata(*pointer),
            NativeValue::Map(map) => self.push_hashtable(map)?,
            NativeValue::Handle(handle) => self.registry.get(*handle)?.clone(),
        })
    }

    /// Every entry of `map` pushed into one script table.
    pub fn push_hashtable(&self, map: &Hashtable) -> Result<Value> {
        let mut table = Table::with_capacity(map.len());
        for (key, value) in map {
            table.set(key.as_str(), self.push_value(value)?);
        }
        Ok(Value::Table(table))
    }

    /// Event payload as a script table. An unnamed event takes `tag` as
    /// its name.
    pub fn push_event(&self, event: &Event, tag: Option<&str>) -> Result<Value> {
        match tag {
            Some(tag) if event.name().is_empty() => {
                let mut named = event.clone();
                named.set_name(tag);
                self.push_hashtable(named.payload())
            }
            _ => self.push_hashtable(event.payload()),
        }
    }
}

/// Script value back to native data.
///
/// Functions and userdata have no native form: at the top level they
/// become nil, inside a table their entries are left out.
pub fn to_native(value: &Value) -> NativeValue {
    match value {
        Value::Nil | Value::Function(_) | Value::UserData(_) => NativeValue::Nil,
        Value::Boolean(b) => NativeValue::Boolean(*b),
        Value::Number(n) => NativeValue::Number(*n),
        Value::String(s) => NativeValue::String(s.clone()),
        Value::ByteArray(bytes) => NativeValue::Bytes(bytes.clone()),
        Value::LightUserdata(pointer) => NativeValue::Pointer(*pointer),
        Value::Table(table) => NativeValue::Map(table_to_native(table)),
    }
}

pub(crate) fn table_to_native(table: &Table) -> Hashtable {
    let mut map = Hashtable::new();
    for (key, value) in table.iter() {
        match to_native(value) {
            NativeValue::Nil => {
                tracing::trace!(key, kind = %value.value_type(), "dropped entry without native form");
            }
            native => {
                map.insert(key.to_string(), native);
            }
        }
    }
    map
}
