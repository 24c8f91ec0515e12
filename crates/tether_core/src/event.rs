//! Event payloads delivered to script listeners

use crate::native::{Hashtable, NativeValue};
use serde::Serialize;

pub const NAME_KEY: &str = "name";
pub const PHASE_KEY: &str = "phase";
/// Phase/subtype key of legacy events.
pub const LEGACY_PHASE_KEY: &str = "type";
pub const IS_ERROR_KEY: &str = "isError";
pub const ERROR_CODE_KEY: &str = "errorCode";
pub const ERROR_MESSAGE_KEY: &str = "errorMessage";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum EventShape {
    Standard,
    /// Older listeners read the phase from `type` instead of `phase`.
    Legacy,
}

impl EventShape {
    pub fn phase_key(&self) -> &'static str {
        match self {
            EventShape::Standard => PHASE_KEY,
            EventShape::Legacy => LEGACY_PHASE_KEY,
        }
    }
}

/// A name plus a flat key/value payload.
///
/// The name lives in the payload under `name`, so the marshalled table is
/// exactly the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    shape: EventShape,
    payload: Hashtable,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Self::with_shape(name, EventShape::Standard)
    }

    pub fn legacy(name: &str) -> Self {
        Self::with_shape(name, EventShape::Legacy)
    }

    fn with_shape(name: &str, shape: EventShape) -> Self {
        let mut payload = Hashtable::new();
        payload.insert(NAME_KEY.to_string(), NativeValue::from(name));
        Self { shape, payload }
    }

    pub fn shape(&self) -> EventShape {
        self.shape
    }

    pub fn name(&self) -> &str {
        self.payload
            .get(NAME_KEY)
            .and_then(NativeValue::as_str)
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.put(NAME_KEY, name)
    }

    /// Set `key`. A nil value removes the key instead.
    pub fn put(&mut self, key: &str, value: impl Into<NativeValue>) -> &mut Self {
        match value.into() {
            NativeValue::Nil => {
                self.payload.remove(key);
            }
            value => {
                self.payload.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<NativeValue>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&NativeValue> {
        self.payload.get(key)
    }

    pub fn phase(&self) -> Option<&str> {
        self.get(self.shape.phase_key()).and_then(NativeValue::as_str)
    }

    pub fn set_phase(&mut self, phase: &str) -> &mut Self {
        let key = self.shape.phase_key();
        self.put(key, phase)
    }

    pub fn set_ok(&mut self) -> &mut Self {
        self.put(IS_ERROR_KEY, false)
    }

    /// Mark the event failed with a machine-readable code and a message.
    pub fn set_error(&mut self, code: &str, message: &str) -> &mut Self {
        self.put(IS_ERROR_KEY, true)
            .put(ERROR_CODE_KEY, code)
            .put(ERROR_MESSAGE_KEY, message)
    }

    pub fn is_error(&self) -> bool {
        self.get(IS_ERROR_KEY)
            .and_then(NativeValue::as_bool)
            .unwrap_or(false)
    }

    pub fn payload(&self) -> &Hashtable {
        &self.payload
    }

    pub fn into_payload(self) -> Hashtable {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_event_layout() {
        let mut event = Event::new("microphone");
        event.set_phase("recorded").set_ok();

        assert_eq!(event.name(), "microphone");
        assert_eq!(event.phase(), Some("recorded"));
        assert_eq!(event.get(PHASE_KEY), Some(&NativeValue::from("recorded")));
        assert!(!event.is_error());
    }

    #[test]
    fn test_legacy_event_uses_type_key() {
        let mut event = Event::legacy("microphone");
        event.set_phase("init");

        assert_eq!(event.get(LEGACY_PHASE_KEY), Some(&NativeValue::from("init")));
        assert_eq!(event.get(PHASE_KEY), None);
        assert_eq!(event.phase(), Some("init"));
        assert_eq!(event.name(), "microphone");
    }

    #[test]
    fn test_error_fields() {
        let mut event = Event::new("microphone");
        event.set_error("empty_recording", "The recording is empty.");

        assert!(event.is_error());
        assert_eq!(event.get(ERROR_CODE_KEY).and_then(NativeValue::as_str), Some("empty_recording"));
    }

    #[test]
    fn test_nil_removes_key() {
        let event = Event::new("e").with("volume", 0.5).with("volume", NativeValue::Nil);
        assert_eq!(event.get("volume"), None);
        assert_eq!(event.payload().len(), 1);
    }
}
