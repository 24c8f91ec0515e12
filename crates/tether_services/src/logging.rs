//! Tagged log output for plugin-style code
//!
//! Every line carries the tag set once at startup. `debug_log` is silent
//! until `enable_debug` is called, whatever the subscriber's level.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_TAG: &str = "tether";

static TAG: OnceCell<String> = OnceCell::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Set the tag. Only the first call has an effect; returns whether it did.
pub fn set_tag(tag: &str) -> bool {
    let accepted = TAG.set(tag.to_string()).is_ok();
    if !accepted {
        tracing::warn!(tag, current = self::tag(), "log tag already set");
    }
    accepted
}

pub fn tag() -> &'static str {
    TAG.get().map(String::as_str).unwrap_or(DEFAULT_TAG)
}

pub fn enable_debug() {
    DEBUG.store(true, Ordering::Relaxed);
}

pub fn is_debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

pub fn debug_log(message: &str) {
    if is_debug_enabled() {
        tracing::info!(tag = tag(), "{message}");
    }
}

pub fn log(message: &str) {
    tracing::info!(tag = tag(), "{message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both statics are process-wide, so one test covers them
    #[test]
    fn test_tag_and_debug_switch() {
        assert!(set_tag("microphone"));
        assert!(!set_tag("other"));
        assert_eq!(tag(), "microphone");

        debug_log("dropped");
        enable_debug();
        assert!(is_debug_enabled());
        debug_log("kept");
        log("always");
    }
}
