//! Tether Metrics - bookkeeping for the dispatch queue
//!
//! Counters and rolling drain timings that completely vanish in
//! production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use tether_metrics::{Counter, DrainTimer};
//!
//! let mut timer = DrainTimer::new(60); // Track last 60 drains
//! timer.begin();
//! // ... run deferred tasks ...
//! timer.end(task_count);
//! println!("drain: {:.3}ms", timer.drain_time_ms());
//! ```
//!
//! Without the `metrics` feature every type below is a zero-sized stub.

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod drain_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use drain_timer::DrainTimer;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
pub struct DrainTimer;

#[cfg(not(feature = "metrics"))]
impl DrainTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self, _tasks: usize) {}
    pub fn drain_time_ms(&self) -> f64 { 0.0 }
    pub fn last_drain_ms(&self) -> f64 { 0.0 }
    pub fn worst_drain_ms(&self) -> f64 { 0.0 }
    pub fn tasks_per_drain(&self) -> f64 { 0.0 }
}

#[cfg(not(feature = "metrics"))]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
}
