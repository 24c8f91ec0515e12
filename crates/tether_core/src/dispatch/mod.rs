//! Event delivery to script listeners
//!
//! Producers on any thread hold an [`EventDispatcher`] and enqueue. The
//! engine thread owns the [`ScriptBridge`], which invokes immediately when
//! it is already on the engine thread and drains the queue once per tick.

mod bridge;
mod invoker;
mod queue;

pub use bridge::{Dispatch, DrainReport, ScriptBridge};
pub use invoker::{Invoker, NativeInvoker};
pub use queue::{engine_thread_check, DeferredTask, DispatchQueue, EventDispatcher, ThreadCheck};
