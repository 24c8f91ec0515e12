//! Tether Scripting Layer
//!
//! JavaScript execution via QuickJS, wired to the bridge core
//!
//! ## Architecture
//!
//! - **Values:** JS values convert to [`tether_core::Value`] and back
//!   (`convert`); functions are kept alive as persistent references
//! - **Listeners:** script callables captured from parsed tables are
//!   registered with the runtime's `ScriptBridge`
//! - **Native functions:** host closures registered as script globals or
//!   object fields receive their arguments as bridge values
//! - **Dispatch:** [`JsInvoker`] runs queued events inside the QuickJS
//!   context on the thread that owns [`ScriptRuntime`]

pub mod convert;
pub mod error;
mod function;
pub mod invoker;
pub mod runtime;

pub use error::ScriptError;
pub use invoker::{JsFunction, JsInvoker};
pub use runtime::ScriptRuntime;

pub use rquickjs;
