//! Tether Core
//!
//! The native half of a script bridge:
//! - Dynamic value model and opaque pointers
//! - Schemes and schema-validated table parsing
//! - Marshalling between native values and script values
//! - Callback registry and the cross-thread dispatch queue
//!
//! Nothing in this crate knows which scripting engine sits on the other
//! side. Engines plug in through [`dispatch::Invoker`] and by wrapping
//! their callables in [`value::FunctionRef`].

pub mod args;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod marshal;
pub mod native;
pub mod pointer;
pub mod registry;
pub mod schema;
pub mod table;
pub mod value;

pub use args::{check_arg_count, ArgCount};
pub use dispatch::{
    engine_thread_check, DeferredTask, Dispatch, DispatchQueue, DrainReport, EventDispatcher,
    Invoker, NativeInvoker, ScriptBridge, ThreadCheck,
};
pub use error::{BridgeError, Result};
pub use event::{Event, EventShape};
pub use marshal::{to_native, Marshaller};
pub use native::{Hashtable, NativeValue};
pub use pointer::OpaquePointer;
pub use registry::{CallbackHandle, CallbackRegistry, HandleKind};
pub use schema::{Kind, SchemaNode, Scheme, SchemeBuilder};
pub use table::{TableParser, TableValue};
pub use value::{FunctionRef, Table, UserData, Value, ValueType};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
