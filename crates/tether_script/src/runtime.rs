//! Script runtime management
//!
//! One QuickJS runtime plus the bridge that owns its listeners. The
//! runtime is pinned to the thread that created it; that thread is the
//! engine thread for dispatch purposes.

use crate::convert::{from_js, to_js, DEFAULT_MAX_DEPTH};
use crate::error::{caught, Result};
use crate::function::{native_function, NativeErrors};
use crate::invoker::JsInvoker;
use rquickjs::{Context, Function, Object, Runtime};
use std::path::Path;
use tether_core::{
    CallbackHandle, Dispatch, DrainReport, Event, EventDispatcher, Scheme, ScriptBridge,
    TableParser, TableValue, Value,
};

/// Script execution context
pub struct ScriptRuntime {
    // Declared first: the registry holds persistent function references
    // that must be released while the runtime is still alive.
    bridge: ScriptBridge,
    context: Context,
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    max_depth: usize,
    native_errors: NativeErrors,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self> {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Runtime whose JS → bridge conversion stops at `max_depth` levels.
    pub fn with_max_depth(max_depth: usize) -> Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;

        context.with(|ctx| {
            let print = Function::new(ctx.clone(), |msg: String| {
                tracing::info!(target: "script", "{msg}");
            })?;
            ctx.globals().set("print", print)?;
            Ok::<_, rquickjs::Error>(())
        })?;

        Ok(Self {
            bridge: ScriptBridge::for_current_thread(),
            context,
            runtime,
            max_depth,
            native_errors: NativeErrors::default(),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut ScriptBridge {
        &mut self.bridge
    }

    /// Handle for raising events from other threads.
    pub fn dispatcher(&self) -> EventDispatcher {
        self.bridge.dispatcher()
    }

    pub fn execute_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.execute(&source)
    }

    /// Run `source`. An uncaught exception thrown by a native function
    /// comes back as the bridge error that caused it.
    pub fn execute(&self, source: &str) -> Result<()> {
        self.native_errors.clear();
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .map_err(|err| self.native_errors.resolve(caught(&ctx, err)))
        })
    }

    /// Call a global function with no arguments.
    pub fn call_function(&self, name: &str) -> Result<()> {
        self.native_errors.clear();
        self.context.with(|ctx| {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(())
                .map_err(|err| self.native_errors.resolve(caught(&ctx, err)))
        })
    }

    /// Expose `function` to scripts as the global `name`.
    ///
    /// The function gets its arguments as bridge values, so it can check
    /// them with `check_arg_count` and `TableParser`. A returned error is
    /// thrown into the script.
    pub fn set_function<F>(&self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&[Value]) -> tether_core::Result<Value> + 'static,
    {
        self.context.with(|ctx| {
            let function = native_function(&ctx, function, self.max_depth, self.native_errors.clone())?;
            ctx.globals().set(name, function)?;
            Ok(())
        })
    }

    /// Like [`set_function`](Self::set_function), but as field `name` of the
    /// global object `object`, which is created when missing.
    pub fn set_field_function<F>(&self, object: &str, name: &str, function: F) -> Result<()>
    where
        F: Fn(&[Value]) -> tether_core::Result<Value> + 'static,
    {
        self.context.with(|ctx| {
            let globals = ctx.globals();
            let target = match globals.get::<_, Option<Object>>(object)? {
                Some(target) => target,
                None => {
                    let target = Object::new(ctx.clone())?;
                    globals.set(object, target.clone())?;
                    target
                }
            };
            let function = native_function(&ctx, function, self.max_depth, self.native_errors.clone())?;
            target.set(name, function)?;
            Ok(())
        })
    }

    /// A global converted to a bridge value.
    pub fn global(&self, name: &str) -> Result<Value> {
        self.context.with(|ctx| {
            let value: rquickjs::Value = ctx.globals().get(name)?;
            from_js(&ctx, value, self.max_depth)
        })
    }

    pub fn set_global(&self, name: &str, value: &Value) -> Result<()> {
        self.context.with(|ctx| {
            let value = to_js(&ctx, value)?;
            ctx.globals().set(name, value)?;
            Ok(())
        })
    }

    /// Parse a global table against `scheme`.
    pub fn parse_global(&self, name: &str, scheme: &Scheme) -> Result<TableValue> {
        let value = self.global(name)?;
        Ok(TableParser::parse(&value, scheme)?)
    }

    /// Register the listener at `path` of a parsed table. The caller owns
    /// the returned handle.
    pub fn register_listener(
        &mut self,
        table: &TableValue,
        path: &str,
    ) -> Result<Option<CallbackHandle>> {
        Ok(table.get_listener(path, self.bridge.registry_mut())?)
    }

    pub fn release_listener(&mut self, handle: Option<CallbackHandle>) -> Result<()> {
        Ok(self.bridge.delete_ref_if_not_nil(handle)?)
    }

    /// Deliver `event` now (this is the engine thread).
    pub fn dispatch_event(
        &mut self,
        target: impl Into<Option<CallbackHandle>>,
        event: Event,
        delete_ref: bool,
    ) -> Result<Dispatch> {
        let bridge = &mut self.bridge;
        self.context.with(|ctx| {
            let mut invoker = JsInvoker::new(ctx);
            Ok(bridge.dispatch_event(&mut invoker, target, event, delete_ref)?)
        })
    }

    /// Drain the dispatch queue. Call once per tick.
    pub fn execute_tasks(&mut self) -> Result<DrainReport> {
        let bridge = &mut self.bridge;
        self.context.with(|ctx| {
            let mut invoker = JsInvoker::new(ctx);
            Ok(bridge.execute_tasks(&mut invoker)?)
        })
    }
}
