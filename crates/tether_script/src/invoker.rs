//! Calling captured JS functions from the dispatch queue

use crate::convert::to_js;
use crate::error::{caught, ScriptError};
use rquickjs::{Ctx, Function, Persistent};
use tether_core::{BridgeError, Invoker, NativeInvoker, Value};

/// A JS function kept alive outside any `Context::with` scope.
///
/// Must be dropped before the runtime that created it.
pub struct JsFunction(Persistent<Function<'static>>);

impl JsFunction {
    pub fn new(function: Persistent<Function<'static>>) -> Self {
        Self(function)
    }

    pub fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
        self.0.clone().restore(ctx)
    }
}

/// Invokes listeners inside one QuickJS context.
///
/// Borrowed for the length of a single `Context::with` call; callables
/// that are not JS functions fall through to [`NativeInvoker`].
pub struct JsInvoker<'js> {
    ctx: Ctx<'js>,
}

impl<'js> JsInvoker<'js> {
    pub fn new(ctx: Ctx<'js>) -> Self {
        Self { ctx }
    }

    fn call(&self, function: &JsFunction, argument: &Value) -> Result<(), ScriptError> {
        let function = function.restore(&self.ctx)?;
        let argument = to_js(&self.ctx, argument)?;
        function
            .call::<_, ()>((argument,))
            .map_err(|err| caught(&self.ctx, err))
    }
}

impl Invoker for JsInvoker<'_> {
    fn invoke(&mut self, callable: &Value, argument: Value) -> tether_core::Result<()> {
        let js = match callable {
            Value::Function(function) => function.downcast_ref::<JsFunction>(),
            _ => None,
        };
        match js {
            Some(function) => self.call(function, &argument).map_err(|err| match err {
                ScriptError::Bridge(err) => err,
                other => BridgeError::Invocation {
                    message: other.to_string(),
                },
            }),
            None => NativeInvoker.invoke(callable, argument),
        }
    }
}
