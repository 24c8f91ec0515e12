//! Native functions exposed to scripts
//!
//! A native function receives its JS arguments converted to bridge values
//! and returns a bridge value. Errors it returns are thrown into the script
//! as exceptions carrying the error message.

use crate::convert::{from_js, to_js};
use crate::error::{Result, ScriptError};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Value as JsValue};
use std::cell::RefCell;
use std::rc::Rc;
use tether_core::{BridgeError, Value};

/// The last bridge error a native function threw.
///
/// Lets the runtime report an uncaught exception that started as a native
/// validation failure as that bridge error.
#[derive(Clone, Default)]
pub(crate) struct NativeErrors(Rc<RefCell<Option<BridgeError>>>);

impl NativeErrors {
    fn record(&self, err: BridgeError) {
        *self.0.borrow_mut() = Some(err);
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().take();
    }

    /// Swap `err` for the recorded bridge error if that is what was thrown.
    pub(crate) fn resolve(&self, err: ScriptError) -> ScriptError {
        let Some(native) = self.0.borrow_mut().take() else {
            return err;
        };
        match err {
            ScriptError::Exception { message } if message == native.to_string() => {
                ScriptError::Bridge(native)
            }
            other => other,
        }
    }
}

pub(crate) fn native_function<'js, F>(
    ctx: &Ctx<'js>,
    function: F,
    max_depth: usize,
    errors: NativeErrors,
) -> rquickjs::Result<Function<'js>>
where
    F: Fn(&[Value]) -> tether_core::Result<Value> + 'static,
{
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            match call(&ctx, &function, args.0, max_depth) {
                Ok(value) => Ok(value),
                Err(ScriptError::Js(err)) => Err(err),
                Err(err) => {
                    let message = err.to_string();
                    if let ScriptError::Bridge(native) = err {
                        errors.record(native);
                    }
                    Err(Exception::throw_message(&ctx, &message))
                }
            }
        },
    )
}

fn call<'js, F>(ctx: &Ctx<'js>, function: &F, args: Vec<JsValue<'js>>, max_depth: usize) -> Result<JsValue<'js>>
where
    F: Fn(&[Value]) -> tether_core::Result<Value>,
{
    let args = args
        .into_iter()
        .map(|arg| from_js(ctx, arg, max_depth))
        .collect::<Result<Vec<_>>>()?;
    let returned = function(&args)?;
    to_js(ctx, &returned)
}
