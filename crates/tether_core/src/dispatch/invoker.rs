use crate::error::{BridgeError, Result};
use crate::value::Value;

/// Calls a captured script callable with one argument.
///
/// Implemented by each engine integration; the bridge only hands it the
/// registered value and the marshalled event table.
pub trait Invoker {
    fn invoke(&mut self, callable: &Value, argument: Value) -> Result<()>;
}

/// Invoker for callables backed by Rust closures
/// ([`crate::FunctionRef::native`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeInvoker;

impl Invoker for NativeInvoker {
    fn invoke(&mut self, callable: &Value, argument: Value) -> Result<()> {
        let Value::Function(function) = callable else {
            return Err(BridgeError::Invocation {
                message: format!("{} is not callable", callable.value_type()),
            });
        };
        match function.call_native(&argument) {
            Some(outcome) => outcome.map_err(|message| BridgeError::Invocation { message }),
            None => Err(BridgeError::Invocation {
                message: "function is not a native closure".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FunctionRef;

    #[test]
    fn test_native_invoker() {
        let mut invoker = NativeInvoker;
        let ok = Value::Function(FunctionRef::native(|_| Ok(())));
        let failing = Value::Function(FunctionRef::native(|_| Err("boom".to_string())));

        assert!(invoker.invoke(&ok, Value::Nil).is_ok());
        assert_eq!(
            invoker.invoke(&failing, Value::Nil),
            Err(BridgeError::Invocation { message: "boom".to_string() })
        );
        assert!(invoker.invoke(&Value::Number(1.0), Value::Nil).is_err());
        assert!(invoker
            .invoke(&Value::Function(FunctionRef::new(7u8)), Value::Nil)
            .is_err());
    }
}
