//! JS ⇄ bridge value conversion
//!
//! | JS | bridge |
//! |---|---|
//! | `undefined`, `null` | `Nil` |
//! | boolean, number, string | `Boolean`, `Number`, `String` |
//! | `ArrayBuffer`, `Uint8Array` | `ByteArray` |
//! | function | `Function` (persistent reference) |
//! | `{ __lightuserdata: "0x.." }` | `LightUserdata` |
//! | other objects and arrays | `Table` (array indices become `"0"`, `"1"`, ...) |

use crate::error::{Result, ScriptError};
use crate::invoker::JsFunction;
use rquickjs::{ArrayBuffer, Ctx, IntoJs, Object, Persistent, TypedArray, Undefined, Value as JsValue};
use tether_core::{FunctionRef, OpaquePointer, Table, Value};

/// Key of the wrapper object that carries an opaque pointer through JS.
pub const POINTER_KEY: &str = "__lightuserdata";

/// Nesting allowed before conversion gives up (cyclic objects hit this).
pub const DEFAULT_MAX_DEPTH: usize = 32;

pub fn from_js<'js>(ctx: &Ctx<'js>, value: JsValue<'js>, max_depth: usize) -> Result<Value> {
    convert_in(ctx, value, max_depth, max_depth)
}

fn convert_in<'js>(ctx: &Ctx<'js>, value: JsValue<'js>, depth: usize, limit: usize) -> Result<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Nil);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Boolean(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(Value::Number(i as f64));
    }
    if let Some(f) = value.as_float() {
        return Ok(Value::Number(f));
    }
    if let Some(s) = value.as_string() {
        return Ok(Value::String(s.to_string()?));
    }
    if let Some(function) = value.as_function() {
        let persistent = Persistent::save(ctx, function.clone());
        return Ok(Value::Function(FunctionRef::new(JsFunction::new(persistent))));
    }
    if let Some(object) = value.as_object() {
        if depth == 0 {
            return Err(ScriptError::DepthLimit { limit });
        }
        return object_in(ctx, object.clone(), depth - 1, limit);
    }
    Err(ScriptError::Unsupported {
        type_name: format!("{:?}", value.type_of()),
    })
}

fn object_in<'js>(ctx: &Ctx<'js>, object: Object<'js>, depth: usize, limit: usize) -> Result<Value> {
    if let Some(address) = object.get::<_, Option<String>>(POINTER_KEY)? {
        return parse_pointer(&address);
    }
    if let Some(buffer) = ArrayBuffer::from_object(object.clone()) {
        // A detached buffer has no bytes left
        let bytes = buffer.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
        return Ok(Value::ByteArray(bytes));
    }
    if let Some(view) = TypedArray::<u8>::from_object(object.clone()).ok() {
        // Only the viewed window, not the whole backing buffer
        let bytes = view.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
        return Ok(Value::ByteArray(bytes));
    }

    let mut table = Table::new();
    for prop in object.props::<String, JsValue>() {
        let (key, value) = prop?;
        table.set(key, convert_in(ctx, value, depth, limit)?);
    }
    Ok(Value::Table(table))
}

fn parse_pointer(address: &str) -> Result<Value> {
    let digits = address.trim_start_matches("0x");
    usize::from_str_radix(digits, 16)
        .map(|addr| Value::LightUserdata(OpaquePointer::from_addr(addr)))
        .map_err(|_| ScriptError::Unsupported {
            type_name: format!("malformed pointer '{address}'"),
        })
}

pub fn to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> Result<JsValue<'js>> {
    let converted = match value {
        Value::Nil => Undefined.into_js(ctx)?,
        Value::Boolean(b) => (*b).into_js(ctx)?,
        Value::Number(n) => (*n).into_js(ctx)?,
        Value::String(s) => s.as_str().into_js(ctx)?,
        Value::ByteArray(bytes) => ArrayBuffer::new(ctx.clone(), bytes.clone())?.into_value(),
        Value::Table(table) => {
            let object = Object::new(ctx.clone())?;
            for (key, entry) in table.iter() {
                object.set(key, to_js(ctx, entry)?)?;
            }
            object.into_value()
        }
        Value::Function(function) => match function.downcast_ref::<JsFunction>() {
            Some(js) => js.restore(ctx)?.into_value(),
            None => {
                return Err(ScriptError::Unsupported {
                    type_name: "native closure".to_string(),
                })
            }
        },
        Value::LightUserdata(pointer) => {
            let object = Object::new(ctx.clone())?;
            object.set(POINTER_KEY, format!("{:#x}", pointer.addr()))?;
            object.into_value()
        }
        Value::UserData(data) => {
            return Err(ScriptError::Unsupported {
                type_name: data.type_name().to_string(),
            })
        }
    };
    Ok(converted)
}
