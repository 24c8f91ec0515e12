//! Schema-validated table parsing
//!
//! [`TableParser::parse`] checks a script table against a [`Scheme`] in
//! one pass and produces a [`TableValue`]: every declared path either holds
//! a value of the declared kind or is recorded as absent. Typed accessors
//! then read from the result. Each accessor comes in up to three flavours:
//!
//! - `get_x(path)` returns `Ok(None)` for an absent optional path
//! - `get_x_or(path, default)` substitutes `default`
//! - `get_x_not_null(path)` turns absence into `MissingField`

use crate::error::{BridgeError, Result};
use crate::marshal::table_to_native;
use crate::native::Hashtable;
use crate::pointer::OpaquePointer;
use crate::registry::{CallbackHandle, CallbackRegistry};
use crate::schema::{Kind, Scheme};
use crate::value::{FunctionRef, Table, UserData, Value};
use std::collections::HashMap;

pub struct TableParser;

impl TableParser {
    /// Parse a script argument. Nil reads as an empty table.
    pub fn parse(value: &Value, scheme: &Scheme) -> Result<TableValue> {
        match value {
            Value::Table(table) => Self::parse_table(table, scheme),
            Value::Nil => Self::parse_table(&Table::new(), scheme),
            other => Err(BridgeError::mismatch("", Kind::Table, other.value_type())),
        }
    }

    /// Validate every scheme node against `table`, in declaration order.
    ///
    /// The first failure is returned; the input is never modified.
    pub fn parse_table(table: &Table, scheme: &Scheme) -> Result<TableValue> {
        let mut fields = HashMap::with_capacity(scheme.len());
        for node in scheme.nodes() {
            let value = match table.resolve(node.path()) {
                None | Some(Value::Nil) => {
                    if node.is_required() {
                        return Err(BridgeError::missing(node.path()));
                    }
                    None
                }
                Some(value) if node.kind().accepts(value) => Some(value.clone()),
                Some(value) => {
                    return Err(BridgeError::mismatch(
                        node.path(),
                        node.kind(),
                        value.value_type(),
                    ));
                }
            };
            fields.insert(
                node.path().to_string(),
                Field {
                    kind: node.kind(),
                    value,
                    event_name: node.event_name().map(str::to_string),
                },
            );
        }
        Ok(TableValue { fields })
    }
}

struct Field {
    kind: Kind,
    value: Option<Value>,
    event_name: Option<String>,
}

/// Parsed arguments keyed by scheme path.
pub struct TableValue {
    fields: HashMap<String, Field>,
}

fn truncate(path: &str, value: f64, min: f64, max: f64, target: &'static str) -> Result<f64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= min && truncated <= max {
        Ok(truncated)
    } else {
        Err(BridgeError::NumericRange {
            path: path.to_string(),
            value,
            target,
        })
    }
}

impl TableValue {
    /// Raw value at `path`; `None` when absent.
    pub fn get_any(&self, path: &str) -> Option<&Value> {
        match self.fields.get(path) {
            Some(field) => field.value.as_ref(),
            None => {
                tracing::warn!(path, "read of a path the scheme does not declare");
                None
            }
        }
    }

    pub fn is_present(&self, path: &str) -> bool {
        self.fields
            .get(path)
            .is_some_and(|field| field.value.is_some())
    }

    fn extract<'a, T>(
        &'a self,
        path: &str,
        expected: Kind,
        read: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get_any(path) {
            None => Ok(None),
            Some(value) => read(value)
                .map(Some)
                .ok_or_else(|| BridgeError::mismatch(path, expected, value.value_type())),
        }
    }

    // --- boolean -----------------------------------------------------------

    pub fn get_boolean(&self, path: &str) -> Result<Option<bool>> {
        self.extract(path, Kind::Boolean, |value| match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        })
    }

    pub fn get_boolean_or(&self, path: &str, default: bool) -> Result<bool> {
        Ok(self.get_boolean(path)?.unwrap_or(default))
    }

    // --- string ------------------------------------------------------------

    pub fn get_string(&self, path: &str) -> Result<Option<&str>> {
        self.extract(path, Kind::String, |value| match value {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_string_or<'a>(&'a self, path: &str, default: &'a str) -> Result<&'a str> {
        Ok(self.get_string(path)?.unwrap_or(default))
    }

    pub fn get_string_not_null(&self, path: &str) -> Result<&str> {
        self.get_string(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    // --- numbers -----------------------------------------------------------

    /// Numbers, or numeric strings for `Numeric` paths.
    pub fn get_double(&self, path: &str) -> Result<Option<f64>> {
        let numeric = self.fields.get(path).is_some_and(|field| field.kind == Kind::Numeric);
        self.extract(path, Kind::Number, |value| match value {
            Value::Number(n) => Some(*n),
            Value::String(_) if numeric => value.to_number(),
            _ => None,
        })
    }

    pub fn get_double_or(&self, path: &str, default: f64) -> Result<f64> {
        Ok(self.get_double(path)?.unwrap_or(default))
    }

    pub fn get_double_not_null(&self, path: &str) -> Result<f64> {
        self.get_double(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    /// Truncated toward zero; `NumericRange` if it does not fit an `i32`.
    pub fn get_integer(&self, path: &str) -> Result<Option<i32>> {
        self.get_double(path)?
            .map(|n| truncate(path, n, i32::MIN as f64, i32::MAX as f64, "i32").map(|t| t as i32))
            .transpose()
    }

    pub fn get_integer_or(&self, path: &str, default: i32) -> Result<i32> {
        Ok(self.get_integer(path)?.unwrap_or(default))
    }

    pub fn get_integer_not_null(&self, path: &str) -> Result<i32> {
        self.get_integer(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    /// Truncated toward zero; `NumericRange` if it does not fit an `i64`.
    pub fn get_long(&self, path: &str) -> Result<Option<i64>> {
        // i64::MAX rounds up to 2^63 as f64, which is already out of range
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        self.get_double(path)?
            .map(|n| {
                let t = truncate(path, n, -LIMIT, LIMIT, "i64")?;
                if t == LIMIT {
                    return Err(BridgeError::NumericRange {
                        path: path.to_string(),
                        value: n,
                        target: "i64",
                    });
                }
                Ok(t as i64)
            })
            .transpose()
    }

    pub fn get_long_or(&self, path: &str, default: i64) -> Result<i64> {
        Ok(self.get_long(path)?.unwrap_or(default))
    }

    pub fn get_long_not_null(&self, path: &str) -> Result<i64> {
        self.get_long(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    // --- byte arrays -------------------------------------------------------

    pub fn get_byte_array(&self, path: &str) -> Result<Option<&[u8]>> {
        self.extract(path, Kind::ByteArray, |value| match value {
            Value::ByteArray(bytes) => Some(bytes.as_slice()),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        })
    }

    pub fn get_byte_array_or<'a>(&'a self, path: &str, default: &'a [u8]) -> Result<&'a [u8]> {
        Ok(self.get_byte_array(path)?.unwrap_or(default))
    }

    pub fn get_byte_array_not_null(&self, path: &str) -> Result<&[u8]> {
        self.get_byte_array(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    // --- userdata ----------------------------------------------------------

    pub fn get_lightuserdata(&self, path: &str) -> Result<Option<OpaquePointer>> {
        self.extract(path, Kind::LightUserdata, |value| match value {
            Value::LightUserdata(pointer) => Some(*pointer),
            _ => None,
        })
    }

    pub fn get_lightuserdata_or(&self, path: &str, default: OpaquePointer) -> Result<OpaquePointer> {
        Ok(self.get_lightuserdata(path)?.unwrap_or(default))
    }

    pub fn get_lightuserdata_not_null(&self, path: &str) -> Result<OpaquePointer> {
        self.get_lightuserdata(path)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    pub fn get_userdata(&self, path: &str) -> Result<Option<&UserData>> {
        self.extract(path, Kind::UserData, |value| match value {
            Value::UserData(data) => Some(data),
            _ => None,
        })
    }

    // --- callables ---------------------------------------------------------

    pub fn get_function(&self, path: &str) -> Result<Option<&FunctionRef>> {
        self.extract(path, Kind::Function, Value::as_function)
    }

    /// Register the function at `path` as a listener.
    ///
    /// Each call creates a new owned reference that the caller must release.
    /// The returned handle remembers the event name the path was declared
    /// with. `None` is the nil listener.
    pub fn get_listener(
        &self,
        path: &str,
        registry: &mut CallbackRegistry,
    ) -> Result<Option<CallbackHandle>> {
        let Some(function) = self.get_function(path)? else {
            return Ok(None);
        };
        let tag = self
            .fields
            .get(path)
            .and_then(|field| field.event_name.clone());
        Ok(Some(registry.new_tagged_ref(Value::Function(function.clone()), tag)))
    }

    pub fn get_listener_not_null(
        &self,
        path: &str,
        registry: &mut CallbackRegistry,
    ) -> Result<CallbackHandle> {
        self.get_listener(path, registry)?
            .ok_or_else(|| BridgeError::missing(path))
    }

    // --- tables ------------------------------------------------------------

    pub fn get_table(&self, path: &str) -> Result<Option<&Table>> {
        self.extract(path, Kind::Table, Value::as_table)
    }

    pub fn get_table_or<'a>(&'a self, path: &str, default: &'a Table) -> Result<&'a Table> {
        Ok(self.get_table(path)?.unwrap_or(default))
    }

    /// The table at `path` copied out as native data.
    pub fn get_hashtable(&self, path: &str) -> Result<Option<Hashtable>> {
        Ok(self.get_table(path)?.map(table_to_native))
    }

    /// Parse the table at `path` with its own scheme.
    pub fn nested(&self, path: &str, scheme: &Scheme) -> Result<Option<TableValue>> {
        self.get_table(path)?
            .map(|table| TableParser::parse_table(table, scheme))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Marshaller;
    use crate::native::NativeValue;

    fn microphone_scheme() -> Scheme {
        Scheme::builder()
            .required("filename", Kind::String)
            .lightuserdata("baseDir")
            .table("detector")
            .number("detector.on")
            .number("detector.off")
            .numeric("sampleRate")
            .table("gain")
            .number("gain.min")
            .boolean("gain.allowClipping")
            .listener_named("listener", "microphone")
            .build()
            .unwrap()
    }

    #[test]
    fn test_type_mismatch_names_path() {
        let scheme = Scheme::builder().required("x", Kind::Number).build().unwrap();
        let table = Table::new().with("x", "not a number");

        let err = TableParser::parse_table(&table, &scheme).err().unwrap();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                path: "x".to_string(),
                expected: Kind::Number,
                actual: crate::ValueType::String,
            }
        );
    }

    #[test]
    fn test_missing_required_field() {
        let table = Table::new().with("sampleRate", 44100.0);
        let err = TableParser::parse_table(&table, &microphone_scheme()).err().unwrap();
        assert_eq!(err, BridgeError::MissingField { path: "filename".to_string() });
    }

    #[test]
    fn test_optional_absent_field() {
        let scheme = Scheme::builder().string("y").build().unwrap();
        let parsed = TableParser::parse_table(&Table::new(), &scheme).unwrap();

        assert_eq!(parsed.get_string("y"), Ok(None));
        assert!(!parsed.is_present("y"));
        assert_eq!(
            parsed.get_string_not_null("y"),
            Err(BridgeError::MissingField { path: "y".to_string() })
        );
        assert_eq!(parsed.get_string_or("y", "d"), Ok("d"));
    }

    #[test]
    fn test_dotted_paths_and_defaults() {
        let table = Table::new()
            .with("filename", "take.wav")
            .with("detector", Table::new().with("on", 0.2))
            .with("sampleRate", "22050");
        let parsed = TableParser::parse_table(&table, &microphone_scheme()).unwrap();

        assert_eq!(parsed.get_string_not_null("filename"), Ok("take.wav"));
        assert_eq!(parsed.get_double_or("detector.on", 0.0), Ok(0.2));
        assert_eq!(parsed.get_double_or("detector.off", 0.05), Ok(0.05));
        assert_eq!(parsed.get_integer_or("sampleRate", 44100), Ok(22050));
        assert_eq!(parsed.get_double_or("gain.min", 0.0), Ok(0.0));
        assert_eq!(parsed.get_boolean_or("gain.allowClipping", false), Ok(false));
    }

    #[test]
    fn test_nil_argument_is_empty_table() {
        let scheme = Scheme::builder().number("x").build().unwrap();
        let parsed = TableParser::parse(&Value::Nil, &scheme).unwrap();
        assert_eq!(parsed.get_double("x"), Ok(None));

        let err = TableParser::parse(&Value::Number(1.0), &scheme).err().unwrap();
        assert!(matches!(err, BridgeError::TypeMismatch { expected: Kind::Table, .. }));
    }

    #[test]
    fn test_integer_truncation_and_range() {
        let scheme = Scheme::builder().number("a").number("b").number("c").number("d").build().unwrap();
        let table = Table::new()
            .with("a", 2.9)
            .with("b", -2.9)
            .with("c", 3.0e9)
            .with("d", f64::NAN);
        let parsed = TableParser::parse_table(&table, &scheme).unwrap();

        assert_eq!(parsed.get_integer("a"), Ok(Some(2)));
        assert_eq!(parsed.get_integer("b"), Ok(Some(-2)));
        assert!(matches!(
            parsed.get_integer("c"),
            Err(BridgeError::NumericRange { target: "i32", .. })
        ));
        assert_eq!(parsed.get_long("c"), Ok(Some(3_000_000_000)));
        assert!(matches!(parsed.get_long("d"), Err(BridgeError::NumericRange { .. })));
    }

    #[test]
    fn test_long_upper_bound() {
        let scheme = Scheme::builder().number("big").build().unwrap();
        let table = Table::new().with("big", 9.3e18);
        let parsed = TableParser::parse_table(&table, &scheme).unwrap();
        assert!(matches!(
            parsed.get_long("big"),
            Err(BridgeError::NumericRange { target: "i64", .. })
        ));
    }

    #[test]
    fn test_accessor_kind_mismatch() {
        let scheme = Scheme::builder().any("value").build().unwrap();
        let table = Table::new().with("value", true);
        let parsed = TableParser::parse_table(&table, &scheme).unwrap();

        assert_eq!(parsed.get_boolean("value"), Ok(Some(true)));
        assert!(matches!(
            parsed.get_string("value"),
            Err(BridgeError::TypeMismatch { expected: Kind::String, .. })
        ));
    }

    #[test]
    fn test_listener_registers_tagged_reference() {
        let mut registry = CallbackRegistry::new();
        let table = Table::new()
            .with("filename", "a.wav")
            .with("listener", FunctionRef::native(|_| Ok(())));
        let parsed = TableParser::parse_table(&table, &microphone_scheme()).unwrap();

        let handle = parsed.get_listener("listener", &mut registry).unwrap().unwrap();
        assert_eq!(registry.tag(handle), Ok(Some("microphone")));
        assert_eq!(registry.len(), 1);

        let other = Scheme::builder().listener("onDone").build().unwrap();
        let parsed = TableParser::parse_table(&Table::new(), &other).unwrap();
        assert_eq!(parsed.get_listener("onDone", &mut registry), Ok(None));
        assert!(parsed.get_listener_not_null("onDone", &mut registry).is_err());
    }

    #[test]
    fn test_lightuserdata_requires_pointer() {
        let scheme = Scheme::builder().lightuserdata("baseDir").build().unwrap();
        let err = TableParser::parse_table(&Table::new().with("baseDir", "documents"), &scheme)
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::TypeMismatch { expected: Kind::LightUserdata, .. }));

        let anchor = 0u8;
        let pointer = OpaquePointer::from_ref(&anchor);
        let parsed =
            TableParser::parse_table(&Table::new().with("baseDir", pointer), &scheme).unwrap();
        assert_eq!(parsed.get_lightuserdata_not_null("baseDir"), Ok(pointer));
    }

    #[test]
    fn test_pushed_values_round_trip() {
        let registry = CallbackRegistry::new();
        let mut map = Hashtable::new();
        map.insert("s".to_string(), "text".into());
        map.insert("n".to_string(), (-12.75).into());
        map.insert("b".to_string(), true.into());
        map.insert("bytes".to_string(), vec![0u8, 1, 254].into());
        let pushed = Marshaller::new(&registry).push_hashtable(&map).unwrap();

        let scheme = Scheme::builder()
            .string("s")
            .number("n")
            .boolean("b")
            .byte_array("bytes")
            .build()
            .unwrap();
        let parsed = TableParser::parse(&pushed, &scheme).unwrap();

        assert_eq!(parsed.get_string_not_null("s"), Ok("text"));
        assert_eq!(parsed.get_double_not_null("n"), Ok(-12.75));
        assert_eq!(parsed.get_boolean("b"), Ok(Some(true)));
        assert_eq!(parsed.get_byte_array_not_null("bytes"), Ok(&[0u8, 1, 254][..]));
    }

    #[test]
    fn test_nested_table_parse() {
        let registry = CallbackRegistry::new();
        let mut inner = Hashtable::new();
        inner.insert("b".to_string(), 5.into());
        let mut outer = Hashtable::new();
        outer.insert("a".to_string(), NativeValue::Map(inner.clone()));
        let pushed = Marshaller::new(&registry).push_hashtable(&outer).unwrap();

        let scheme = Scheme::builder().table("a").build().unwrap();
        let parsed = TableParser::parse(&pushed, &scheme).unwrap();

        let nested_scheme = Scheme::builder().number("b").build().unwrap();
        let nested = parsed.nested("a", &nested_scheme).unwrap().unwrap();
        assert_eq!(nested.get_double("b"), Ok(Some(5.0)));
        assert_eq!(parsed.get_hashtable("a"), Ok(Some(inner)));
    }

    #[test]
    fn test_numeric_strings_only_on_numeric_paths() {
        let scheme = Scheme::builder().numeric("rate").string("label").any("raw").build().unwrap();
        let table = Table::new()
            .with("rate", " 48000 ")
            .with("label", "12")
            .with("raw", "3.5");
        let parsed = TableParser::parse_table(&table, &scheme).unwrap();

        assert_eq!(parsed.get_integer("rate"), Ok(Some(48000)));
        assert!(matches!(
            parsed.get_double("label"),
            Err(BridgeError::TypeMismatch { expected: Kind::Number, .. })
        ));
        assert!(matches!(
            parsed.get_double("raw"),
            Err(BridgeError::TypeMismatch { expected: Kind::Number, .. })
        ));
    }

    #[test]
    fn test_userdata_kind() {
        #[derive(Debug, PartialEq)]
        struct Recorder {
            channels: u8,
        }

        let scheme = Scheme::builder().userdata("device").build().unwrap();
        let data = UserData::new(Recorder { channels: 2 });
        let parsed =
            TableParser::parse_table(&Table::new().with("device", data.clone()), &scheme).unwrap();

        let read = parsed.get_userdata("device").unwrap().unwrap();
        assert_eq!(read, &data);
        assert_eq!(read.downcast_ref::<Recorder>(), Some(&Recorder { channels: 2 }));

        let anchor = 0u8;
        for wrong in [Value::from("device"), Value::from(OpaquePointer::from_ref(&anchor))] {
            let err = TableParser::parse_table(&Table::new().with("device", wrong), &scheme)
                .err()
                .unwrap();
            assert!(matches!(err, BridgeError::TypeMismatch { expected: Kind::UserData, .. }));
        }
    }

    #[test]
    fn test_callable_kinds_reject_plain_values() {
        let scheme = Scheme::builder().listener("listener").build().unwrap();
        let err = TableParser::parse_table(&Table::new().with("listener", "x"), &scheme)
            .err()
            .unwrap();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                path: "listener".to_string(),
                expected: Kind::Listener,
                actual: crate::ValueType::String,
            }
        );

        let scheme = Scheme::builder().function("onError").build().unwrap();
        let err = TableParser::parse_table(&Table::new().with("onError", Table::new()), &scheme)
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::TypeMismatch { expected: Kind::Function, .. }));
    }

    #[test]
    fn test_undeclared_path_reads_absent() {
        let parsed = TableParser::parse_table(&Table::new().with("x", 1.0), &Scheme::new()).unwrap();
        assert_eq!(parsed.get_any("x"), None);
        assert_eq!(parsed.get_double_or("x", 7.0), Ok(7.0));
    }
}
