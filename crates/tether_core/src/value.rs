//! Dynamic values as the script engine sees them
//!
//! Every value that crosses into or out of the engine is one of the
//! variants of [`Value`]. Kind checks in the parser and the marshaller are
//! plain matches over this enum.

use crate::pointer::OpaquePointer;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Runtime type of a dynamic value, used in error reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Boolean,
    Number,
    String,
    ByteArray,
    Table,
    Function,
    LightUserdata,
    UserData,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::ByteArray => "byte array",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::LightUserdata => "lightuserdata",
            ValueType::UserData => "userdata",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A script value on the engine thread.
///
/// Not `Send`: functions and userdata point into engine-owned state.
/// Values that have to cross threads travel as [`crate::NativeValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    ByteArray(Vec<u8>),
    Table(Table),
    Function(FunctionRef),
    LightUserdata(OpaquePointer),
    UserData(UserData),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::ByteArray(_) => ValueType::ByteArray,
            Value::Table(_) => ValueType::Table,
            Value::Function(_) => ValueType::Function,
            Value::LightUserdata(_) => ValueType::LightUserdata,
            Value::UserData(_) => ValueType::UserData,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Numbers, plus strings that read as numbers.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::ByteArray(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(value)
    }
}

impl From<FunctionRef> for Value {
    fn from(value: FunctionRef) -> Self {
        Value::Function(value)
    }
}

impl From<UserData> for Value {
    fn from(data: UserData) -> Self {
        Value::UserData(data)
    }
}

impl From<OpaquePointer> for Value {
    fn from(value: OpaquePointer) -> Self {
        Value::LightUserdata(value)
    }
}

/// Script table with string keys, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    entries: Vec<(String, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Assigning nil removes the key, as a script assignment would.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let position = self.entries.iter().position(|(k, _)| *k == key);
        match (position, value) {
            (Some(i), Value::Nil) => {
                self.entries.remove(i);
            }
            (Some(i), value) => self.entries[i].1 = value,
            (None, Value::Nil) => {}
            (None, value) => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(i).1)
    }

    /// Follow a dotted path (`"gain.min"`) through nested tables.
    ///
    /// Returns `None` as soon as a segment is missing or an intermediate
    /// value is not a table.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

/// A Rust closure exposed as a script callable.
pub struct NativeFunction(Box<dyn Fn(&Value) -> std::result::Result<(), String>>);

/// Engine-neutral reference to something invocable.
///
/// The engine layer decides what lives inside (a persisted script
/// function, or a [`NativeFunction`]) and downcasts it back when the
/// callable has to run. Equality is identity.
#[derive(Clone)]
pub struct FunctionRef(Rc<dyn Any>);

impl FunctionRef {
    pub fn new<T: Any>(inner: T) -> Self {
        Self(Rc::new(inner))
    }

    pub fn native<F>(function: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + 'static,
    {
        Self::new(NativeFunction(Box::new(function)))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Run the closure if this wraps a [`NativeFunction`].
    pub fn call_native(&self, argument: &Value) -> Option<std::result::Result<(), String>> {
        self.downcast_ref::<NativeFunction>()
            .map(|function| (function.0)(argument))
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Host-defined boxed object handed to scripts as full userdata.
#[derive(Clone)]
pub struct UserData {
    type_name: &'static str,
    inner: Rc<dyn Any>,
}

impl UserData {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for UserData {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.inner) as *const (),
            Rc::as_ptr(&other.inner) as *const (),
        )
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserData<{}>", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_set_replaces_and_nil_removes() {
        let mut table = Table::new().with("a", 1.0).with("b", "x");
        table.set("a", 2.0);
        assert_eq!(table.get("a"), Some(&Value::Number(2.0)));
        assert_eq!(table.len(), 2);

        table.set("b", Value::Nil);
        assert_eq!(table.get("b"), None);

        let keys: Vec<_> = table.with("c", true).iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_resolve_dotted_path() {
        let gain = Table::new().with("min", 0.5);
        let table = Table::new().with("gain", gain).with("flat", 3.0);

        assert_eq!(table.resolve("gain.min"), Some(&Value::Number(0.5)));
        assert_eq!(table.resolve("gain.max"), None);
        // Intermediate value is not a table
        assert_eq!(table.resolve("flat.x"), None);
    }

    #[test]
    fn test_function_identity() {
        let f = FunctionRef::native(|_| Ok(()));
        let g = FunctionRef::native(|_| Ok(()));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
        assert_eq!(f.call_native(&Value::Nil), Some(Ok(())));
        assert!(FunctionRef::new(5u8).call_native(&Value::Nil).is_none());
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(Value::from(" 42.5 ").to_number(), Some(42.5));
        assert_eq!(Value::from("abc").to_number(), None);
        assert_eq!(Value::Boolean(true).to_number(), None);
    }

    #[test]
    fn test_userdata_downcast() {
        let data = UserData::new(vec![1u8, 2]);
        assert_eq!(data.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2]));
        assert!(data.downcast_ref::<String>().is_none());
        assert!(data.type_name().contains("Vec"));
    }
}
