//! Schemes: declared shape of a table argument
//!
//! A scheme maps dotted paths (`"gain.min"`) to the kind of value expected
//! there. Declaration conflicts are caught while the scheme is built, so a
//! parse never has to guess which of two declarations was meant.

use crate::error::{BridgeError, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Expected kind of a value at a scheme path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Any,
    String,
    Number,
    Boolean,
    Table,
    Function,
    /// A function that will be registered as an event listener.
    Listener,
    LightUserdata,
    UserData,
    /// A number, or a string that reads as one.
    Numeric,
    /// A byte buffer. Script strings count, they are byte strings.
    ByteArray,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Any => "any",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Table => "table",
            Kind::Function => "function",
            Kind::Listener => "listener",
            Kind::LightUserdata => "lightuserdata",
            Kind::UserData => "userdata",
            Kind::Numeric => "numeric",
            Kind::ByteArray => "byte array",
        }
    }

    /// Does a non-nil value satisfy this kind?
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Kind::Any, _) => true,
            (Kind::String, Value::String(_)) => true,
            (Kind::Number, Value::Number(_)) => true,
            (Kind::Boolean, Value::Boolean(_)) => true,
            (Kind::Table, Value::Table(_)) => true,
            (Kind::Function | Kind::Listener, Value::Function(_)) => true,
            (Kind::LightUserdata, Value::LightUserdata(_)) => true,
            (Kind::UserData, Value::UserData(_)) => true,
            (Kind::Numeric, value) => value.to_number().is_some(),
            (Kind::ByteArray, Value::ByteArray(_) | Value::String(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One declared path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    path: String,
    kind: Kind,
    required: bool,
    event_name: Option<String>,
}

impl SchemaNode {
    pub fn new(path: impl Into<String>, kind: Kind, required: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            required,
            event_name: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Name given to events dispatched to a listener declared here.
    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }
}

/// Ordered set of schema nodes, at most one per path.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    nodes: Vec<SchemaNode>,
    index: HashMap<String, usize>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::new()
    }

    /// Declare `path` as `kind`.
    ///
    /// Re-declaring a path with the same kind is a no-op (a node becomes
    /// required if either declaration requires it). Re-declaring it with a
    /// different kind is a [`BridgeError::SchemaConflict`].
    pub fn declare(&mut self, path: &str, kind: Kind, required: bool) -> Result<()> {
        self.insert(SchemaNode::new(path, kind, required))
    }

    /// Declare a listener whose events are named `event_name`.
    pub fn declare_listener(
        &mut self,
        path: &str,
        event_name: Option<&str>,
        required: bool,
    ) -> Result<()> {
        let mut node = SchemaNode::new(path, Kind::Listener, required);
        node.event_name = event_name.map(str::to_string);
        self.insert(node)
    }

    fn insert(&mut self, node: SchemaNode) -> Result<()> {
        if let Some(&i) = self.index.get(&node.path) {
            let existing = &mut self.nodes[i];
            if existing.kind != node.kind {
                return Err(BridgeError::SchemaConflict {
                    path: node.path,
                    existing: existing.kind,
                    requested: node.kind,
                });
            }
            existing.required |= node.required;
            if existing.event_name.is_none() {
                existing.event_name = node.event_name;
            }
            return Ok(());
        }

        self.index.insert(node.path.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Declared kind of `path`, `None` if undeclared.
    pub fn get(&self, path: &str) -> Option<Kind> {
        self.node(path).map(SchemaNode::kind)
    }

    pub fn node(&self, path: &str) -> Option<&SchemaNode> {
        self.index.get(path).map(|&i| &self.nodes[i])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Chained scheme construction.
///
/// The shorthand methods declare optional paths; use
/// [`SchemeBuilder::required`] for paths that must be present. The first
/// conflict is kept and reported by [`SchemeBuilder::build`].
///
/// ```ignore
/// let scheme = Scheme::builder()
///     .required("filename", Kind::String)
///     .lightuserdata("baseDir")
///     .table("gain")
///     .number("gain.min")
///     .listener("listener")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct SchemeBuilder {
    scheme: Scheme,
    conflict: Option<BridgeError>,
}

impl SchemeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(mut self, outcome: Result<()>) -> Self {
        if let Err(err) = outcome {
            self.conflict.get_or_insert(err);
        }
        self
    }

    pub fn field(mut self, path: &str, kind: Kind, required: bool) -> Self {
        let outcome = self.scheme.declare(path, kind, required);
        self.record(outcome)
    }

    pub fn required(self, path: &str, kind: Kind) -> Self {
        self.field(path, kind, true)
    }

    pub fn any(self, path: &str) -> Self {
        self.field(path, Kind::Any, false)
    }

    pub fn string(self, path: &str) -> Self {
        self.field(path, Kind::String, false)
    }

    pub fn number(self, path: &str) -> Self {
        self.field(path, Kind::Number, false)
    }

    pub fn boolean(self, path: &str) -> Self {
        self.field(path, Kind::Boolean, false)
    }

    pub fn table(self, path: &str) -> Self {
        self.field(path, Kind::Table, false)
    }

    pub fn function(self, path: &str) -> Self {
        self.field(path, Kind::Function, false)
    }

    pub fn listener(self, path: &str) -> Self {
        self.field(path, Kind::Listener, false)
    }

    pub fn listener_named(mut self, path: &str, event_name: &str) -> Self {
        let outcome = self.scheme.declare_listener(path, Some(event_name), false);
        self.record(outcome)
    }

    pub fn lightuserdata(self, path: &str) -> Self {
        self.field(path, Kind::LightUserdata, false)
    }

    pub fn userdata(self, path: &str) -> Self {
        self.field(path, Kind::UserData, false)
    }

    pub fn numeric(self, path: &str) -> Self {
        self.field(path, Kind::Numeric, false)
    }

    pub fn byte_array(self, path: &str) -> Self {
        self.field(path, Kind::ByteArray, false)
    }

    pub fn build(self) -> Result<Scheme> {
        match self.conflict {
            Some(err) => {
                tracing::error!("invalid scheme: {err}");
                Err(err)
            }
            None => Ok(self.scheme),
        }
    }
}
