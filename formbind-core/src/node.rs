//! UI tree node model
//!
//! A tree is made of [`Node`]s: a type identifier, a property map and an
//! ordered list of children. Children are nested nodes, nested sequences
//! (flattened by traversal) or raw values such as text.
//!
//! Trees are immutable from the engine's point of view. Transforms build new
//! trees through [`Node::clone_with`]; nothing here mutates a node in place.
//!
//! ## JSON shape
//! ```text
//! {"type": "input", "props": {"name": "email"}, "children": ["text", [..], {..}]}
//! ```
//! Objects carrying a `type` key become elements, arrays become nested lists,
//! anything else is a raw value.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Written in place of a handler when a tree is serialized
pub const HANDLER_MARKER: &str = "[handler]";

/// Property keys with meaning to the form engine
pub mod keys {
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const IGNORE: &str = "ignore";
    pub const FIELD_NAME: &str = "fieldName";
    pub const SP_IF: &str = "spIf";
    pub const SP_BIND: &str = "spBind";
    pub const TYPE: &str = "type";
    pub const DEFAULT_VALUE: &str = "defaultValue";
    pub const ON_CHANGE: &str = "onChange";
    pub const DISABLED: &str = "disabled";
}

/// JavaScript-style truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Convert a property value into a lookup key (names, field names)
///
/// Strings are used as-is, numbers and booleans by their text form.
/// `null`, arrays, objects and handlers have no key.
fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// EVENTS AND HANDLERS
// =============================================================================

/// The element a change event originated from
#[derive(Debug, Clone, PartialEq)]
pub struct EventTarget {
    pub value: Value,
}

/// Change event delivered to `onChange` handlers
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub target: EventTarget,
}

impl ChangeEvent {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            target: EventTarget { value: value.into() },
        }
    }
}

type Callback = dyn Fn(&ChangeEvent, &[Value]);

/// A change handler stored as a node property
///
/// Handlers are opaque: two handlers are equal only when they share the same
/// callback. Each handler also carries a slot where it records the disabled
/// flag to apply on the next render.
#[derive(Clone)]
pub struct ChangeHandler {
    callback: Rc<Callback>,
    disabled: Rc<Cell<Option<bool>>>,
    field: Option<Rc<str>>,
}

impl ChangeHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ChangeEvent, &[Value]) + 'static,
    {
        Self::with_disabled_slot(callback, Rc::new(Cell::new(None)))
    }

    /// Create a handler whose callback writes into `slot`
    pub(crate) fn with_disabled_slot<F>(callback: F, slot: Rc<Cell<Option<bool>>>) -> Self
    where
        F: Fn(&ChangeEvent, &[Value]) + 'static,
    {
        Self {
            callback: Rc::new(callback),
            disabled: slot,
            field: None,
        }
    }

    /// Tag the handler with the form field it writes to
    pub(crate) fn bound_to(mut self, field: &str) -> Self {
        self.field = Some(Rc::from(field));
        self
    }

    /// Form field this handler writes to, when injected by the form binder
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Invoke the handler with an event and any extra arguments
    pub fn call(&self, event: &ChangeEvent, args: &[Value]) {
        (self.callback)(event, args)
    }

    /// Disabled flag recorded by the last invocation, if any
    pub fn recorded_disabled(&self) -> Option<bool> {
        self.disabled.get()
    }
}

impl PartialEq for ChangeHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandler")
            .field("callback", &"<fn>")
            .field("field", &self.field)
            .field("recorded_disabled", &self.disabled.get())
            .finish()
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

/// A single property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Data(Value),
    Handler(ChangeHandler),
}

impl PropValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            PropValue::Data(v) => Some(v),
            PropValue::Handler(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Value::as_str)
    }

    pub fn as_handler(&self) -> Option<&ChangeHandler> {
        match self {
            PropValue::Handler(h) => Some(h),
            PropValue::Data(_) => None,
        }
    }

    /// Handlers are always truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Data(v) => is_truthy(v),
            PropValue::Handler(_) => true,
        }
    }

    fn structurally_eq(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Data(a), PropValue::Data(b)) => a == b,
            (PropValue::Handler(_), PropValue::Handler(_)) => true,
            _ => false,
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        PropValue::Data(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Data(Value::String(value.to_string()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Data(Value::String(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Data(Value::Bool(value))
    }
}

impl From<ChangeHandler> for PropValue {
    fn from(handler: ChangeHandler) -> Self {
        PropValue::Handler(handler)
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Data(v) => v.serialize(serializer),
            PropValue::Handler(_) => serializer.serialize_str(HANDLER_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PropValue::Data)
    }
}

/// Ordered property map of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the property is present and truthy
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).map_or(false, PropValue::is_truthy)
    }

    /// Property value as a lookup key (see `name`)
    pub fn key_of(&self, key: &str) -> Option<String> {
        self.get(key).and_then(PropValue::as_data).and_then(value_key)
    }

    /// The `name` attribute as an index key
    pub fn name(&self) -> Option<String> {
        self.key_of(keys::NAME)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every entry of `other` over this map
    pub fn extend(&mut self, other: &Props) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Shallow merge: entries of `overrides` win over `base`
    pub fn merged(base: &Props, overrides: &Props) -> Props {
        let mut merged = base.clone();
        merged.extend(overrides);
        merged
    }

    fn structurally_eq(&self, other: &Props) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.structurally_eq(vb))
    }
}

impl FromIterator<(String, PropValue)> for Props {
    fn from_iter<I: IntoIterator<Item = (String, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// NODES AND CHILDREN
// =============================================================================

/// An element of the UI tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node type identifier (e.g. "input", "form")
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    #[serde(
        default,
        deserialize_with = "deserialize_children",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Child>,
}

/// One entry of a node's children
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Element(Node),
    /// Nested sequence, flattened during traversal
    List(Vec<Child>),
    /// Text, numbers, `null` for an absent entry
    Raw(Value),
}

/// Borrowed view of a flattened child
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildRef<'a> {
    Element(&'a Node),
    Raw(&'a Value),
}

impl<'a> ChildRef<'a> {
    pub fn as_element(self) -> Option<&'a Node> {
        match self {
            ChildRef::Element(node) => Some(node),
            ChildRef::Raw(_) => None,
        }
    }

    /// Property map, present only for structured nodes
    pub fn props(self) -> Option<&'a Props> {
        self.as_element().map(|node| &node.props)
    }
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Child>) -> Self {
        self.children = children;
        self
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get_str(key)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Clone this node with `extra` merged over its properties and,
    /// when given, `children` substituted for its own
    pub fn clone_with(&self, extra: &Props, children: Option<Vec<Child>>) -> Node {
        Node {
            kind: self.kind.clone(),
            props: Props::merged(&self.props, extra),
            children: children.unwrap_or_else(|| self.children.clone()),
        }
    }

    /// Deep comparison that treats any two handlers as equal
    pub fn structurally_eq(&self, other: &Node) -> bool {
        self.kind == other.kind
            && self.props.structurally_eq(&other.props)
            && children_structurally_eq(&self.children, &other.children)
    }
}

fn children_structurally_eq(a: &[Child], b: &[Child]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Child::Element(x), Child::Element(y)) => x.structurally_eq(y),
            (Child::List(x), Child::List(y)) => children_structurally_eq(x, y),
            (Child::Raw(x), Child::Raw(y)) => x == y,
            _ => false,
        })
}

impl Child {
    pub fn text(text: impl Into<String>) -> Self {
        Child::Raw(Value::String(text.into()))
    }

    pub fn as_element(&self) -> Option<&Node> {
        match self {
            Child::Element(node) => Some(node),
            _ => None,
        }
    }
}

impl Child {
    /// Objects carrying a `type` key must be valid nodes; arrays nest
    fn from_json(value: Value) -> Result<Child, serde_json::Error> {
        match value {
            Value::Object(map) if map.contains_key(keys::TYPE) => {
                let kind = map.get(keys::TYPE).map(Value::to_string).unwrap_or_default();
                serde_json::from_value(Value::Object(map))
                    .map(Child::Element)
                    .map_err(|e| de::Error::custom(format!("invalid element {}: {}", kind, e)))
            }
            Value::Array(items) => items
                .into_iter()
                .map(Child::from_json)
                .collect::<Result<_, _>>()
                .map(Child::List),
            other => Ok(Child::Raw(other)),
        }
    }
}

impl<'de> Deserialize<'de> for Child {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Child::from_json(Value::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

/// `children` as written in JSON; a single entry counts as a one-entry list
fn deserialize_children<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Child>, D::Error> {
    let children = match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(Child::from_json).collect(),
        single => Child::from_json(single).map(|child| vec![child]),
    };
    children.map_err(de::Error::custom)
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Element(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::text(text)
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::text(text)
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Raw(value)
    }
}

impl From<Vec<Child>> for Child {
    fn from(items: Vec<Child>) -> Self {
        Child::List(items)
    }
}

/// Make sure a renderable root element exists
///
/// Elements are returned as-is; raw values and lists are wrapped in a `span`.
pub fn enforce_root(child: Child) -> Node {
    match child {
        Child::Element(node) => node,
        other => Node::new("span").with_child(other),
    }
}
