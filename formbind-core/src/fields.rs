//! Field discovery and indexing
//!
//! Builds the two indices the form binder needs, in two passes:
//! 1. Walk the tree and let a discovery callback register field nodes
//!    (forward map: field name → node + explicit default)
//! 2. Derive default values and the inverse index
//!    (node type → name attribute → field name)
//!
//! The inverse index lets the rebuild pass recognize a field from its
//! (type, name) pair alone, without running discovery again. The indexer is
//! policy-agnostic: the callback alone decides what counts as a field.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::BindError;
use crate::node::{is_truthy, keys, Node};
use crate::visit::visit_all;

/// A registered field
#[derive(Debug, Clone)]
pub struct FieldEntry<'a> {
    pub node: &'a Node,
    /// Explicit default given at registration
    pub default_value: Option<Value>,
}

/// Field name → entry, in registration order
#[derive(Debug, Default)]
pub struct FieldMap<'a> {
    entries: Vec<(String, FieldEntry<'a>)>,
    positions: HashMap<String, usize>,
}

impl<'a> FieldMap<'a> {
    pub fn get(&self, name: &str) -> Option<&FieldEntry<'a>> {
        self.positions.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldEntry<'a>)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handed to the discovery callback to register fields
#[derive(Debug, Default)]
pub struct Registrar<'a> {
    fields: FieldMap<'a>,
}

impl<'a> Registrar<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` under `name`
    ///
    /// Ignored when the node has a truthy `ignore` property. A `fieldName`
    /// property overrides `name`. The first registration of a name wins.
    pub fn register(&mut self, field: &'a Node, name: &str, default_value: Option<Value>) {
        if field.props.is_truthy(keys::IGNORE) {
            tracing::trace!(kind = %field.kind, name, "field marked ignore");
            return;
        }

        let effective = field
            .props
            .key_of(keys::FIELD_NAME)
            .unwrap_or_else(|| name.to_string());

        if self.fields.positions.contains_key(&effective) {
            tracing::debug!(field = %effective, kind = %field.kind, "duplicate field registration ignored");
            return;
        }

        self.fields.positions.insert(effective.clone(), self.fields.entries.len());
        self.fields.entries.push((
            effective,
            FieldEntry {
                node: field,
                default_value,
            },
        ));
    }

    pub fn fields(&self) -> &FieldMap<'a> {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap<'a> {
        self.fields
    }
}

/// Inverse index entry: which field a (type, name) pair belongs to
#[derive(Debug, Clone)]
pub struct IndexedField<'a> {
    pub field_name: String,
    pub node: &'a Node,
}

/// Default values and inverse index for one tree
#[derive(Debug, Default)]
pub struct FieldIndex<'a> {
    defaults: Map<String, Value>,
    inverse: HashMap<String, HashMap<Option<String>, IndexedField<'a>>>,
}

impl<'a> FieldIndex<'a> {
    /// Walk `root` (itself included) and index every field `discover` registers
    ///
    /// `discover` runs once per element; raw values are skipped. Its errors
    /// abort indexing unchanged.
    pub fn build<F>(root: &'a Node, mut discover: F) -> Result<Self, BindError>
    where
        F: FnMut(&'a Node, &mut Registrar<'a>) -> anyhow::Result<()>,
    {
        let mut registrar = Registrar::new();

        visit_all(root, |child, _parent| {
            if let Some(node) = child.as_element() {
                discover(node, &mut registrar)?;
            }
            Ok::<(), BindError>(())
        })?;

        Ok(Self::from_fields(&registrar.into_fields()))
    }

    /// Derive defaults and the inverse index from a field map
    pub fn from_fields(fields: &FieldMap<'a>) -> Self {
        let mut index = Self::default();

        for (name, entry) in fields.iter() {
            index.defaults.insert(name.to_string(), resolve_default(entry));
            index
                .inverse
                .entry(entry.node.kind.clone())
                .or_default()
                .insert(
                    entry.node.props.name(),
                    IndexedField {
                        field_name: name.to_string(),
                        node: entry.node,
                    },
                );
        }

        index
    }

    /// Default value per field name, in registration order
    pub fn default_values(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Field registered for a node of type `kind` with name attribute `name`
    pub fn lookup(&self, kind: &str, name: Option<&str>) -> Option<&IndexedField<'a>> {
        self.inverse
            .get(kind)?
            .get(&name.map(str::to_string))
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

/// Explicit default, else a truthy `value` property, else ""
fn resolve_default(entry: &FieldEntry<'_>) -> Value {
    if let Some(default) = &entry.default_value {
        return default.clone();
    }
    entry
        .node
        .prop(keys::VALUE)
        .and_then(|v| v.as_data())
        .filter(|v| is_truthy(v))
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Child;
    use serde_json::json;

    fn register_inputs<'a>(node: &'a Node, fields: &mut Registrar<'a>) -> anyhow::Result<()> {
        if node.kind == "input" {
            if let Some(name) = node.prop_str("name") {
                fields.register(node, name, None);
            }
        }
        Ok(())
    }

    #[test]
    fn test_default_value_fallbacks() {
        let tree = Node::new("div")
            .with_child(Node::new("input").with_prop("name", "plain"))
            .with_child(Node::new("input").with_prop("name", "valued").with_prop("value", "x"))
            .with_child(Node::new("input").with_prop("name", "zero").with_prop("value", json!(0)))
            .with_child(Node::new("input").with_prop("name", "explicit").with_prop("value", "ignored"));

        let index = FieldIndex::build(&tree, |node, fields| {
            if node.prop_str("name") == Some("explicit") {
                fields.register(node, "explicit", Some(json!(["a", "b"])));
                return Ok(());
            }
            register_inputs(node, fields)
        })
        .unwrap();

        let defaults = index.default_values();
        assert_eq!(defaults["plain"], json!(""));
        assert_eq!(defaults["valued"], json!("x"));
        assert_eq!(defaults["zero"], json!(""));
        assert_eq!(defaults["explicit"], json!(["a", "b"]));
        let order: Vec<&String> = defaults.keys().collect();
        assert_eq!(order, vec!["plain", "valued", "zero", "explicit"]);
    }

    #[test]
    fn test_ignore_and_field_name_override() {
        let tree = Node::new("div")
            .with_child(Node::new("input").with_prop("name", "skip").with_prop("ignore", true))
            .with_child(
                Node::new("input")
                    .with_prop("name", "e")
                    .with_prop("fieldName", "email"),
            );

        let index = FieldIndex::build(&tree, register_inputs).unwrap();

        assert!(index.default_values().get("skip").is_none());
        assert!(index.default_values().get("e").is_none());
        let entry = index.lookup("input", Some("e")).unwrap();
        assert_eq!(entry.field_name, "email");
        assert!(index.lookup("input", Some("skip")).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_first_registration_wins() {
        let tree = Node::new("div")
            .with_child(Node::new("input").with_prop("name", "dup").with_prop("value", "first"))
            .with_child(Node::new("select").with_prop("name", "dup").with_prop("value", "second"));

        let index = FieldIndex::build(&tree, |node, fields| {
            if let Some(name) = node.prop_str("name") {
                fields.register(node, name, None);
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(index.default_values()["dup"], json!("first"));
        assert_eq!(index.lookup("input", Some("dup")).unwrap().node.kind, "input");
        assert!(index.lookup("select", Some("dup")).is_none());
    }

    #[test]
    fn test_root_and_nested_nodes_are_discovered() {
        let tree = Node::new("input").with_prop("name", "root").with_child(Child::List(vec![
            Node::new("span").with_child(Node::new("input").with_prop("name", "deep")).into(),
        ]));

        let index = FieldIndex::build(&tree, register_inputs).unwrap();
        assert!(index.lookup("input", Some("root")).is_some());
        assert!(index.lookup("input", Some("deep")).is_some());
    }

    #[test]
    fn test_nameless_fields_index_under_no_name() {
        let tree = Node::new("div").with_child(Node::new("textarea"));

        let index = FieldIndex::build(&tree, |node, fields| {
            if node.kind == "textarea" {
                fields.register(node, "notes", None);
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(index.lookup("textarea", None).unwrap().field_name, "notes");
        assert!(index.lookup("textarea", Some("notes")).is_none());
    }

    #[test]
    fn test_discovery_error_propagates() {
        let tree = Node::new("div").with_child(Node::new("input").with_prop("name", "x"));

        let err = FieldIndex::build(&tree, |node, _| {
            if node.kind == "input" {
                anyhow::bail!("cannot classify <{}>", node.kind);
            }
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, BindError::Policy(_)));
        assert_eq!(err.to_string(), "cannot classify <input>");
    }
}
