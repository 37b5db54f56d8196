//! Declarative host policy loaded from a file
//!
//! ```toml
//! [fields]
//! kinds = "^(input|textarea|select)$"
//! name_prop = "name"
//!
//! [fields.defaults]
//! country = "NL"
//!
//! [visibility]
//! admin = false
//!
//! [bindings.greeting]
//! type = "p"
//! children = ["Hello"]
//! ```
//!
//! The same structure is accepted as YAML or JSON; the format follows the
//! file extension.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::fields::Registrar;
use crate::node::{enforce_root, keys, Child, Node};
use crate::policy::FormPolicy;
use crate::visit::find_element;

pub const DEFAULT_FIELD_KINDS: &str = "^(input|textarea|select)$";

static DEFAULT_KIND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_FIELD_KINDS).expect("default field kind pattern is valid"));

/// Policy file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

/// Which nodes count as fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldRules {
    /// Regex matched against the node type
    pub kinds: String,
    /// Property holding the field name
    pub name_prop: String,
    /// Explicit default per field name
    pub defaults: BTreeMap<String, Value>,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_FIELD_KINDS.to_string(),
            name_prop: keys::NAME.to_string(),
            defaults: BTreeMap::new(),
        }
    }
}

/// Raw policy file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub fields: FieldRules,
    /// `spIf` key → visible; missing keys are unknown
    pub visibility: BTreeMap<String, bool>,
    /// `spBind` key → replacement node (raw values are wrapped in a span)
    pub bindings: BTreeMap<String, Value>,
}

impl PolicyConfig {
    /// Load a policy file, picking the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnknownFormat {
            path: path.to_path_buf(),
        })?;
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, format)?;
        tracing::debug!(
            path = %path.display(),
            visibility = config.visibility.len(),
            bindings = config.bindings.len(),
            "loaded policy"
        );
        Ok(config)
    }

    /// Parse policy text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        Ok(match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        })
    }

    /// Validate the config and turn it into a usable policy
    pub fn into_policy(self) -> Result<ConfiguredPolicy, ConfigError> {
        let kinds = Regex::new(&self.fields.kinds).map_err(|source| ConfigError::KindPattern {
            pattern: self.fields.kinds.clone(),
            source,
        })?;

        for (key, value) in &self.bindings {
            binding_node(value).map_err(|source| ConfigError::Binding {
                key: key.clone(),
                source,
            })?;
        }

        Ok(ConfiguredPolicy {
            kinds,
            name_prop: self.fields.name_prop,
            defaults: self.fields.defaults,
            visibility: self.visibility,
            bindings: self.bindings,
        })
    }
}

/// A [`FormPolicy`] driven by a [`PolicyConfig`]
///
/// Holds only plain data, so one instance can be shared across threads while
/// each bind builds its own nodes.
#[derive(Debug, Clone)]
pub struct ConfiguredPolicy {
    kinds: Regex,
    name_prop: String,
    defaults: BTreeMap<String, Value>,
    visibility: BTreeMap<String, bool>,
    bindings: BTreeMap<String, Value>,
}

impl Default for ConfiguredPolicy {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_KIND_PATTERN.clone(),
            name_prop: keys::NAME.to_string(),
            defaults: BTreeMap::new(),
            visibility: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }
}

impl ConfiguredPolicy {
    pub fn with_visibility(mut self, key: impl Into<String>, visible: bool) -> Self {
        self.visibility.insert(key.into(), visible);
        self
    }

    /// Bind `key` to a copy of `node`
    ///
    /// Bindings are stored as plain data, so a node carrying a handler
    /// anywhere in its subtree is rejected.
    pub fn with_binding(mut self, key: impl Into<String>, node: &Node) -> Result<Self, ConfigError> {
        let key = key.into();
        if let Some(holder) = find_element(node, |n| n.props.iter().any(|(_, v)| v.as_handler().is_some())) {
            return Err(ConfigError::BindingHandler {
                key,
                kind: holder.kind.clone(),
            });
        }
        let value = serde_json::to_value(node).map_err(|source| ConfigError::Binding {
            key: key.clone(),
            source,
        })?;
        self.bindings.insert(key, value);
        Ok(self)
    }

    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    pub fn is_field_kind(&self, kind: &str) -> bool {
        self.kinds.is_match(kind)
    }
}

impl FormPolicy for ConfiguredPolicy {
    fn discover<'a>(&self, node: &'a Node, fields: &mut Registrar<'a>) -> anyhow::Result<()> {
        if !self.is_field_kind(&node.kind) {
            return Ok(());
        }
        if let Some(name) = node.props.key_of(&self.name_prop) {
            let default = self.defaults.get(&name).cloned();
            fields.register(node, &name, default);
        }
        Ok(())
    }

    fn resolve_visibility(&self, key: &str, _node: &Node) -> anyhow::Result<Option<bool>> {
        Ok(self.visibility.get(key).copied())
    }

    fn resolve_binding(&self, key: &str, _node: &Node) -> anyhow::Result<Option<Node>> {
        match self.bindings.get(key) {
            Some(value) => binding_node(value)
                .map(Some)
                .map_err(|e| anyhow::anyhow!("binding `{}`: {}", key, e)),
            None => Ok(None),
        }
    }
}

/// Objects must be well-formed nodes; other values become text in a span
fn binding_node(value: &Value) -> Result<Node, serde_json::Error> {
    if value.is_object() {
        return serde_json::from_value(value.clone());
    }
    serde_json::from_value::<Child>(value.clone()).map(enforce_root)
}
