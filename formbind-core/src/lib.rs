//! formbind-core: data-bound forms over declarative UI trees
//!
//! This library provides:
//! - An immutable UI tree model with JSON (de)serialization
//! - Pre-order traversal and structure-preserving rebuilds
//! - Field discovery with forward and inverse indices
//! - Form binding: state seeding, visibility and binding directives,
//!   change-handler wiring and submit disabling
//! - A declarative host policy loaded from TOML, YAML or JSON
//! - JSON and markup output

pub mod node;
pub mod visit;
pub mod rebuild;
pub mod fields;
pub mod policy;
pub mod form;
pub mod config;
pub mod output;
pub mod error;

pub use node::{
    enforce_root, is_truthy, keys, ChangeEvent, ChangeHandler, Child, ChildRef, EventTarget, Node,
    PropValue, Props, HANDLER_MARKER,
};
pub use visit::{count_elements, find_element, flatten, visit_all, visit_children};
pub use rebuild::{rebuild, rebuild_with, Identity, NodeAction, RebuildRules};
pub use fields::{FieldEntry, FieldIndex, FieldMap, IndexedField, Registrar};
pub use policy::FormPolicy;
pub use form::{apply_recorded_disabled, bind_form, dispatch_change, is_submit_control, FormBinder, FormState, SharedFormState, CONTAINER_KIND};
pub use config::{ConfigFormat, ConfiguredPolicy, FieldRules, PolicyConfig};
pub use output::{render_json, render_markup, render_state, OutputFormat, RenderOptions};
pub use error::{BindError, ConfigError};
