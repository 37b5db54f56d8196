//! Output formatting for bound trees
//!
//! Supports multiple output formats:
//! - json: the bound tree as JSON (handlers as markers)
//! - markup: indented markup, optionally colored
//! - state: the form state after binding

pub mod markup;

use strum_macros::{Display, EnumIter, EnumString};

use crate::form::FormState;
use crate::node::Node;

pub use markup::{render_markup, RenderOptions};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// Bound tree as JSON
    Json,
    /// Bound tree as markup
    Markup,
    /// Form state after binding
    State,
}

/// Render a tree as JSON
pub fn render_json(node: &Node, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(node)
    } else {
        serde_json::to_string(node)
    }
}

/// Render form state as JSON
pub fn render_state(state: &FormState, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(state)
    } else {
        serde_json::to_string(state)
    }
}
