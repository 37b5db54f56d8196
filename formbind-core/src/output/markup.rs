//! Markup renderer with color support
//!
//! Renders a UI tree as indented markup, optionally with ANSI colors.
//! Data properties become attributes; handlers are shown by name only.

use quick_xml::escape::escape;
use serde_json::Value;

use crate::node::{ChildRef, Node, PropValue};
use crate::visit::{count_elements, flatten};

/// ANSI color codes
pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BLUE: &str = "\x1b[34m";   // element names
    pub const CYAN: &str = "\x1b[36m";   // attribute names
    pub const YELLOW: &str = "\x1b[33m"; // attribute values
    pub const MAGENTA: &str = "\x1b[35m"; // handlers
}

/// Options for markup rendering
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Whether to use ANSI colors
    pub use_color: bool,
    /// Indentation string (default: 2 spaces)
    pub indent: String,
    /// Maximum depth to render (None = unlimited)
    pub max_depth: Option<usize>,
    /// Pretty print with indentation and newlines (default: true)
    pub pretty_print: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        RenderOptions {
            use_color: false,
            indent: "  ".to_string(),
            max_depth: None,
            pretty_print: true,
        }
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }
}

/// Render a tree to markup
pub fn render_markup(node: &Node, options: &RenderOptions) -> String {
    let mut output = String::new();
    let mut renderer = Renderer {
        options,
        output: &mut output,
    };
    renderer.element(node, 0);
    output
}

struct Renderer<'o> {
    options: &'o RenderOptions,
    output: &'o mut String,
}

impl Renderer<'_> {
    fn paint(&mut self, color: &str, text: &str) {
        if self.options.use_color {
            self.output.push_str(color);
            self.output.push_str(text);
            self.output.push_str(ansi::RESET);
        } else {
            self.output.push_str(text);
        }
    }

    fn indent(&mut self, depth: usize) {
        if self.options.pretty_print {
            self.output.push_str(&self.options.indent.repeat(depth));
        }
    }

    fn newline(&mut self) {
        if self.options.pretty_print {
            self.output.push('\n');
        }
    }

    fn element(&mut self, node: &Node, depth: usize) {
        let children = flatten(&node.children);

        self.indent(depth);
        self.open_tag(node);

        if children.is_empty() {
            self.paint(ansi::DIM, "/>");
            self.newline();
            return;
        }

        self.paint(ansi::DIM, ">");

        if let [ChildRef::Raw(value)] = children.as_slice() {
            // single text child - render inline
            self.output.push_str(&escape(raw_text(value).as_str()));
            self.close_tag(node);
            self.newline();
            return;
        }

        self.newline();

        if self.options.max_depth.map_or(false, |max| depth >= max) {
            let hidden = count_elements(node) - 1;
            self.indent(depth + 1);
            self.paint(ansi::DIM, &format!("<!-- ... ({} more) -->", hidden));
            self.newline();
        } else {
            for child in children {
                match child {
                    ChildRef::Element(child) => self.element(child, depth + 1),
                    ChildRef::Raw(value) => {
                        self.indent(depth + 1);
                        self.output.push_str(&escape(raw_text(value).as_str()));
                        self.newline();
                    }
                }
            }
        }

        self.indent(depth);
        self.close_tag(node);
        self.newline();
    }

    fn open_tag(&mut self, node: &Node) {
        self.paint(ansi::DIM, "<");
        self.paint(ansi::BLUE, &node.kind);

        for (name, value) in node.props.iter() {
            match value {
                PropValue::Data(Value::Null) => {}
                PropValue::Data(value) => {
                    self.output.push(' ');
                    self.paint(ansi::CYAN, name);
                    self.paint(ansi::DIM, "=\"");
                    self.paint(ansi::YELLOW, &escape(raw_text(value).as_str()));
                    self.paint(ansi::DIM, "\"");
                }
                PropValue::Handler(_) => {
                    self.output.push(' ');
                    self.paint(ansi::MAGENTA, name);
                }
            }
        }
    }

    fn close_tag(&mut self, node: &Node) {
        self.paint(ansi::DIM, "</");
        self.paint(ansi::BLUE, &node.kind);
        self.paint(ansi::DIM, ">");
    }
}

/// Strings as-is, everything else as JSON text
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
