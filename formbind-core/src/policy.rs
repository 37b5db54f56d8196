//! Host policy seam
//!
//! The binder never decides on its own which nodes are fields or what a
//! directive key means. A [`FormPolicy`] supplies those answers; its errors
//! abort the bind and reach the caller unchanged.

use crate::fields::Registrar;
use crate::node::Node;

/// Decisions the host makes on behalf of the form binder
pub trait FormPolicy {
    /// Register `node` through `fields` if it represents a form field
    ///
    /// Called once per element of the bound tree, in pre-order.
    fn discover<'a>(&self, node: &'a Node, fields: &mut Registrar<'a>) -> anyhow::Result<()>;

    /// Resolve an `spIf` key: `Some(visible)` or `None` when unknown
    fn resolve_visibility(&self, key: &str, node: &Node) -> anyhow::Result<Option<bool>> {
        let _ = (key, node);
        Ok(None)
    }

    /// Resolve an `spBind` key to a replacement node, if any
    fn resolve_binding(&self, key: &str, node: &Node) -> anyhow::Result<Option<Node>> {
        let _ = (key, node);
        Ok(None)
    }
}

impl<P: FormPolicy + ?Sized> FormPolicy for &P {
    fn discover<'a>(&self, node: &'a Node, fields: &mut Registrar<'a>) -> anyhow::Result<()> {
        (**self).discover(node, fields)
    }

    fn resolve_visibility(&self, key: &str, node: &Node) -> anyhow::Result<Option<bool>> {
        (**self).resolve_visibility(key, node)
    }

    fn resolve_binding(&self, key: &str, node: &Node) -> anyhow::Result<Option<Node>> {
        (**self).resolve_binding(key, node)
    }
}
