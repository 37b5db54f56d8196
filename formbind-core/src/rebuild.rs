//! Structure-preserving tree rebuild
//!
//! Walks a tree and produces a new one, applying two independent per-node
//! transforms supplied through [`RebuildRules`]:
//! - `replace`: keep, replace or remove the node (the node factory)
//! - `extra_props`: properties to merge over the result (the property factory)
//!
//! ## Algorithm
//! ```text
//! action  = replace(node, parent)
//! extra   = extra_props(node, parent)
//! removed → dropped from the output
//! else    → candidate = replacement or node
//!           children of candidate: elements recurse with candidate as parent,
//!                                  raw values go through replace(raw, parent)
//!           clone candidate with extra merged and new children
//! ```
//! The input tree is never modified. Child order is preserved; nested lists
//! keep their shape. A rule error aborts the whole rebuild.

use std::borrow::Cow;
use std::convert::Infallible;
use std::marker::PhantomData;

use serde_json::Value;

use crate::node::{Child, ChildRef, Node, Props};

/// Outcome of the node factory for one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    Keep,
    Replace(Node),
    Remove,
}

/// Per-node transforms applied during a rebuild
///
/// Both default to identity, so an implementation only overrides what it needs.
pub trait RebuildRules {
    type Error;

    /// Decide what becomes of `node`
    fn replace(&mut self, node: ChildRef<'_>, parent: Option<&Node>) -> Result<NodeAction, Self::Error> {
        let _ = (node, parent);
        Ok(NodeAction::Keep)
    }

    /// Properties to merge over the rebuilt node
    fn extra_props(&mut self, node: &Node, parent: Option<&Node>) -> Result<Props, Self::Error> {
        let _ = (node, parent);
        Ok(Props::new())
    }
}

/// Rules that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl RebuildRules for Identity {
    type Error = Infallible;
}

/// Rebuild `node` under `rules`
///
/// Returns `None` when the node itself was removed.
pub fn rebuild<R>(node: &Node, parent: Option<&Node>, rules: &mut R) -> Result<Option<Node>, R::Error>
where
    R: RebuildRules + ?Sized,
{
    let action = rules.replace(ChildRef::Element(node), parent)?;
    let extra = rules.extra_props(node, parent)?;

    let candidate: Cow<'_, Node> = match action {
        NodeAction::Keep => Cow::Borrowed(node),
        NodeAction::Replace(replacement) => Cow::Owned(replacement),
        NodeAction::Remove => {
            tracing::trace!(kind = %node.kind, "node removed from rebuilt tree");
            return Ok(None);
        }
    };

    let children = if candidate.has_children() {
        Some(rebuild_children(&candidate.children, parent, &candidate, rules)?)
    } else {
        None
    };

    Ok(Some(candidate.clone_with(&extra, children)))
}

/// Rebuild the children of `current`
///
/// Raw values are offered to the node factory with the parent of `current`,
/// elements recurse with `current` as their parent.
fn rebuild_children<R>(
    children: &[Child],
    outer_parent: Option<&Node>,
    current: &Node,
    rules: &mut R,
) -> Result<Vec<Child>, R::Error>
where
    R: RebuildRules + ?Sized,
{
    let mut rebuilt = Vec::with_capacity(children.len());

    for child in children {
        match child {
            Child::Element(node) => {
                if let Some(node) = rebuild(node, Some(current), rules)? {
                    rebuilt.push(Child::Element(node));
                }
            }
            Child::List(items) => {
                rebuilt.push(Child::List(rebuild_children(items, outer_parent, current, rules)?));
            }
            Child::Raw(Value::Null) => rebuilt.push(child.clone()),
            Child::Raw(value) => match rules.replace(ChildRef::Raw(value), outer_parent)? {
                NodeAction::Keep => rebuilt.push(child.clone()),
                NodeAction::Replace(node) => rebuilt.push(Child::Element(node)),
                NodeAction::Remove => {}
            },
        }
    }

    Ok(rebuilt)
}

/// Rebuild with plain closures
///
/// `None` for either factory behaves as identity.
pub fn rebuild_with<E, NF, PF>(
    node: &Node,
    node_factory: Option<NF>,
    prop_factory: Option<PF>,
) -> Result<Option<Node>, E>
where
    NF: FnMut(ChildRef<'_>, Option<&Node>) -> Result<NodeAction, E>,
    PF: FnMut(&Node, Option<&Node>) -> Result<Props, E>,
{
    let mut rules = FnRules {
        node_factory,
        prop_factory,
        _error: PhantomData,
    };
    rebuild(node, None, &mut rules)
}

struct FnRules<E, NF, PF> {
    node_factory: Option<NF>,
    prop_factory: Option<PF>,
    _error: PhantomData<fn() -> E>,
}

impl<E, NF, PF> RebuildRules for FnRules<E, NF, PF>
where
    NF: FnMut(ChildRef<'_>, Option<&Node>) -> Result<NodeAction, E>,
    PF: FnMut(&Node, Option<&Node>) -> Result<Props, E>,
{
    type Error = E;

    fn replace(&mut self, node: ChildRef<'_>, parent: Option<&Node>) -> Result<NodeAction, E> {
        match self.node_factory.as_mut() {
            Some(factory) => factory(node, parent),
            None => Ok(NodeAction::Keep),
        }
    }

    fn extra_props(&mut self, node: &Node, parent: Option<&Node>) -> Result<Props, E> {
        match self.prop_factory.as_mut() {
            Some(factory) => factory(node, parent),
            None => Ok(Props::new()),
        }
    }
}
