//! Pre-order traversal over UI trees
//!
//! Read-only walks with parent tracking. Nested child sequences are flattened
//! and absent (`null`) entries skipped, so handlers only ever see elements and
//! real raw values. Raw values get a handler call but are never descended into.
//!
//! Handlers return `Result`; the first error aborts the walk and is returned
//! unchanged.

use serde_json::Value;

use crate::node::{Child, ChildRef, Node};

/// Visit `node` and then every descendant, in pre-order
///
/// The root is reported without a parent.
pub fn visit_all<'a, E, F>(node: &'a Node, mut handler: F) -> Result<(), E>
where
    F: FnMut(ChildRef<'a>, Option<&'a Node>) -> Result<(), E>,
{
    handler(ChildRef::Element(node), None)?;
    if node.has_children() {
        visit_children(&node.children, &mut handler, Some(node))?;
    }
    Ok(())
}

/// Visit a children sequence, reporting `parent` for each direct entry
pub fn visit_children<'a, E, F>(
    children: &'a [Child],
    handler: &mut F,
    parent: Option<&'a Node>,
) -> Result<(), E>
where
    F: FnMut(ChildRef<'a>, Option<&'a Node>) -> Result<(), E>,
{
    for child in flatten(children) {
        handler(child, parent)?;

        if let ChildRef::Element(node) = child {
            if node.has_children() {
                visit_children(&node.children, handler, Some(node))?;
            }
        }
    }
    Ok(())
}

/// Flatten nested lists and drop `null` entries, preserving order
pub fn flatten(children: &[Child]) -> Vec<ChildRef<'_>> {
    let mut out = Vec::with_capacity(children.len());
    push_flat(children, &mut out);
    out
}

fn push_flat<'a>(children: &'a [Child], out: &mut Vec<ChildRef<'a>>) {
    for child in children {
        match child {
            Child::Element(node) => out.push(ChildRef::Element(node)),
            Child::List(items) => push_flat(items, out),
            Child::Raw(Value::Null) => {}
            Child::Raw(value) => out.push(ChildRef::Raw(value)),
        }
    }
}

/// First element (pre-order, root included) matching `predicate`
pub fn find_element<'a, P>(root: &'a Node, mut predicate: P) -> Option<&'a Node>
where
    P: FnMut(&Node) -> bool,
{
    // Err carries the hit out of the walk and stops it early
    visit_all(root, |child, _| match child.as_element() {
        Some(node) if predicate(node) => Err(node),
        _ => Ok(()),
    })
    .err()
}

/// Number of elements in the tree, root included
pub fn count_elements(root: &Node) -> usize {
    let mut count = 0;
    let _ = visit_all(root, |child, _| {
        if child.as_element().is_some() {
            count += 1;
        }
        Ok::<(), std::convert::Infallible>(())
    });
    count
}
