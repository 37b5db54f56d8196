//! Form binding
//!
//! Composes the field indexer and the tree rebuilder into one pass that turns
//! a declarative form tree into a bound one:
//!
//! 1. wrap the source's children in a neutral container
//! 2. index fields through the host policy
//! 3. seed missing state entries with their defaults
//! 4. rebuild, applying directives (`spIf`, `spBind`) and injecting
//!    `defaultValue`, `onChange` and submit `disabled` flags
//!
//! Handlers record the processing flag each time they fire; once changes
//! have been delivered, [`apply_recorded_disabled`] carries those flags into
//! the tree for the next render.
//!
//! The source tree is never modified. The only state write during a bind is
//! adding absent default entries; existing values survive repeated binds.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BindError;
use crate::fields::FieldIndex;
use crate::node::{keys, ChangeEvent, ChangeHandler, ChildRef, Node, PropValue, Props};
use crate::policy::FormPolicy;
use crate::rebuild::{rebuild, NodeAction, RebuildRules};
use crate::visit::find_element;

/// Type of the neutral container the source's children are wrapped in
pub const CONTAINER_KIND: &str = "div";

/// Negation marker for visibility directives
const NEGATION: char = '!';

/// Externally owned form state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormState {
    /// Current value per field name
    pub fields: Map<String, Value>,
    /// Set by the host while a submit is in flight; read-only to the binder
    pub is_form_processing: bool,
}

/// Form state shared between the binder and the handlers it injects
pub type SharedFormState = Rc<RefCell<FormState>>;

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedFormState {
        Rc::new(RefCell::new(self))
    }

    /// Add every default whose field has no value yet
    ///
    /// Returns the number of entries added.
    pub fn seed(&mut self, defaults: &Map<String, Value>) -> usize {
        let mut added = 0;
        for (name, value) in defaults {
            if !self.fields.contains_key(name) {
                self.fields.insert(name.clone(), value.clone());
                added += 1;
            }
        }
        added
    }
}

/// Binds form trees against one state and one host policy
pub struct FormBinder<'s, P: FormPolicy> {
    state: &'s SharedFormState,
    policy: &'s P,
}

impl<'s, P: FormPolicy> FormBinder<'s, P> {
    pub fn new(state: &'s SharedFormState, policy: &'s P) -> Self {
        Self { state, policy }
    }

    /// Produce the bound tree for `source`
    ///
    /// Policy errors abort the bind; state seeding done before the error is
    /// kept, which is harmless since seeding is idempotent.
    pub fn bind(&self, source: &Node) -> Result<Node, BindError> {
        let container = Node::new(CONTAINER_KIND).with_children(source.children.clone());

        let index = FieldIndex::build(&container, |node, fields| self.policy.discover(node, fields))?;

        let seeded = self.state.borrow_mut().seed(index.default_values());
        tracing::debug!(source = %source.kind, fields = index.len(), seeded, "indexed form fields");

        let mut rules = FormRules {
            index: &index,
            state: self.state,
            policy: self.policy,
        };

        let bound = rebuild(&container, None, &mut rules)?;
        Ok(bound.unwrap_or_else(|| Node::new(CONTAINER_KIND)))
    }
}

/// Bind `source` against `state` using `policy`
pub fn bind_form<P: FormPolicy>(
    source: &Node,
    state: &SharedFormState,
    policy: &P,
) -> Result<Node, BindError> {
    FormBinder::new(state, policy).bind(source)
}

/// Deliver a change of `field` to the handler the binder injected for it
///
/// Returns `false` when no element in `tree` carries a handler for `field`.
pub fn dispatch_change(tree: &Node, field: &str, value: impl Into<Value>) -> bool {
    let target = find_element(tree, |node| {
        node.prop(keys::ON_CHANGE)
            .and_then(PropValue::as_handler)
            .and_then(ChangeHandler::field)
            == Some(field)
    });

    match target.and_then(|node| node.prop(keys::ON_CHANGE)).and_then(PropValue::as_handler) {
        Some(handler) => {
            handler.call(&ChangeEvent::new(value), &[]);
            true
        }
        None => false,
    }
}

/// Copy of `tree` with the disabled flags recorded by fired handlers applied
///
/// An element whose injected `onChange` ran gets `disabled` set to the
/// processing flag seen at that moment. Everything else is left as it was.
pub fn apply_recorded_disabled(tree: &Node) -> Node {
    match rebuild(tree, None, &mut RecordedDisabled) {
        Ok(Some(node)) => node,
        Ok(None) => tree.clone(),
        Err(never) => match never {},
    }
}

struct RecordedDisabled;

impl RebuildRules for RecordedDisabled {
    type Error = Infallible;

    fn extra_props(&mut self, node: &Node, _parent: Option<&Node>) -> Result<Props, Infallible> {
        let mut props = Props::new();
        let recorded = node
            .prop(keys::ON_CHANGE)
            .and_then(PropValue::as_handler)
            .and_then(ChangeHandler::recorded_disabled);
        if let Some(disabled) = recorded {
            props.insert(keys::DISABLED, disabled);
        }
        Ok(props)
    }
}

/// Whether `node` is a submit control
pub fn is_submit_control(node: &Node) -> bool {
    matches!(node.kind.as_str(), "input" | "button") && node.prop_str(keys::TYPE) == Some("submit")
}

/// Rebuild rules for one bind: directives in `replace`, injection in `extra_props`
struct FormRules<'r, 'a, P> {
    index: &'r FieldIndex<'a>,
    state: &'r SharedFormState,
    policy: &'r P,
}

impl<P: FormPolicy> FormRules<'_, '_, P> {
    fn visibility(&self, node: &Node) -> Result<Option<bool>, BindError> {
        let directive = match directive(node, keys::SP_IF) {
            Some(directive) => directive,
            None => return Ok(None),
        };

        let (key, negated) = match directive.strip_prefix(NEGATION) {
            Some(key) => (key, true),
            None => (directive.as_str(), false),
        };

        let resolved = self.policy.resolve_visibility(key, node)?;
        if resolved.is_none() {
            tracing::debug!(key, kind = %node.kind, "visibility unknown, directive ignored");
        }
        Ok(resolved.map(|visible| visible != negated))
    }

    fn binding(&self, node: &Node) -> Result<Option<Node>, BindError> {
        let key = match directive(node, keys::SP_BIND) {
            Some(key) => key,
            None => return Ok(None),
        };

        let replacement = self.policy.resolve_binding(&key, node)?;
        if replacement.is_none() {
            tracing::debug!(key = %key, kind = %node.kind, "binding resolved to nothing");
        }
        Ok(replacement)
    }

    fn change_handler(&self, field_name: &str, node: &Node) -> ChangeHandler {
        let state = Rc::clone(self.state);
        let field = field_name.to_string();
        let previous = node
            .prop(keys::ON_CHANGE)
            .and_then(PropValue::as_handler)
            .cloned();

        let slot = Rc::new(Cell::new(None));
        let recorder = Rc::clone(&slot);

        ChangeHandler::with_disabled_slot(
            move |event: &ChangeEvent, args: &[Value]| {
                {
                    let mut state = state.borrow_mut();
                    recorder.set(Some(state.is_form_processing));
                    state.fields.insert(field.clone(), event.target.value.clone());
                }
                // borrow released: the previous handler may read the state
                if let Some(previous) = &previous {
                    previous.call(event, args);
                }
            },
            slot,
        )
        .bound_to(field_name)
    }
}

impl<P: FormPolicy> RebuildRules for FormRules<'_, '_, P> {
    type Error = BindError;

    fn replace(&mut self, node: ChildRef<'_>, _parent: Option<&Node>) -> Result<NodeAction, BindError> {
        let node = match node.as_element() {
            Some(node) => node,
            None => return Ok(NodeAction::Keep),
        };

        if self.visibility(node)? == Some(false) {
            tracing::trace!(kind = %node.kind, "hidden by visibility directive");
            return Ok(NodeAction::Remove);
        }

        Ok(match self.binding(node)? {
            Some(replacement) => {
                tracing::trace!(kind = %node.kind, with = %replacement.kind, "replaced by binding");
                NodeAction::Replace(replacement)
            }
            None => NodeAction::Keep,
        })
    }

    fn extra_props(&mut self, node: &Node, _parent: Option<&Node>) -> Result<Props, BindError> {
        let mut props = Props::new();

        let name = node.props.name();
        if let Some(field) = self.index.lookup(&node.kind, name.as_deref()) {
            tracing::trace!(field = %field.field_name, kind = %node.kind, "wiring field");
            if let Some(default) = self.index.default_values().get(&field.field_name) {
                props.insert(keys::DEFAULT_VALUE, default.clone());
            }
            props.insert(keys::ON_CHANGE, self.change_handler(&field.field_name, node));
        }

        if is_submit_control(node) {
            props.insert(keys::DISABLED, self.state.borrow().is_form_processing);
        }

        Ok(props)
    }
}

/// Lookup key of a directive property
///
/// Absent or falsy directives are unset. Numbers and booleans resolve by
/// their text form; objects, arrays and handlers have no key and are skipped.
fn directive(node: &Node, key: &'static str) -> Option<String> {
    if !node.props.is_truthy(key) {
        return None;
    }
    let resolved = node.props.key_of(key);
    if resolved.is_none() {
        tracing::warn!(directive = key, kind = %node.kind, "directive has no usable key, ignored");
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Registrar;
    use crate::node::Child;
    use crate::visit::count_elements;
    use serde_json::json;
    use std::collections::HashMap;

    /// Registers every `input` by name; directives resolve from maps
    #[derive(Default)]
    struct TestPolicy {
        visibility: HashMap<String, bool>,
        bindings: HashMap<String, Node>,
        fail_on: Option<String>,
    }

    impl FormPolicy for TestPolicy {
        fn discover<'a>(&self, node: &'a Node, fields: &mut Registrar<'a>) -> anyhow::Result<()> {
            if self.fail_on.as_deref() == Some(node.kind.as_str()) {
                anyhow::bail!("policy rejected <{}>", node.kind);
            }
            if node.kind == "input" {
                if let Some(name) = node.props.name() {
                    fields.register(node, &name, None);
                }
            }
            Ok(())
        }

        fn resolve_visibility(&self, key: &str, _node: &Node) -> anyhow::Result<Option<bool>> {
            Ok(self.visibility.get(key).copied())
        }

        fn resolve_binding(&self, key: &str, _node: &Node) -> anyhow::Result<Option<Node>> {
            Ok(self.bindings.get(key).cloned())
        }
    }

    fn scenario_form() -> Node {
        Node::new("form")
            .with_child(Node::new("input").with_prop("name", "email"))
            .with_child(Node::new("button").with_prop("type", "submit"))
    }

    fn element(node: &Node, index: usize) -> &Node {
        node.children[index].as_element().unwrap()
    }

    #[test]
    fn test_scenario() {
        for processing in [false, true] {
            let state = FormState {
                is_form_processing: processing,
                ..FormState::default()
            }
            .shared();

            let bound = bind_form(&scenario_form(), &state, &TestPolicy::default()).unwrap();

            assert_eq!(bound.kind, CONTAINER_KIND);
            assert_eq!(state.borrow().fields["email"], json!(""));
            let button = element(&bound, 1);
            assert_eq!(button.prop("disabled"), Some(&PropValue::Data(json!(processing))));
            // never written by the binder
            assert_eq!(state.borrow().is_form_processing, processing);
        }
    }

    #[test]
    fn test_field_gets_default_and_handler() {
        let state = FormState::new().shared();
        let form = Node::new("form").with_child(
            Node::new("input")
                .with_prop("name", "city")
                .with_prop("value", "Delft"),
        );

        let bound = bind_form(&form, &state, &TestPolicy::default()).unwrap();
        let input = element(&bound, 0);

        assert_eq!(input.prop(keys::DEFAULT_VALUE), Some(&PropValue::Data(json!("Delft"))));
        let handler = input.prop(keys::ON_CHANGE).and_then(PropValue::as_handler).unwrap();
        assert_eq!(handler.field(), Some("city"));
        // the source is untouched
        assert!(!form.children[0].as_element().unwrap().props.contains(keys::ON_CHANGE));
    }

    #[test]
    fn test_visibility_directive() {
        let policy = TestPolicy {
            visibility: HashMap::from([("admin".to_string(), false), ("beta".to_string(), true)]),
            ..TestPolicy::default()
        };
        let form = Node::new("form")
            .with_child(Node::new("section").with_prop("spIf", "admin").with_child("hidden"))
            .with_child(Node::new("section").with_prop("spIf", "!admin").with_child("shown"))
            .with_child(Node::new("section").with_prop("spIf", "beta").with_child("shown"))
            .with_child(Node::new("section").with_prop("spIf", "!beta").with_child("hidden"))
            .with_child(Node::new("section").with_prop("spIf", "unknown").with_child("kept"));

        let state = FormState::new().shared();
        let bound = bind_form(&form, &state, &policy).unwrap();

        let texts: Vec<&Child> = bound
            .children
            .iter()
            .map(|c| &c.as_element().unwrap().children[0])
            .collect();
        assert_eq!(
            texts,
            vec![&Child::text("shown"), &Child::text("shown"), &Child::text("kept")]
        );
        // unknown visibility leaves the node as it was
        assert_eq!(element(&bound, 2), element(&form, 4));
    }

    #[test]
    fn test_hidden_fields_are_still_seeded() {
        let policy = TestPolicy {
            visibility: HashMap::from([("admin".to_string(), false)]),
            ..TestPolicy::default()
        };
        let form = Node::new("form").with_child(
            Node::new("section")
                .with_prop("spIf", "admin")
                .with_child(Node::new("input").with_prop("name", "secret")),
        );

        let state = FormState::new().shared();
        let bound = bind_form(&form, &state, &policy).unwrap();

        assert!(bound.children.is_empty());
        assert_eq!(state.borrow().fields["secret"], json!(""));
    }

    #[test]
    fn test_binding_directive_replaces_and_descends() {
        let replacement = Node::new("fieldset").with_child(Node::new("input").with_prop("name", "nick"));
        let policy = TestPolicy {
            bindings: HashMap::from([("profile".to_string(), replacement)]),
            ..TestPolicy::default()
        };
        let form = Node::new("form")
            .with_child(Node::new("slot").with_prop("spBind", "profile"))
            .with_child(Node::new("slot").with_prop("spBind", "missing"));

        let state = FormState::new().shared();
        let bound = bind_form(&form, &state, &policy).unwrap();

        let fieldset = element(&bound, 0);
        assert_eq!(fieldset.kind, "fieldset");
        // the replacement was not indexed, so its input is not wired
        assert!(!element(fieldset, 0).props.contains(keys::ON_CHANGE));
        assert_eq!(element(&bound, 1).kind, "slot");
    }

    #[test]
    fn test_seeding_is_stable_across_binds() {
        let state = FormState::new().shared();
        let policy = TestPolicy::default();

        let first = Node::new("form").with_child(Node::new("input").with_prop("name", "n").with_prop("value", "x"));
        bind_form(&first, &state, &policy).unwrap();
        assert_eq!(state.borrow().fields["n"], json!("x"));

        let second = Node::new("form").with_child(Node::new("input").with_prop("name", "n").with_prop("value", "y"));
        bind_form(&second, &state, &policy).unwrap();
        assert_eq!(state.borrow().fields["n"], json!("x"));
    }

    #[test]
    fn test_change_wiring_updates_state_and_forwards() {
        let calls: Rc<RefCell<Vec<(Value, Vec<Value>)>>> = Rc::default();
        let seen = Rc::clone(&calls);
        let original = ChangeHandler::new(move |event, args| {
            seen.borrow_mut().push((event.target.value.clone(), args.to_vec()));
        });

        let form = Node::new("form").with_child(
            Node::new("input")
                .with_prop("name", "e")
                .with_prop("fieldName", "email")
                .with_prop("onChange", original),
        );
        let state = FormState {
            is_form_processing: true,
            ..FormState::default()
        }
        .shared();

        let bound = bind_form(&form, &state, &TestPolicy::default()).unwrap();
        let handler = element(&bound, 0)
            .prop(keys::ON_CHANGE)
            .and_then(PropValue::as_handler)
            .unwrap();

        assert_eq!(handler.recorded_disabled(), None);
        handler.call(&ChangeEvent::new("v"), &[json!("extra")]);

        assert_eq!(state.borrow().fields["email"], json!("v"));
        assert_eq!(handler.recorded_disabled(), Some(true));
        assert_eq!(*calls.borrow(), vec![(json!("v"), vec![json!("extra")])]);
    }

    #[test]
    fn test_dispatch_change() {
        let state = FormState::new().shared();
        let bound = bind_form(&scenario_form(), &state, &TestPolicy::default()).unwrap();

        assert!(dispatch_change(&bound, "email", "a@b.c"));
        assert_eq!(state.borrow().fields["email"], json!("a@b.c"));
        assert!(!dispatch_change(&bound, "phone", "123"));
    }

    #[test]
    fn test_submit_disabling() {
        let form = Node::new("form")
            .with_child(Node::new("input").with_prop("type", "submit"))
            .with_child(Node::new("button").with_prop("type", "button"))
            .with_child(Node::new("a").with_prop("type", "submit"));
        let state = FormState {
            is_form_processing: true,
            ..FormState::default()
        }
        .shared();

        let bound = bind_form(&form, &state, &TestPolicy::default()).unwrap();

        assert_eq!(element(&bound, 0).prop("disabled"), Some(&PropValue::Data(json!(true))));
        assert!(element(&bound, 1).prop("disabled").is_none());
        assert!(element(&bound, 2).prop("disabled").is_none());
    }

    #[test]
    fn test_bind_is_idempotent() {
        let form = Node::new("form")
            .with_child(Node::new("input").with_prop("name", "a").with_prop("value", "1"))
            .with_child(Child::List(vec![
                Node::new("input").with_prop("name", "b").into(),
                Child::Raw(Value::Null),
                Child::text("note"),
            ]))
            .with_child(Node::new("button").with_prop("type", "submit"));
        let state = FormState::new().shared();
        let policy = TestPolicy::default();

        let first = bind_form(&form, &state, &policy).unwrap();
        let second = bind_form(&form, &state, &policy).unwrap();

        assert!(first.structurally_eq(&second));
        assert_eq!(count_elements(&first), 4);
    }

    #[test]
    fn test_policy_error_aborts_bind() {
        let policy = TestPolicy {
            fail_on: Some("button".to_string()),
            ..TestPolicy::default()
        };
        let state = FormState::new().shared();

        let err = bind_form(&scenario_form(), &state, &policy).unwrap_err();
        assert!(matches!(err, BindError::Policy(_)));
        assert_eq!(err.to_string(), "policy rejected <button>");
    }

    #[test]
    fn test_scalar_directives_resolve_by_text() {
        let policy = TestPolicy {
            visibility: HashMap::from([("true".to_string(), false), ("1".to_string(), true)]),
            bindings: HashMap::from([("7".to_string(), Node::new("p"))]),
            ..TestPolicy::default()
        };
        let form = Node::new("form")
            .with_child(Node::new("section").with_prop("spIf", true))
            .with_child(Node::new("section").with_prop("spIf", json!(1)).with_child("shown"))
            .with_child(Node::new("slot").with_prop("spBind", json!(7)))
            .with_child(Node::new("input").with_prop("name", "email"));
        let state = FormState::new().shared();

        let bound = bind_form(&form, &state, &policy).unwrap();

        assert_eq!(bound.children.len(), 3);
        assert_eq!(element(&bound, 0).children, vec![Child::text("shown")]);
        assert_eq!(element(&bound, 1).kind, "p");
        assert!(element(&bound, 2).props.contains(keys::ON_CHANGE));
        assert_eq!(state.borrow().fields["email"], json!(""));
    }

    #[test]
    fn test_keyless_directives_are_ignored() {
        let form = Node::new("form")
            .with_child(Node::new("section").with_prop("spIf", json!({"role": "admin"})))
            .with_child(Node::new("slot").with_prop("spBind", json!(["a"])))
            .with_child(Node::new("section").with_prop("spIf", ""));
        let state = FormState::new().shared();

        let bound = bind_form(&form, &state, &TestPolicy::default()).unwrap();

        assert!(bound.structurally_eq(&Node::new(CONTAINER_KIND).with_children(form.children.clone())));
    }

    #[test]
    fn test_recorded_disabled_is_applied_after_changes() {
        let form = Node::new("form")
            .with_child(Node::new("input").with_prop("name", "email"))
            .with_child(Node::new("input").with_prop("name", "nick"));
        let state = FormState {
            is_form_processing: true,
            ..FormState::default()
        }
        .shared();

        let bound = bind_form(&form, &state, &TestPolicy::default()).unwrap();
        assert!(apply_recorded_disabled(&bound).structurally_eq(&bound));

        assert!(dispatch_change(&bound, "email", "a@b.c"));
        let next = apply_recorded_disabled(&bound);

        assert_eq!(element(&next, 0).prop(keys::DISABLED), Some(&PropValue::Data(json!(true))));
        assert!(!element(&next, 1).props.contains(keys::DISABLED));
        // the handler survives, so later changes still reach the state
        assert!(dispatch_change(&next, "nick", "ada"));
        assert_eq!(state.borrow().fields["nick"], json!("ada"));
    }

    #[test]
    fn test_state_serde_uses_camel_case() {
        let state: FormState =
            serde_json::from_value(json!({"fields": {"a": 1}, "isFormProcessing": true})).unwrap();
        assert!(state.is_form_processing);
        assert_eq!(state.fields["a"], json!(1));

        let empty: FormState = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, FormState::new());
    }
}
