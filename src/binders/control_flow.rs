//! Control flow binders - conditional and list rendering.
//!
//! Both are block binders: they take the element out of the document,
//! leave a comment marker in its place and manage nested [`View`]s built
//! from the element.
//!
//! # `if`
//!
//! - truthy: build and bind a nested view over the element on first show,
//!   then insert the element right after the marker
//! - falsy: detach the element. The nested view stays bound while hidden,
//!   so showing it again only resyncs it
//!
//! # `each-*`
//!
//! One nested view per item, built from a clone of the element, with a
//! scope object per item:
//!
//! ```text
//! { $parent: <owning view models>, $index: 2, <arg>: <item> }
//! ```
//!
//! Every routine reconciles the views against the collection by position
//! and item identity:
//! - no view at `i`: create one after the previous view (or the marker)
//! - view at `i` holds another item: move a later view holding this item
//!   here, or create a new view in front of it
//! - view at `i` holds this item: refresh its index
//! - views past the end are unbound and removed
//!
//! Views whose item only moved keep their nodes and bindings.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Binder, BinderFlags};
use crate::binding::Binding;
use crate::dom::Node;
use crate::model::ObjectRef;
use crate::options::ViewOptions;
use crate::value::Value;
use crate::view::View;

const DEFAULT_INDEX_PROPERTY: &str = "$index";

/// Replace `el` with a comment marker. The marker is returned even when
/// `el` has no parent, in which case nothing can be rendered.
fn install_marker(el: &Node, text: String) -> Node {
    let marker = Node::comment(text);
    match el.parent() {
        Some(parent) => {
            parent.insert_before(&marker, Some(el));
            parent.remove_child(el);
        }
        None => {
            tracing::warn!(marker = %marker.data().unwrap_or_default(), "block element has no parent node");
        }
    }
    marker
}

fn bind_nested(view: &View, kind: &str) -> bool {
    match view.bind() {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(binder = kind, error = %err, "failed to bind nested view");
            false
        }
    }
}

// =============================================================================
// if
// =============================================================================

#[derive(Default)]
struct IfState {
    marker: RefCell<Option<Node>>,
    attached: Cell<bool>,
    nested: RefCell<Option<View>>,
    nested_bound: Cell<bool>,
}

impl IfState {
    fn nested(&self) -> Option<View> {
        self.nested.borrow().clone()
    }
}

/// `if`: conditional attachment.
#[derive(Debug, Default)]
pub struct IfBinder;

impl Binder for IfBinder {
    fn bind(&self, binding: &Binding, el: &Node) {
        let state = binding.scratch::<IfState>();
        if state.marker.borrow().is_none() {
            let marker = install_marker(el, format!(" spark-bind: if {} ", binding.keypath()));
            *state.marker.borrow_mut() = Some(marker);
            state.attached.set(false);
        } else if !state.nested_bound.get() {
            if let Some(nested) = state.nested() {
                state.nested_bound.set(bind_nested(&nested, "if"));
            }
        }
    }

    fn unbind(&self, binding: &Binding, _el: &Node) {
        let state = binding.scratch::<IfState>();
        if let Some(nested) = state.nested() {
            nested.unbind();
            state.nested_bound.set(false);
        }
    }

    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        let state = binding.scratch::<IfState>();
        let show = value.truthy();
        if show == state.attached.get() {
            return;
        }

        if !show {
            el.detach();
            state.attached.set(false);
            return;
        }

        match state.nested() {
            None => {
                let nested = View::new(vec![el.clone()], binding.models(), binding.options().nested());
                state.nested_bound.set(bind_nested(&nested, "if"));
                *state.nested.borrow_mut() = Some(nested);
            }
            Some(nested) if state.nested_bound.get() => nested.sync(),
            Some(nested) => state.nested_bound.set(bind_nested(&nested, "if")),
        }

        let marker = state.marker.borrow().clone();
        if let Some(parent) = marker.as_ref().and_then(Node::parent) {
            let next = marker.as_ref().and_then(Node::next_sibling);
            parent.insert_before(el, next.as_ref());
        }
        state.attached.set(true);
    }

    fn update(&self, binding: &Binding, models: &ObjectRef) {
        if let Some(nested) = binding.scratch::<IfState>().nested() {
            nested.update(models);
        }
    }

    fn priority(&self) -> i32 {
        4000
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::BLOCK
    }
}

// =============================================================================
// each-*
// =============================================================================

#[derive(Default)]
struct EachState {
    marker: RefCell<Option<Node>>,
    iterated: RefCell<Vec<View>>,
}

/// Where and how new item views are created.
struct Template<'a> {
    el: &'a Node,
    parent: Option<Node>,
    options: Rc<ViewOptions>,
    models: ObjectRef,
    arg: &'a str,
    index_property: &'a str,
}

impl Template<'_> {
    fn scope(&self, index: usize, item: &Value) -> ObjectRef {
        let scope = ObjectRef::new();
        scope.set("$parent", self.models.clone());
        scope.set(self.index_property, index);
        scope.set(self.arg, item.clone());
        scope
    }

    /// Clone the template, bind it, insert it before `anchor`.
    fn create(&self, index: usize, item: &Value, anchor: Option<&Node>) -> View {
        let node = self.el.deep_clone();
        let view = View::new(vec![node.clone()], self.scope(index, item), self.options.clone());
        bind_nested(&view, "each");
        if let Some(parent) = &self.parent {
            parent.insert_before(&node, anchor);
        }
        view
    }
}

fn first_el(view: &View) -> Option<Node> {
    view.els().first().cloned()
}

/// `each-*`: keyed list rendering. The argument names the item variable.
#[derive(Debug, Default)]
pub struct EachBinder;

impl Binder for EachBinder {
    fn bind(&self, binding: &Binding, el: &Node) {
        let state = binding.scratch::<EachState>();
        if state.marker.borrow().is_none() {
            let kind = binding.kind().unwrap_or("each");
            let marker = install_marker(el, format!(" spark-bind: {kind} "));
            *state.marker.borrow_mut() = Some(marker);
        } else {
            let views = state.iterated.borrow().clone();
            for view in &views {
                bind_nested(view, "each");
            }
        }
    }

    fn unbind(&self, binding: &Binding, _el: &Node) {
        let views = binding.scratch::<EachState>().iterated.borrow().clone();
        for view in &views {
            view.unbind();
        }
    }

    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        let Some(arg) = binding.arg() else {
            return;
        };
        let state = binding.scratch::<EachState>();
        let Some(marker) = state.marker.borrow().clone() else {
            return;
        };

        let items = match value {
            Value::Array(array) => array.to_vec(),
            _ => Vec::new(),
        };
        let index_property = el
            .attribute("index-property")
            .unwrap_or_else(|| DEFAULT_INDEX_PROPERTY.to_string());
        let template = Template {
            el,
            parent: marker.parent(),
            options: binding.options().nested(),
            models: binding.models(),
            arg,
            index_property: &index_property,
        };

        let mut iterated = state.iterated.take();
        let (mut created, mut moved) = (0, 0);

        for (index, item) in items.iter().enumerate() {
            let Some(view) = iterated.get(index).cloned() else {
                let previous = iterated.last().and_then(first_el).unwrap_or_else(|| marker.clone());
                let anchor = previous.next_sibling();
                iterated.push(template.create(index, item, anchor.as_ref()));
                created += 1;
                continue;
            };

            if view.models().get(arg).same(item) {
                view.models().set(index_property.as_str(), index);
                continue;
            }

            let found = (index + 1..iterated.len()).find(|&i| iterated[i].models().get(arg).same(item));
            let anchor = first_el(&view);
            let next = match found {
                Some(i) => {
                    let next = iterated.remove(i);
                    if let (Some(parent), Some(node)) = (&template.parent, first_el(&next)) {
                        parent.insert_before(&node, anchor.as_ref());
                    }
                    next.models().set(index_property.as_str(), index);
                    moved += 1;
                    next
                }
                None => {
                    created += 1;
                    template.create(index, item, anchor.as_ref())
                }
            };
            iterated.insert(index, next);
        }

        let mut removed = 0;
        while iterated.len() > items.len() {
            let Some(view) = iterated.pop() else {
                break;
            };
            view.unbind();
            if let Some(node) = first_el(&view) {
                node.detach();
            }
            removed += 1;
        }
        state.iterated.replace(iterated);

        tracing::debug!(
            binder = binding.kind().unwrap_or("each"),
            items = items.len(),
            created,
            moved,
            removed,
            "list reconciled"
        );

        // A changed option set can invalidate the owning select's selection
        if el.is_tag("option") {
            if let (Some(view), Some(select)) = (binding.view(), marker.parent()) {
                for other in view.bindings() {
                    if other.el().ptr_eq(&select) && other.kind() == Some("value") {
                        other.sync();
                    }
                }
            }
        }
    }

    fn update(&self, binding: &Binding, models: &ObjectRef) {
        let data = ObjectRef::new();
        for key in models.keys() {
            if Some(key.as_str()) != binding.arg() {
                data.set(key.as_str(), models.get(&key));
            }
        }
        let views = binding.scratch::<EachState>().iterated.borrow().clone();
        for view in &views {
            view.update(&data);
        }
    }

    fn priority(&self) -> i32 {
        4000
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::BLOCK
    }
}
