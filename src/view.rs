//! Views - bindings built from a node subtree.
//!
//! # Build
//!
//! Depth first over the root nodes:
//!
//! - text nodes containing template delimiters are split into one text node
//!   per segment; binding segments get a text binding
//! - elements have their `{prefix}-*` attributes matched against the binder
//!   registry: exact name, then wildcard binders (longest first), then the
//!   `*` attribute fallback
//! - a block binder consumes its attribute and stops both the attribute
//!   scan and the descent into children; the binder owns that subtree
//! - consumed attributes are removed from the live node
//!
//! Bindings are then stable-sorted by descending binder priority, so block
//! binders bind before two-way binders on the same element.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::binders::{self, Binder, BinderFlags, TextNodeBinder};
use crate::binding::{Binding, BindingSpec};
use crate::dom::{Node, NodeType};
use crate::error::Result;
use crate::model::ObjectRef;
use crate::options::ViewOptions;
use crate::parser::{self, SegmentKind};

pub(crate) struct ViewInner {
    els: Vec<Node>,
    models: ObjectRef,
    options: Rc<ViewOptions>,
    bindings: RefCell<Vec<Rc<Binding>>>,
}

/// An ordered set of bindings over one or more root nodes.
///
/// Cloning is cheap and yields a handle to the same view.
#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

impl View {
    /// Build bindings for `els` against `models`. Nothing is bound yet.
    pub fn new(els: Vec<Node>, models: ObjectRef, options: Rc<ViewOptions>) -> Self {
        let inner = Rc::new_cyclic(|me: &Weak<ViewInner>| {
            let mut builder = Builder {
                view: me.clone(),
                models: &models,
                options: &options,
                bindings: Vec::new(),
            };
            for el in &els {
                builder.parse(el);
            }

            let mut bindings = builder.bindings;
            bindings.sort_by_key(|b| std::cmp::Reverse(b.binder().priority()));

            ViewInner {
                els,
                models: models.clone(),
                options: options.clone(),
                bindings: RefCell::new(bindings),
            }
        });

        tracing::debug!(
            roots = inner.els.len(),
            bindings = inner.bindings.borrow().len(),
            "view built"
        );
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<ViewInner>) -> Self {
        Self { inner }
    }

    pub fn els(&self) -> &[Node] {
        &self.inner.els
    }

    pub fn models(&self) -> &ObjectRef {
        &self.inner.models
    }

    pub fn options(&self) -> &Rc<ViewOptions> {
        &self.inner.options
    }

    /// Bindings in bind order.
    pub fn bindings(&self) -> Vec<Rc<Binding>> {
        self.inner.bindings.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn bind(&self) -> Result<()> {
        let bindings = self.bindings();
        for binding in &bindings {
            binding.bind()?;
        }
        tracing::debug!(bindings = bindings.len(), "view bound");
        Ok(())
    }

    pub fn unbind(&self) {
        let bindings = self.bindings();
        for binding in &bindings {
            binding.unbind();
        }
        tracing::debug!(bindings = bindings.len(), "view unbound");
    }

    pub fn sync(&self) {
        for binding in self.bindings() {
            binding.sync();
        }
    }

    /// Publish every two-way binding.
    pub fn publish(&self) {
        for binding in self.bindings() {
            if binding.binder().flags().contains(BinderFlags::PUBLISHES) {
                binding.publish();
            }
        }
    }

    /// Copy `models` into this view's models and notify every binding.
    pub fn update(&self, models: &ObjectRef) {
        for key in models.keys() {
            self.inner.models.set(key.as_str(), models.get(&key));
        }
        for binding in self.bindings() {
            binding.update(models);
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("els", &self.inner.els.len())
            .field("bindings", &self.inner.bindings.borrow())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Build
// =============================================================================

struct Builder<'a> {
    view: Weak<ViewInner>,
    models: &'a ObjectRef,
    options: &'a Rc<ViewOptions>,
    bindings: Vec<Rc<Binding>>,
}

impl Builder<'_> {
    fn build_binding(
        &mut self,
        el: &Node,
        kind: Option<String>,
        declaration: &str,
        binder: Rc<dyn Binder>,
        arg: Option<String>,
    ) {
        let mut pipes = parser::split_declaration(declaration);
        let keypath = if pipes.is_empty() {
            String::new()
        } else {
            pipes.remove(0)
        };

        let binding = Binding::new(
            self.view.clone(),
            self.models.clone(),
            self.options.clone(),
            BindingSpec {
                el: el.clone(),
                kind,
                keypath,
                binder,
                arg,
                formatters: pipes,
            },
        );
        self.bindings.push(binding);
    }

    fn parse(&mut self, node: &Node) {
        let block = match node.node_type() {
            NodeType::Text => {
                self.parse_text(node);
                false
            }
            NodeType::Element => self.traverse(node),
            NodeType::Comment => false,
        };

        if !block {
            for child in node.children() {
                self.parse(&child);
            }
        }
    }

    fn parse_text(&mut self, node: &Node) {
        let Some(data) = node.data() else {
            return;
        };
        let Some(segments) = parser::parse_template(&data, self.options.delimiters()) else {
            return;
        };
        if segments.iter().all(|s| s.kind == SegmentKind::Text) {
            return;
        }
        let Some(parent) = node.parent() else {
            tracing::warn!(template = %data, "text template has no parent node");
            return;
        };

        for segment in segments {
            let text = Node::text(segment.value.as_str());
            parent.insert_before(&text, Some(node));
            if segment.kind == SegmentKind::Binding {
                self.build_binding(&text, None, &segment.value, Rc::new(TextNodeBinder), None);
            }
        }
        parent.remove_child(node);
    }

    /// Build bindings for the element's directives. Returns `true` when a
    /// block binder took over the subtree.
    fn traverse(&mut self, node: &Node) -> bool {
        let prefix = format!("{}-", self.options.prefix());
        let mut block = node.is_tag("script") || node.is_tag("style");
        let mut pending = Vec::new();

        for (name, value) in node.attributes() {
            let Some(kind) = name.strip_prefix(&prefix) else {
                continue;
            };
            let (binder, arg) = self.lookup(kind);

            if binder.flags().contains(BinderFlags::BLOCK) {
                self.build_binding(node, Some(kind.to_string()), &value, binder, arg);
                node.remove_attribute(&name);
                block = true;
                pending.clear();
                break;
            }
            pending.push((name.clone(), kind.to_string(), value, binder, arg));
        }

        for (name, kind, value, binder, arg) in pending {
            self.build_binding(node, Some(kind), &value, binder, arg);
            node.remove_attribute(&name);
        }
        block
    }

    /// Exact name, then wildcard binders, then the attribute fallback.
    fn lookup(&self, kind: &str) -> (Rc<dyn Binder>, Option<String>) {
        if let Some(binder) = self.options.binder(kind) {
            return (binder, None);
        }
        for pattern in self.options.star_binders() {
            if let Some(arg) = binders::match_wildcard(pattern, kind) {
                if let Some(binder) = self.options.binder(pattern) {
                    return (binder, Some(arg));
                }
            }
        }
        let fallback = self
            .options
            .binder("*")
            .unwrap_or_else(|| Rc::new(binders::basic::AttributeBinder));
        (fallback, None)
    }
}
