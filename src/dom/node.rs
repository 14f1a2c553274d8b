//! Document nodes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::event::{Event, Listener, ListenerId};

/// Kind of a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
}

#[derive(Clone, Default)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    value: Option<String>,
    checked: bool,
    selected: bool,
    disabled: bool,
    styles: Vec<(String, String)>,
}

#[derive(Clone)]
enum Content {
    Element(ElementData),
    Text(String),
    Comment(String),
}

struct NodeData {
    content: Content,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<Node>,
    listeners: Vec<(ListenerId, String, Listener)>,
}

/// A shared handle to a document node.
///
/// Equality is identity: two handles are equal when they point at the same node.
///
/// # Example
///
/// ```
/// use spark_bind::Node;
///
/// let list = Node::element("ul")
///     .with_child(Node::element("li").with_child(Node::text("one")))
///     .with_child(Node::element("li").with_child(Node::text("two")));
///
/// assert_eq!(list.child_count(), 2);
/// assert_eq!(list.text_content(), "onetwo");
/// ```
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    fn from_content(content: Content) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            content,
            parent: Weak::new(),
            children: Vec::new(),
            listeners: Vec::new(),
        })))
    }

    /// Create an element. Tag names are stored lowercase.
    pub fn element(tag: &str) -> Self {
        Self::from_content(Content::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::from_content(Content::Text(data.into()))
    }

    pub fn comment(data: impl Into<String>) -> Self {
        Self::from_content(Content::Comment(data.into()))
    }

    /// Builder: set an attribute and return the node.
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: append a child and return the node.
    pub fn with_child(self, child: Node) -> Self {
        self.append_child(&child);
        self
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn node_type(&self) -> NodeType {
        match self.0.borrow().content {
            Content::Element(_) => NodeType::Element,
            Content::Text(_) => NodeType::Text,
            Content::Comment(_) => NodeType::Comment,
        }
    }

    /// Lowercase tag name for elements.
    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().content {
            Content::Element(el) => Some(el.tag.clone()),
            _ => None,
        }
    }

    /// Whether this is an element with the given (lowercase) tag.
    pub fn is_tag(&self, tag: &str) -> bool {
        matches!(&self.0.borrow().content, Content::Element(el) if el.tag == tag)
    }

    // =========================================================================
    // Tree
    // =========================================================================

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let siblings = parent.0.borrow();
        let index = siblings.children.iter().position(|c| c.ptr_eq(self))?;
        siblings.children.get(index + 1).cloned()
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of this node. The child is first detached from
    /// wherever it currently lives.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.ptr_eq(self) || reference.is_some_and(|r| r.ptr_eq(child)) {
            return;
        }
        child.detach();
        {
            let mut data = self.0.borrow_mut();
            let position = reference
                .and_then(|r| data.children.iter().position(|c| c.ptr_eq(r)))
                .unwrap_or(data.children.len());
            data.children.insert(position, child.clone());
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
    }

    /// Remove `child` from this node. Returns `false` if it was not a child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut data = self.0.borrow_mut();
            match data.children.iter().position(|c| c.ptr_eq(child)) {
                Some(index) => {
                    data.children.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    /// Remove this node from its parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Copy this node and its subtree. Listeners are not copied.
    pub fn deep_clone(&self) -> Node {
        let (content, children) = {
            let data = self.0.borrow();
            (data.content.clone(), data.children.clone())
        };
        let copy = Node::from_content(content);
        for child in children {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Character data of text and comment nodes.
    pub fn data(&self) -> Option<String> {
        match &self.0.borrow().content {
            Content::Text(s) | Content::Comment(s) => Some(s.clone()),
            Content::Element(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.content {
            Content::Text(s) | Content::Comment(s) => s.clone(),
            Content::Element(_) => data
                .children
                .iter()
                .filter(|c| c.node_type() != NodeType::Comment)
                .map(Node::text_content)
                .collect(),
        }
    }

    /// Replace character data, or an element's children with one text node.
    pub fn set_text_content(&self, text: &str) {
        let old_children = {
            let mut guard = self.0.borrow_mut();
            let data = &mut *guard;
            match &mut data.content {
                Content::Text(s) | Content::Comment(s) => {
                    *s = text.to_string();
                    return;
                }
                Content::Element(_) => std::mem::take(&mut data.children),
            }
        };
        for child in old_children {
            child.0.borrow_mut().parent = Weak::new();
        }
        if !text.is_empty() {
            self.append_child(&Node::text(text));
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    fn with_element<R>(&self, f: impl FnOnce(&ElementData) -> R) -> Option<R> {
        match &self.0.borrow().content {
            Content::Element(el) => Some(f(el)),
            _ => None,
        }
    }

    fn with_element_mut<R>(&self, f: impl FnOnce(&mut ElementData) -> R) -> Option<R> {
        match &mut self.0.borrow_mut().content {
            Content::Element(el) => Some(f(el)),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.with_element(|el| {
            el.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
        .flatten()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Snapshot of `(name, value)` pairs in document order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.with_element(|el| el.attributes.clone())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.with_element_mut(|el| {
            match el.attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attributes.push((name.to_string(), value.to_string())),
            }
        });
    }

    pub fn remove_attribute(&self, name: &str) {
        self.with_element_mut(|el| el.attributes.retain(|(k, _)| k != name));
    }

    // =========================================================================
    // Form properties
    // =========================================================================

    /// `checkbox`, `radio`, `select-one`, `select-multiple`, `textarea`, the
    /// lowercase `type` attribute of other inputs (default `text`), or an
    /// empty string for non-form elements.
    pub fn input_type(&self) -> String {
        let Some(tag) = self.tag_name() else {
            return String::new();
        };
        match tag.as_str() {
            "input" => self
                .attribute("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string()),
            "select" if self.has_attribute("multiple") => "select-multiple".to_string(),
            "select" => "select-one".to_string(),
            "textarea" => "textarea".to_string(),
            _ => String::new(),
        }
    }

    /// Option elements below a select, in document order.
    pub fn options(&self) -> Vec<Node> {
        let mut found = Vec::new();
        for child in self.children() {
            if child.is_tag("option") {
                found.push(child);
            } else if child.node_type() == NodeType::Element {
                found.extend(child.options());
            }
        }
        found
    }

    /// The assigned value of an option, else its `value` attribute, else
    /// its text.
    fn option_value(&self) -> String {
        self.with_element(|el| el.value.clone())
            .flatten()
            .or_else(|| self.attribute("value"))
            .unwrap_or_else(|| self.text_content())
    }

    /// Current value. Selects report their selected option.
    pub fn value(&self) -> String {
        if self.is_tag("select") {
            let options = self.options();
            return options
                .iter()
                .find(|o| o.selected())
                .or_else(|| options.first())
                .map(Node::option_value)
                .unwrap_or_default();
        }
        if self.is_tag("option") {
            return self.option_value();
        }
        self.with_element(|el| {
            el.value
                .clone()
                .or_else(|| {
                    el.attributes
                        .iter()
                        .find(|(k, _)| k == "value")
                        .map(|(_, v)| v.clone())
                })
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Set the current value. Selects select the first matching option.
    pub fn set_value(&self, value: &str) {
        if self.is_tag("select") {
            let mut matched = false;
            for option in self.options() {
                let hit = !matched && option.option_value() == value;
                matched |= hit;
                option.set_selected(hit);
            }
            return;
        }
        self.with_element_mut(|el| el.value = Some(value.to_string()));
    }

    pub fn checked(&self) -> bool {
        self.with_element(|el| el.checked).unwrap_or(false)
    }

    pub fn set_checked(&self, checked: bool) {
        self.with_element_mut(|el| el.checked = checked);
    }

    pub fn selected(&self) -> bool {
        self.with_element(|el| el.selected).unwrap_or(false)
    }

    pub fn set_selected(&self, selected: bool) {
        self.with_element_mut(|el| el.selected = selected);
    }

    pub fn disabled(&self) -> bool {
        self.with_element(|el| el.disabled).unwrap_or(false)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.with_element_mut(|el| el.disabled = disabled);
    }

    /// Inline style property.
    pub fn style(&self, name: &str) -> Option<String> {
        self.with_element(|el| {
            el.styles
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
        .flatten()
    }

    /// Set an inline style property. An empty value removes it.
    pub fn set_style(&self, name: &str, value: &str) {
        self.with_element_mut(|el| {
            el.styles.retain(|(k, _)| k != name);
            if !value.is_empty() {
                el.styles.push((name.to_string(), value.to_string()));
            }
        });
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event_listener(&self, kind: &str, listener: impl Fn(&Event) + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.0
            .borrow_mut()
            .listeners
            .push((id, kind.to_string(), Rc::new(listener)));
        id
    }

    /// Returns `false` if no listener with `id` was registered here.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.listeners.len();
        data.listeners.retain(|(lid, _, _)| *lid != id);
        data.listeners.len() != before
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.0
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| k == kind)
            .count()
    }

    /// Call every listener registered for `event.kind`, in registration order.
    pub fn dispatch_event(&self, event: &Event) {
        let listeners: Vec<Listener> = self
            .0
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == event.kind)
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.content {
            Content::Element(el) => f
                .debug_struct("Element")
                .field("tag", &el.tag)
                .field("attributes", &el.attributes)
                .field("children", &data.children.len())
                .finish(),
            Content::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Content::Comment(s) => f.debug_tuple("Comment").field(s).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_remove() {
        let parent = Node::element("div");
        let a = Node::text("a");
        let b = Node::text("b");
        let c = Node::text("c");

        parent.append_child(&a);
        parent.append_child(&c);
        parent.insert_before(&b, Some(&c));
        assert_eq!(parent.text_content(), "abc");
        assert!(a.next_sibling().is_some_and(|n| n == b));
        assert!(c.next_sibling().is_none());

        assert!(parent.remove_child(&b));
        assert!(b.parent().is_none());
        assert!(!parent.remove_child(&b));
        assert_eq!(parent.text_content(), "ac");
    }

    #[test]
    fn test_insert_moves_existing_child() {
        let parent = Node::element("div");
        let a = Node::text("a");
        let b = Node::text("b");
        parent.append_child(&a);
        parent.append_child(&b);

        parent.insert_before(&b, Some(&a));
        assert_eq!(parent.text_content(), "ba");
        assert_eq!(parent.child_count(), 2);
    }

    #[test]
    fn test_deep_clone_is_detached() {
        let original = Node::element("li")
            .with_attr("class", "item")
            .with_child(Node::text("x"));
        let holder = Node::element("ul").with_child(original.clone());

        let copy = original.deep_clone();
        assert!(copy.parent().is_none());
        assert_eq!(copy.attribute("class").as_deref(), Some("item"));
        assert_eq!(copy.text_content(), "x");
        assert!(copy != original);
        assert_eq!(holder.child_count(), 1);
    }

    #[test]
    fn test_set_text_content() {
        let el = Node::element("p").with_child(Node::element("b").with_child(Node::text("old")));
        el.set_text_content("new");
        assert_eq!(el.child_count(), 1);
        assert_eq!(el.text_content(), "new");

        el.set_text_content("");
        assert_eq!(el.child_count(), 0);
    }

    #[test]
    fn test_select_value() {
        let select = Node::element("select")
            .with_child(Node::element("option").with_attr("value", "a"))
            .with_child(Node::element("option").with_child(Node::text("b")));

        assert_eq!(select.input_type(), "select-one");
        assert_eq!(select.value(), "a");

        select.set_value("b");
        assert_eq!(select.value(), "b");
        assert!(!select.options()[0].selected());
    }

    #[test]
    fn test_input_value_defaults_to_attribute() {
        let input = Node::element("input").with_attr("value", "init");
        assert_eq!(input.input_type(), "text");
        assert_eq!(input.value(), "init");
        input.set_value("typed");
        assert_eq!(input.value(), "typed");
    }

    #[test]
    fn test_event_listeners() {
        let button = Node::element("button");
        let clicks = Rc::new(Cell::new(0));
        let clicks_clone = clicks.clone();

        let id = button.add_event_listener("click", move |_| clicks_clone.set(clicks_clone.get() + 1));
        button.dispatch_event(&Event::new("click"));
        button.dispatch_event(&Event::new("input"));
        assert_eq!(clicks.get(), 1);

        assert!(button.remove_event_listener(id));
        button.dispatch_event(&Event::new("click"));
        assert_eq!(clicks.get(), 1);
        assert_eq!(button.listener_count("click"), 0);
    }
}
