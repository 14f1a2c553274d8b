//! One-way binders: attributes, text, visibility, classes and events.

use std::cell::Cell;

use super::{Binder, BinderFlags};
use crate::binding::Binding;
use crate::dom::{ListenerId, Node};
use crate::value::Value;

/// `*` fallback: sets the attribute named by the directive type, removes it
/// for null and undefined.
#[derive(Debug, Default)]
pub struct AttributeBinder;

impl Binder for AttributeBinder {
    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        let Some(name) = binding.kind() else {
            return;
        };
        if value.is_nullish() {
            el.remove_attribute(name);
        } else {
            el.set_attribute(name, &value.to_string());
        }
    }
}

/// `text`
#[derive(Debug, Default)]
pub struct TextBinder;

impl Binder for TextBinder {
    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        el.set_text_content(&value.to_display_string());
    }
}

/// `show` and `hide`: toggles `display: none`.
#[derive(Debug)]
pub struct ShowBinder {
    pub visible_when: bool,
}

impl Binder for ShowBinder {
    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        let visible = value.truthy() == self.visible_when;
        el.set_style("display", if visible { "" } else { "none" });
    }
}

/// `enabled` and `disabled`.
#[derive(Debug)]
pub struct DisabledBinder {
    pub disabled_when: bool,
}

impl Binder for DisabledBinder {
    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        el.set_disabled(value.truthy() == self.disabled_when);
    }
}

/// `class-*`: adds or removes the class named by the argument.
#[derive(Debug, Default)]
pub struct ClassBinder;

impl Binder for ClassBinder {
    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        let Some(class) = binding.arg() else {
            return;
        };
        let current = el.attribute("class").unwrap_or_default();
        let mut classes: Vec<&str> = current.split_whitespace().collect();
        let present = classes.contains(&class);

        if value.truthy() == present {
            return;
        }
        if present {
            classes.retain(|c| *c != class);
        } else {
            classes.push(class);
        }
        el.set_attribute("class", &classes.join(" "));
    }
}

#[derive(Default)]
struct ListenerSlot(Cell<Option<ListenerId>>);

impl ListenerSlot {
    fn detach(&self, el: &Node) {
        if let Some(id) = self.0.take() {
            el.remove_event_listener(id);
        }
    }
}

/// `on-*`: calls the bound function through the configured event handler.
///
/// Re-attaches on every routine so the listener always calls the current
/// function.
#[derive(Debug, Default)]
pub struct EventBinder;

impl Binder for EventBinder {
    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        let slot = binding.scratch::<ListenerSlot>();
        slot.detach(el);

        let (Some(event), Value::Function(function)) = (binding.arg(), value) else {
            return;
        };
        let function = function.clone();
        let weak = binding.weak();
        let id = el.add_event_listener(event, move |event| {
            if let Some(binding) = weak.upgrade() {
                let handler = binding.options().handler().clone();
                handler(&function, event, &binding);
            }
        });
        slot.0.set(Some(id));
    }

    fn unbind(&self, binding: &Binding, el: &Node) {
        binding.scratch::<ListenerSlot>().detach(el);
    }

    fn priority(&self) -> i32 {
        1000
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::FUNCTION
    }
}
