//! Two-way binders for form elements.
//!
//! Both listen for an element event and publish the element value back
//! through the binding's observer. The routine only touches the element
//! when the model value actually differs, so a publish that round-trips
//! through the model does not reset the element.

use std::cell::Cell;

use super::{Binder, BinderFlags};
use crate::binding::Binding;
use crate::dom::{ListenerId, Node};
use crate::value::Value;

#[derive(Default)]
struct PublishListener {
    radio: Cell<bool>,
    id: Cell<Option<ListenerId>>,
}

impl PublishListener {
    fn attach(&self, binding: &Binding, el: &Node, event: &str) {
        self.detach(el);
        let weak = binding.weak();
        let id = el.add_event_listener(event, move |_| {
            if let Some(binding) = weak.upgrade() {
                binding.publish();
            }
        });
        self.id.set(Some(id));
    }

    fn detach(&self, el: &Node) {
        if let Some(id) = self.id.take() {
            el.remove_event_listener(id);
        }
    }
}

/// `checked`: checkboxes follow truthiness, radios are checked when their
/// value equals the model value. Publishes on `change`.
#[derive(Debug, Default)]
pub struct CheckedBinder;

impl Binder for CheckedBinder {
    fn bind(&self, binding: &Binding, el: &Node) {
        binding.scratch::<PublishListener>().attach(binding, el, "change");
    }

    fn unbind(&self, binding: &Binding, el: &Node) {
        binding.scratch::<PublishListener>().detach(el);
    }

    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        if el.input_type() == "radio" {
            el.set_checked(el.value() == value.to_display_string());
        } else {
            el.set_checked(value.truthy());
        }
    }

    fn priority(&self) -> i32 {
        2000
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::PUBLISHES
    }
}

/// `value`: keeps the element value in step with the model.
///
/// Publishes on the event named by the element's `event-name` attribute,
/// else `change` for selects and `input` for everything else. Radio
/// buttons only get their `value` attribute set and never publish.
#[derive(Debug, Default)]
pub struct ValueBinder;

impl Binder for ValueBinder {
    fn bind(&self, binding: &Binding, el: &Node) {
        let listener = binding.scratch::<PublishListener>();
        let radio = el.is_tag("input") && el.input_type() == "radio";
        listener.radio.set(radio);
        if radio {
            return;
        }

        let default_event = if el.is_tag("select") { "change" } else { "input" };
        let event = el
            .attribute("event-name")
            .unwrap_or_else(|| default_event.to_string());
        listener.attach(binding, el, &event);
    }

    fn unbind(&self, binding: &Binding, el: &Node) {
        binding.scratch::<PublishListener>().detach(el);
    }

    fn routine(&self, binding: &Binding, el: &Node, value: &Value) {
        if binding.scratch::<PublishListener>().radio.get() {
            el.set_attribute("value", &value.to_display_string());
            return;
        }

        if el.input_type() == "select-multiple" {
            if let Value::Array(selected) = value {
                let selected: Vec<String> = selected.to_vec().iter().map(Value::to_display_string).collect();
                for option in el.options() {
                    option.set_selected(selected.contains(&option.value()));
                }
            }
            return;
        }

        let text = value.to_display_string();
        if text != el.value() {
            el.set_value(&text);
        }
    }

    fn priority(&self) -> i32 {
        3000
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::PUBLISHES
    }
}
