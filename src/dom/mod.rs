//! Document tree - the UI nodes bindings are applied to.
//!
//! A deliberately small document model: elements with attributes, form
//! properties and inline styles, text and comment nodes, and synchronous
//! event dispatch. The binding engine mutates this tree in place; there is
//! no virtual tree and no diffing layer.

mod event;
mod node;

pub use event::*;
pub use node::*;

use crate::value::Value;

/// Default element-value extraction used when publishing.
///
/// - checkbox: its checked state
/// - select-multiple: array of the selected options' values
/// - anything else: the string value
pub fn input_value(el: &Node) -> Value {
    match el.input_type().as_str() {
        "checkbox" => Value::Bool(el.checked()),
        "select-multiple" => Value::from(
            el.options()
                .iter()
                .filter(|o| o.selected())
                .map(|o| Value::from(o.value()))
                .collect::<Vec<_>>(),
        ),
        _ => Value::from(el.value()),
    }
}
