//! Binders - the directive implementations behind `rv-*` attributes.
//!
//! # Contract
//!
//! Every binder is a [`Binder`]: a required `routine` plus optional
//! lifecycle hooks with no-op defaults. Capabilities are static
//! [`BinderFlags`] and a priority:
//!
//! | Flag | Meaning |
//! |------|---------|
//! | `BLOCK` | owns the element's subtree (no descent, one attribute consumed) |
//! | `FUNCTION` | function values reach `routine` as-is instead of being called |
//! | `PUBLISHES` | takes part in [`View::publish`](crate::View::publish) |
//!
//! A bare routine closure is normalized into the same shape with
//! [`FnBinder`] when registered, so the engine never branches on how a
//! binder was written.
//!
//! # Modules
//!
//! - [`basic`] - attribute, text, visibility, class and event binders
//! - [`input`] - two-way `value` and `checked`
//! - [`control_flow`] - block binders `if` and `each-*`

pub mod basic;
pub mod control_flow;
pub mod input;

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::binding::Binding;
use crate::dom::{self, Node};
use crate::model::ObjectRef;
use crate::value::Value;

bitflags! {
    /// Static binder capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BinderFlags: u8 {
        const BLOCK = 1 << 0;
        const FUNCTION = 1 << 1;
        const PUBLISHES = 1 << 2;
    }
}

/// A directive implementation.
pub trait Binder {
    /// Apply `value` to `el`. Runs on every sync.
    fn routine(&self, binding: &Binding, el: &Node, value: &Value);

    /// Called once per bind, before the first sync.
    fn bind(&self, _binding: &Binding, _el: &Node) {}

    fn unbind(&self, _binding: &Binding, _el: &Node) {}

    /// The owning view's models were updated.
    fn update(&self, _binding: &Binding, _models: &ObjectRef) {}

    /// Element value read when publishing.
    fn get_value(&self, _binding: &Binding, el: &Node) -> Value {
        dom::input_value(el)
    }

    /// Higher binds first.
    fn priority(&self) -> i32 {
        0
    }

    fn flags(&self) -> BinderFlags {
        BinderFlags::empty()
    }
}

/// A binder that is only a routine.
///
/// ```
/// use spark_bind::{Binder, BinderFlags, FnBinder};
///
/// let binder = FnBinder::new(|el, value| el.set_attribute("title", &value.to_display_string()));
/// assert_eq!(binder.flags(), BinderFlags::empty());
/// assert_eq!(binder.priority(), 0);
/// ```
#[derive(Clone)]
pub struct FnBinder {
    routine: Rc<dyn Fn(&Node, &Value)>,
}

impl FnBinder {
    pub fn new(routine: impl Fn(&Node, &Value) + 'static) -> Self {
        Self {
            routine: Rc::new(routine),
        }
    }
}

impl Binder for FnBinder {
    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        (self.routine)(el, value)
    }
}

impl fmt::Debug for FnBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBinder").finish_non_exhaustive()
    }
}

/// Writes the data of a text node produced from a `{ template }`.
#[derive(Debug, Default)]
pub(crate) struct TextNodeBinder;

impl Binder for TextNodeBinder {
    fn routine(&self, _binding: &Binding, el: &Node, value: &Value) {
        el.set_text_content(&value.to_display_string());
    }
}

/// Match a directive type against a wildcard binder name.
///
/// The first `*` matches one or more characters, which are returned as the
/// binder argument: `each-*` matches `each-item` with argument `item`.
pub fn match_wildcard(pattern: &str, kind: &str) -> Option<String> {
    let (head, tail) = pattern.split_once('*')?;
    if kind.len() <= head.len() + tail.len() {
        return None;
    }
    let arg = kind.strip_prefix(head)?.strip_suffix(tail)?;
    Some(arg.to_string())
}

/// The default binder set.
pub fn defaults() -> Vec<(String, Rc<dyn Binder>)> {
    let binders: Vec<(&str, Rc<dyn Binder>)> = vec![
        ("*", Rc::new(basic::AttributeBinder)),
        ("text", Rc::new(basic::TextBinder)),
        ("show", Rc::new(basic::ShowBinder { visible_when: true })),
        ("hide", Rc::new(basic::ShowBinder { visible_when: false })),
        ("enabled", Rc::new(basic::DisabledBinder { disabled_when: false })),
        ("disabled", Rc::new(basic::DisabledBinder { disabled_when: true })),
        ("class-*", Rc::new(basic::ClassBinder)),
        ("on-*", Rc::new(basic::EventBinder)),
        ("checked", Rc::new(input::CheckedBinder)),
        ("value", Rc::new(input::ValueBinder)),
        ("if", Rc::new(control_flow::IfBinder)),
        ("each-*", Rc::new(control_flow::EachBinder)),
    ];
    binders
        .into_iter()
        .map(|(name, binder)| (name.to_string(), binder))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_wildcard() {
        assert_eq!(match_wildcard("each-*", "each-item"), Some("item".to_string()));
        assert_eq!(match_wildcard("on-*", "on-click"), Some("click".to_string()));
        assert_eq!(match_wildcard("on-*", "on-"), None);
        assert_eq!(match_wildcard("on-*", "each-item"), None);
        assert_eq!(match_wildcard("x-*-y", "x-a-y"), Some("a".to_string()));
        assert_eq!(match_wildcard("text", "text"), None);
    }

    #[test]
    fn test_default_flags() {
        let binders: std::collections::HashMap<_, _> = defaults().into_iter().collect();
        assert!(binders["if"].flags().contains(BinderFlags::BLOCK));
        assert!(binders["each-*"].flags().contains(BinderFlags::BLOCK));
        assert!(binders["on-*"].flags().contains(BinderFlags::FUNCTION));
        assert!(binders["value"].flags().contains(BinderFlags::PUBLISHES));
        assert!(binders["checked"].flags().contains(BinderFlags::PUBLISHES));
        assert!(binders["if"].priority() > binders["value"].priority());
        assert!(binders["value"].priority() > binders["checked"].priority());
        assert!(binders["checked"].priority() > binders["on-*"].priority());
        assert_eq!(binders["text"].priority(), 0);
    }
}
