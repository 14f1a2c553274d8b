//! Formatters - named value transforms used in binding declarations.
//!
//! ```text
//! { price | currency 'EUR' | default '-' }
//!           ^^^^^^^^^^^^^^   ^^^^^^^^^^^^^
//! ```
//!
//! On display, formatters run left to right through [`Formatter::read`].
//! When a two-way binder publishes, they run right to left through
//! [`Formatter::publish`]; formatters without an inverse pass the value on
//! unchanged.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// `(value, args) -> value`.
pub type FormatterFn = Rc<dyn Fn(&Value, &[Value]) -> Value>;

/// A display transform with an optional inverse.
#[derive(Clone)]
pub struct Formatter {
    read: FormatterFn,
    publish: Option<FormatterFn>,
}

impl Formatter {
    /// Read-only formatter.
    pub fn new(read: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        Self {
            read: Rc::new(read),
            publish: None,
        }
    }

    /// Attach the inverse used when publishing.
    pub fn with_publish(mut self, publish: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        self.publish = Some(Rc::new(publish));
        self
    }

    pub fn read(&self, value: &Value, args: &[Value]) -> Value {
        (self.read)(value, args)
    }

    pub fn publish(&self, value: &Value, args: &[Value]) -> Value {
        match &self.publish {
            Some(publish) => publish(value, args),
            None => value.clone(),
        }
    }

    pub fn has_publish(&self) -> bool {
        self.publish.is_some()
    }
}

impl<F> From<F> for Formatter
where
    F: Fn(&Value, &[Value]) -> Value + 'static,
{
    fn from(read: F) -> Self {
        Formatter::new(read)
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("publish", &self.has_publish())
            .finish_non_exhaustive()
    }
}

/// Built-in formatters.
///
/// - `not` / `negate`: boolean negation of truthiness
/// - `watch`: identity; its arguments are observed, adding dependencies
pub fn defaults() -> Vec<(String, Formatter)> {
    let not = Formatter::new(|value, _| Value::Bool(!value.truthy()));
    vec![
        ("not".to_string(), not.clone()),
        ("negate".to_string(), not),
        ("watch".to_string(), Formatter::new(|value, _| value.clone())),
    ]
}
