//! Configuration.
//!
//! # Layers
//!
//! - [`Settings`] - plain scalar settings, deserializable from JSON
//! - [`Options`] - builder: settings plus binder, formatter and adapter
//!   registrations and an optional event handler
//! - [`ViewOptions`] - the resolved snapshot a view (and every nested view
//!   built from it) holds; registrations are merged over the defaults and
//!   validated once
//!
//! Registrations are never global. Two views resolved from different
//! options never see each other's binders, formatters or adapters. The one
//! shared piece is the thread's default `.` adapter
//! ([`PropertyAdapter::shared`]), which keeps a model observed by several
//! views instrumented once.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::adapter::{Adapter, AdapterRegistry, PropertyAdapter};
use crate::binders::{self, Binder, FnBinder};
use crate::binding::Binding;
use crate::dom::{Event, Node};
use crate::error::{Error, Result};
use crate::formatters::{self, Formatter};
use crate::value::{FunctionRef, Value};

/// Calls a bound event function: `(function, event, binding)`.
pub type EventHandler = Rc<dyn Fn(&FunctionRef, &Event, &Binding)>;

// =============================================================================
// Settings
// =============================================================================

/// Scalar settings.
///
/// Every field is optional when deserializing:
///
/// ```
/// use spark_bind::Settings;
///
/// let settings = Settings::from_json(r#"{ "prefix": "data", "templateDelimiters": ["{{", "}}"] }"#).unwrap();
/// assert_eq!(settings.prefix, "data");
/// assert_eq!(settings.template_delimiters.0, "{{");
/// assert!(settings.preload_data);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Directive attribute prefix: `rv-text`, `rv-on-click`.
    pub prefix: String,
    /// Text template open/close delimiters.
    pub template_delimiters: (String, String),
    /// Interface used when a keypath has no interface prefix.
    pub root_interface: char,
    /// Sync every binding as soon as it is bound.
    pub preload_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: "rv".to_string(),
            template_delimiters: ("{".to_string(), "}".to_string()),
            root_interface: '.',
            preload_data: true,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// Options builder
// =============================================================================

/// Builder for a view configuration.
///
/// ```
/// use spark_bind::{Options, Value};
///
/// let options = Options::new()
///     .prefix("data")
///     .formatter("upper", |v: &Value, _: &[Value]| Value::from(v.to_display_string().to_uppercase()));
/// let resolved = options.resolve().unwrap();
/// assert!(resolved.formatter("upper").is_some());
/// assert!(resolved.binder("text").is_some());
/// ```
#[derive(Clone, Default)]
pub struct Options {
    settings: Settings,
    binders: Vec<(String, Rc<dyn Binder>)>,
    formatters: Vec<(String, Formatter)>,
    adapters: Vec<(String, Rc<dyn Adapter>)>,
    handler: Option<EventHandler>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.prefix = prefix.into();
        self
    }

    pub fn template_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.settings.template_delimiters = (open.into(), close.into());
        self
    }

    pub fn root_interface(mut self, interface: char) -> Self {
        self.settings.root_interface = interface;
        self
    }

    pub fn preload_data(mut self, preload: bool) -> Self {
        self.settings.preload_data = preload;
        self
    }

    /// Replace the default event handler used by `on-*`.
    pub fn handler(mut self, handler: impl Fn(&FunctionRef, &Event, &Binding) + 'static) -> Self {
        self.handler = Some(Rc::new(handler));
        self
    }

    /// Register (or override) a binder.
    pub fn binder(mut self, name: impl Into<String>, binder: impl Binder + 'static) -> Self {
        self.binders.push((name.into(), Rc::new(binder)));
        self
    }

    /// Register a binder that only has a routine.
    pub fn binder_fn(
        self,
        name: impl Into<String>,
        routine: impl Fn(&Node, &Value) + 'static,
    ) -> Self {
        self.binder(name, FnBinder::new(routine))
    }

    /// Register (or override) a formatter.
    pub fn formatter(mut self, name: impl Into<String>, formatter: impl Into<Formatter>) -> Self {
        self.formatters.push((name.into(), formatter.into()));
        self
    }

    /// Register an adapter for a one-character interface.
    pub fn adapter(mut self, interface: impl Into<String>, adapter: Rc<dyn Adapter>) -> Self {
        self.adapters.push((interface.into(), adapter));
        self
    }

    /// Merge registrations over the defaults and validate the result.
    pub fn resolve(&self) -> Result<Rc<ViewOptions>> {
        let (open, close) = &self.settings.template_delimiters;
        if open.is_empty() || close.is_empty() {
            return Err(Error::InvalidDelimiters);
        }

        let mut binders: HashMap<String, Rc<dyn Binder>> = binders::defaults().into_iter().collect();
        for (name, binder) in &self.binders {
            if name.is_empty() {
                return Err(Error::UnnamedRegistration { kind: "binder" });
            }
            binders.insert(name.clone(), binder.clone());
        }

        let mut formatters: HashMap<String, Formatter> = formatters::defaults().into_iter().collect();
        for (name, formatter) in &self.formatters {
            if name.is_empty() {
                return Err(Error::UnnamedRegistration { kind: "formatter" });
            }
            formatters.insert(name.clone(), formatter.clone());
        }

        let mut adapters = AdapterRegistry::new();
        for (name, adapter) in &self.adapters {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(interface), None) => {
                    adapters.insert(interface, adapter.clone());
                }
                (None, _) => return Err(Error::UnnamedRegistration { kind: "adapter" }),
                _ => return Err(Error::InvalidInterface(name.clone())),
            }
        }
        if !self.adapters.iter().any(|(name, _)| name == ".") {
            adapters.insert('.', PropertyAdapter::shared());
        }

        let root = self.settings.root_interface;
        if !adapters.contains_key(&root) {
            return Err(Error::UnknownInterface(root));
        }

        let mut star_binders: Vec<String> = binders
            .keys()
            .filter(|name| name.find('*').is_some_and(|i| i > 0))
            .cloned()
            .collect();
        star_binders.sort();
        star_binders.sort_by_key(|name| std::cmp::Reverse(name.len()));

        tracing::debug!(
            binders = binders.len(),
            formatters = formatters.len(),
            adapters = adapters.len(),
            "options resolved"
        );

        Ok(Rc::new(ViewOptions {
            settings: self.settings.clone(),
            binders,
            star_binders,
            formatters,
            adapters: Rc::new(adapters),
            handler: self.handler.clone().unwrap_or_else(default_handler),
        }))
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("settings", &self.settings)
            .field("binders", &self.binders.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("formatters", &self.formatters.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("adapters", &self.adapters.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Calls the function with the binding's model as `this` and
/// `[event, view models]` as arguments.
fn default_handler() -> EventHandler {
    Rc::new(|function, event, binding| {
        let models = Value::Object(binding.models());
        function.call(&binding.model(), &[event.to_value(), models]);
    })
}

// =============================================================================
// Resolved snapshot
// =============================================================================

/// Resolved, validated configuration shared by a view tree.
#[derive(Clone)]
pub struct ViewOptions {
    settings: Settings,
    binders: HashMap<String, Rc<dyn Binder>>,
    star_binders: Vec<String>,
    formatters: HashMap<String, Formatter>,
    adapters: Rc<AdapterRegistry>,
    handler: EventHandler,
}

impl ViewOptions {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prefix(&self) -> &str {
        &self.settings.prefix
    }

    pub fn delimiters(&self) -> (&str, &str) {
        let (open, close) = &self.settings.template_delimiters;
        (open, close)
    }

    pub fn root_interface(&self) -> char {
        self.settings.root_interface
    }

    pub fn preload_data(&self) -> bool {
        self.settings.preload_data
    }

    pub fn binder(&self, name: &str) -> Option<Rc<dyn Binder>> {
        self.binders.get(name).cloned()
    }

    /// Wildcard binder names, longest first.
    pub fn star_binders(&self) -> &[String] {
        &self.star_binders
    }

    pub fn formatter(&self, name: &str) -> Option<&Formatter> {
        self.formatters.get(name)
    }

    pub fn adapters(&self) -> &Rc<AdapterRegistry> {
        &self.adapters
    }

    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    /// Options for views built by block binders: same registrations, data
    /// always preloaded.
    pub fn nested(self: &Rc<Self>) -> Rc<ViewOptions> {
        if self.settings.preload_data {
            return self.clone();
        }
        let mut nested = (**self).clone();
        nested.settings.preload_data = true;
        Rc::new(nested)
    }
}

impl fmt::Debug for ViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut binders: Vec<_> = self.binders.keys().collect();
        binders.sort();
        f.debug_struct("ViewOptions")
            .field("settings", &self.settings)
            .field("binders", &binders)
            .field("star_binders", &self.star_binders)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArrayRef, ObjectRef};

    #[test]
    fn test_settings_defaults_and_json() {
        let settings = Settings::default();
        assert_eq!(settings.prefix, "rv");
        assert_eq!(settings.root_interface, '.');

        let parsed = Settings::from_json(r#"{"rootInterface": ":", "preloadData": false}"#).unwrap();
        assert_eq!(parsed.root_interface, ':');
        assert!(!parsed.preload_data);
        assert_eq!(parsed.prefix, "rv");

        assert!(matches!(Settings::from_json("{"), Err(Error::Settings(_))));
    }

    #[test]
    fn test_resolve_defaults() {
        let options = Options::new().resolve().unwrap();
        for name in ["*", "text", "value", "checked", "if", "each-*", "on-*", "class-*"] {
            assert!(options.binder(name).is_some(), "missing binder {name}");
        }
        assert!(options.formatter("not").is_some());
        assert!(options.adapters().contains_key(&'.'));
        assert_eq!(options.delimiters(), ("{", "}"));
    }

    #[test]
    fn test_star_binders_longest_first() {
        let options = Options::new()
            .binder_fn("on-key-*", |_, _| {})
            .binder_fn("*-suffix", |_, _| {})
            .resolve()
            .unwrap();

        let stars = options.star_binders();
        assert_eq!(stars[0], "on-key-*");
        assert!(stars.iter().any(|s| s == "each-*"));
        assert!(stars.iter().all(|s| s != "*"));
        assert!(stars.iter().all(|s| s != "*-suffix"));
    }

    #[test]
    fn test_resolve_rejects_bad_registrations() {
        let unnamed = Options::new().binder_fn("", |_, _| {}).resolve();
        assert!(matches!(unnamed, Err(Error::UnnamedRegistration { kind: "binder" })));

        let unnamed = Options::new().formatter("", |v: &Value, _: &[Value]| v.clone()).resolve();
        assert!(matches!(unnamed, Err(Error::UnnamedRegistration { kind: "formatter" })));

        let long = Options::new().adapter("::", Rc::new(PropertyAdapter::new())).resolve();
        assert!(matches!(long, Err(Error::InvalidInterface(_))));

        let unknown = Options::new().root_interface(':').resolve();
        assert!(matches!(unknown, Err(Error::UnknownInterface(':'))));

        let delimiters = Options::new().template_delimiters("", "}").resolve();
        assert!(matches!(delimiters, Err(Error::InvalidDelimiters)));
    }

    #[test]
    fn test_default_adapter_is_shared() {
        let first = Options::new().resolve().unwrap();
        let second = Options::new().prefix("data").resolve().unwrap();
        assert!(Rc::ptr_eq(&first.adapters()[&'.'], &second.adapters()[&'.']));

        let explicit = Options::new().adapter(".", Rc::new(PropertyAdapter::new())).resolve().unwrap();
        assert!(!Rc::ptr_eq(&first.adapters()[&'.'], &explicit.adapters()[&'.']));
    }

    #[test]
    fn test_two_views_instrument_a_key_once() {
        let model = ObjectRef::from_pairs([("name", "a")]);
        let left = Node::element("span").with_attr("rv-text", "name");
        let right = Node::element("span").with_attr("rv-text", "name");

        let left_view = crate::bind([left.clone()], model.clone(), Options::new()).unwrap();
        let right_view = crate::bind([right.clone()], model.clone(), Options::new()).unwrap();
        assert_eq!(model.interceptor_count("name"), 1);

        model.set("name", "b");
        assert_eq!((left.text_content(), right.text_content()), ("b".to_string(), "b".to_string()));

        left_view.unbind();
        assert_eq!(model.interceptor_count("name"), 1);
        right_view.unbind();
        assert_eq!(model.interceptor_count("name"), 0);
    }

    #[test]
    fn test_bind_unbind_cycles_leave_no_instrumentation() {
        let items = ArrayRef::from_vec(vec![Value::from(1)]);
        let model = ObjectRef::from_pairs([("items", items.clone())]);
        let options = Options::new();

        for _ in 0..100 {
            let el = Node::element("p").with_attr("rv-text", "items.length");
            let view = crate::bind([el], model.clone(), options.clone()).unwrap();
            view.unbind();
        }
        assert_eq!(model.interceptor_count("items"), 0);
        assert_eq!(items.hook_count(), 0);
    }

    #[test]
    fn test_nested_options_preload() {
        let options = Options::new().preload_data(false).resolve().unwrap();
        let nested = options.nested();
        assert!(nested.preload_data());
        assert!(Rc::ptr_eq(nested.adapters(), options.adapters()));

        let preloaded = Options::new().resolve().unwrap();
        assert!(Rc::ptr_eq(&preloaded.nested(), &preloaded));
    }
}
