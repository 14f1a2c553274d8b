//! Bindings - one live directive on one node.
//!
//! # Lifecycle
//!
//! ```text
//! unbound --bind()--> bound --sync()/publish()--> bound --unbind()--> unbound
//! ```
//!
//! - `bind` resolves the declaration to a literal or an [`Observer`], runs
//!   the binder's `bind` hook and syncs when data is preloaded
//! - `sync` reads the value, calls it if it is a function (unless the binder
//!   takes functions), runs the formatters left to right and hands the
//!   result to the binder's routine
//! - `publish` reads the element value, runs formatter inverses right to
//!   left and writes the result through the observer
//! - `unbind` runs the binder's `unbind` hook and releases every observer,
//!   including the ones created for keypath formatter arguments
//!
//! A binding is its observer's callback: model changes call
//! [`Subscriber::sync`] on it directly.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::adapter::{Subscriber, SubscriberRef};
use crate::binders::{Binder, BinderFlags};
use crate::dom::Node;
use crate::error::Result;
use crate::model::ObjectRef;
use crate::observer::Observer;
use crate::options::ViewOptions;
use crate::parser::{self, Token};
use crate::value::Value;
use crate::view::{View, ViewInner};

/// Everything the view parsed out of one directive.
pub(crate) struct BindingSpec {
    pub el: Node,
    pub kind: Option<String>,
    pub keypath: String,
    pub binder: Rc<dyn Binder>,
    pub arg: Option<String>,
    pub formatters: Vec<String>,
}

pub struct Binding {
    me: Weak<Binding>,
    view: Weak<ViewInner>,
    models: ObjectRef,
    options: Rc<ViewOptions>,
    el: Node,
    kind: Option<String>,
    keypath: String,
    binder: Rc<dyn Binder>,
    arg: Option<String>,
    formatters: Vec<String>,
    observer: RefCell<Option<Rc<Observer>>>,
    literal: RefCell<Value>,
    model: RefCell<Value>,
    /// Observers for keypath formatter arguments, by (formatter, argument).
    formatter_observers: RefCell<HashMap<(usize, usize), Rc<Observer>>>,
    scratch: RefCell<Option<Rc<dyn Any>>>,
    bound: Cell<bool>,
}

impl Binding {
    pub(crate) fn new(
        view: Weak<ViewInner>,
        models: ObjectRef,
        options: Rc<ViewOptions>,
        spec: BindingSpec,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Binding {
            me: me.clone(),
            view,
            models,
            options,
            el: spec.el,
            kind: spec.kind,
            keypath: spec.keypath,
            binder: spec.binder,
            arg: spec.arg,
            formatters: spec.formatters,
            observer: RefCell::new(None),
            literal: RefCell::new(Value::Undefined),
            model: RefCell::new(Value::Undefined),
            formatter_observers: RefCell::new(HashMap::new()),
            scratch: RefCell::new(None),
            bound: Cell::new(false),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn el(&self) -> &Node {
        &self.el
    }

    /// Directive type without the prefix: `text`, `on-click`, `each-item`.
    /// `None` for text template bindings.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn keypath(&self) -> &str {
        &self.keypath
    }

    /// Wildcard argument: `click` for `on-click`.
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    pub fn formatters(&self) -> &[String] {
        &self.formatters
    }

    /// Container the keypath resolved into; `this` for function values.
    pub fn model(&self) -> Value {
        self.model.borrow().clone()
    }

    /// The owning view's models.
    pub fn models(&self) -> ObjectRef {
        self.models.clone()
    }

    pub fn options(&self) -> &Rc<ViewOptions> {
        &self.options
    }

    pub fn binder(&self) -> &Rc<dyn Binder> {
        &self.binder
    }

    pub fn view(&self) -> Option<View> {
        self.view.upgrade().map(View::from_inner)
    }

    pub fn weak(&self) -> Weak<Binding> {
        self.me.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.observer.borrow().clone()
    }

    /// Per-binding binder state, created on first use.
    ///
    /// Binders keep their own state type here; the slot holds one value.
    pub fn scratch<T: Default + 'static>(&self) -> Rc<T> {
        let mut slot = self.scratch.borrow_mut();
        if let Some(existing) = slot.clone() {
            if let Ok(state) = existing.downcast::<T>() {
                return state;
            }
        }
        let state = Rc::new(T::default());
        *slot = Some(state.clone() as Rc<dyn Any>);
        state
    }

    fn subscriber(&self) -> SubscriberRef {
        let weak: Weak<dyn Subscriber> = self.me.clone();
        SubscriberRef::from_weak(weak)
    }

    fn observe(&self, keypath: &str) -> Result<Rc<Observer>> {
        Observer::new(
            &self.models,
            keypath,
            self.subscriber(),
            self.options.adapters().clone(),
            self.options.root_interface(),
        )
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn parse_target(&self) -> Result<()> {
        match parser::parse_type(&self.keypath) {
            Token::Primitive(value) => {
                *self.literal.borrow_mut() = value;
            }
            Token::Keypath(keypath) => {
                let observer = self.observe(&keypath)?;
                *self.model.borrow_mut() = observer.target();
                *self.observer.borrow_mut() = Some(observer);
            }
        }
        Ok(())
    }

    pub fn bind(&self) -> Result<()> {
        if self.observer.borrow().is_none() {
            self.parse_target()?;
        }
        self.bound.set(true);
        self.binder.bind(self, &self.el);
        if self.options.preload_data() {
            self.sync();
        }
        Ok(())
    }

    pub fn unbind(&self) {
        self.binder.unbind(self, &self.el);
        let observer = self.observer.borrow_mut().take();
        if let Some(observer) = observer {
            observer.unobserve();
        }
        let formatter_observers = std::mem::take(&mut *self.formatter_observers.borrow_mut());
        for observer in formatter_observers.into_values() {
            observer.unobserve();
        }
        self.bound.set(false);
    }

    /// Read the current value and apply it.
    pub fn sync(&self) {
        let observer = self.observer();
        let value = match &observer {
            Some(observer) => {
                *self.model.borrow_mut() = observer.target();
                observer.value()
            }
            None => self.literal.borrow().clone(),
        };
        self.set(value);
    }

    fn set(&self, value: Value) {
        let called = match &value {
            Value::Function(f) if !self.binder.flags().contains(BinderFlags::FUNCTION) => {
                Some(f.call(&self.model(), &[]))
            }
            _ => None,
        };
        let value = self.formatted_value(called.unwrap_or(value));
        self.binder.routine(self, &self.el, &value);
    }

    /// Write the element value back to the model.
    pub fn publish(&self) {
        let Some(observer) = self.observer() else {
            return;
        };

        let mut value = self.binder.get_value(self, &self.el);
        for (index, declaration) in self.formatters.iter().enumerate().rev() {
            let mut args = parser::formatter_args(declaration);
            if args.is_empty() {
                continue;
            }
            let name = args.remove(0);
            if let Some(formatter) = self.options.formatter(&name) {
                let args = self.formatter_arguments(&args, index);
                value = formatter.publish(&value, &args);
            }
        }

        observer.set_value(value);
    }

    /// The owning view's models changed.
    pub fn update(&self, models: &ObjectRef) {
        if let Some(observer) = self.observer() {
            *self.model.borrow_mut() = observer.target();
        }
        self.binder.update(self, models);
    }

    // =========================================================================
    // Formatters
    // =========================================================================

    fn formatted_value(&self, mut value: Value) -> Value {
        for (index, declaration) in self.formatters.iter().enumerate() {
            let mut args = parser::formatter_args(declaration);
            if args.is_empty() {
                continue;
            }
            let name = args.remove(0);
            match self.options.formatter(&name) {
                Some(formatter) => {
                    let args = self.formatter_arguments(&args, index);
                    value = formatter.read(&value, &args);
                }
                None => {
                    tracing::warn!(formatter = %name, keypath = %self.keypath, "unknown formatter");
                }
            }
        }
        value
    }

    /// Literal arguments pass through; keypaths get a cached observer so
    /// the binding also resyncs when they change.
    fn formatter_arguments(&self, args: &[String], formatter: usize) -> Vec<Value> {
        args.iter()
            .enumerate()
            .map(|(index, arg)| match parser::parse_type(arg) {
                Token::Primitive(value) => value,
                Token::Keypath(keypath) => self.formatter_observer(formatter, index, &keypath),
            })
            .collect()
    }

    fn formatter_observer(&self, formatter: usize, index: usize, keypath: &str) -> Value {
        let cached = self.formatter_observers.borrow().get(&(formatter, index)).cloned();
        if let Some(observer) = cached {
            return observer.value();
        }
        match self.observe(keypath) {
            Ok(observer) => {
                let value = observer.value();
                self.formatter_observers
                    .borrow_mut()
                    .insert((formatter, index), observer);
                value
            }
            Err(err) => {
                tracing::warn!(keypath, error = %err, "formatter argument not observable");
                Value::Undefined
            }
        }
    }
}

impl Subscriber for Binding {
    fn sync(&self) {
        Binding::sync(self);
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("kind", &self.kind)
            .field("keypath", &self.keypath)
            .field("arg", &self.arg)
            .field("formatters", &self.formatters)
            .field("bound", &self.bound.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binders::FnBinder;
    use crate::options::Options;
    use crate::value::Value;

    fn binding(models: &ObjectRef, keypath: &str, formatters: &[&str], options: &Options) -> (Rc<Binding>, Node) {
        let el = Node::element("span");
        let options = options.resolve().unwrap();
        let binder = Rc::new(FnBinder::new(|el, value| el.set_attribute("data-out", &value.to_display_string())));
        let binding = Binding::new(
            Weak::new(),
            models.clone(),
            options,
            BindingSpec {
                el: el.clone(),
                kind: Some("out".into()),
                keypath: keypath.into(),
                binder,
                arg: None,
                formatters: formatters.iter().map(|s| s.to_string()).collect(),
            },
        );
        (binding, el)
    }

    #[test]
    fn test_literal_binding() {
        let models = ObjectRef::new();
        let (binding, el) = binding(&models, "'hello'", &[], &Options::new());
        binding.bind().unwrap();
        assert_eq!(el.attribute("data-out").as_deref(), Some("hello"));
        assert!(binding.observer().is_none());
    }

    #[test]
    fn test_keypath_binding_follows_model() {
        let models = ObjectRef::from_pairs([("name", "Ada")]);
        let (binding, el) = binding(&models, "name", &[], &Options::new());
        binding.bind().unwrap();
        assert_eq!(el.attribute("data-out").as_deref(), Some("Ada"));

        models.set("name", "Grace");
        assert_eq!(el.attribute("data-out").as_deref(), Some("Grace"));

        binding.unbind();
        models.set("name", "Linus");
        assert_eq!(el.attribute("data-out").as_deref(), Some("Grace"));
    }

    #[test]
    fn test_preload_disabled() {
        let models = ObjectRef::from_pairs([("name", "Ada")]);
        let (binding, el) = binding(&models, "name", &[], &Options::new().preload_data(false));
        binding.bind().unwrap();
        assert!(el.attribute("data-out").is_none());

        binding.sync();
        assert_eq!(el.attribute("data-out").as_deref(), Some("Ada"));
    }

    #[test]
    fn test_function_values_are_called_with_model() {
        let user = ObjectRef::from_pairs([("first", "Ada")]);
        let full = Value::function(|this, _| {
            let first = this.as_object().map(|o| o.get("first")).unwrap_or_default();
            Value::from(format!("{} Lovelace", first.to_display_string()))
        });
        user.set("full", full);
        let models = ObjectRef::from_pairs([("user", user)]);

        let (binding, el) = binding(&models, "user.full", &[], &Options::new());
        binding.bind().unwrap();
        assert_eq!(el.attribute("data-out").as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_formatter_pipeline_and_arguments() {
        let options = Options::new()
            .formatter("suffix", |v: &Value, args: &[Value]| {
                Value::from(format!("{}{}", v.to_display_string(), args[0].to_display_string()))
            })
            .formatter("upper", |v: &Value, _: &[Value]| Value::from(v.to_display_string().to_uppercase()));
        let models = ObjectRef::from_pairs([("name", "ada"), ("mark", "!")]);

        let (binding, el) = binding(&models, "name", &["upper", "suffix mark", "missing"], &options);
        binding.bind().unwrap();
        assert_eq!(el.attribute("data-out").as_deref(), Some("ADA!"));

        // Keypath arguments are observed
        models.set("mark", "?");
        assert_eq!(el.attribute("data-out").as_deref(), Some("ADA?"));

        binding.unbind();
        models.set("mark", ".");
        assert_eq!(el.attribute("data-out").as_deref(), Some("ADA?"));
    }

    #[test]
    fn test_publish_runs_inverses_right_to_left() {
        let options = Options::new()
            .formatter(
                "add",
                crate::formatters::Formatter::new(|v, args| {
                    Value::from(v.as_number().unwrap_or(0.0) + args[0].as_number().unwrap_or(0.0))
                })
                .with_publish(|v, args| {
                    let n = v.to_display_string().parse::<f64>().unwrap_or(0.0);
                    Value::from(n - args[0].as_number().unwrap_or(0.0))
                }),
            )
            .formatter(
                "double",
                crate::formatters::Formatter::new(|v, _| Value::from(v.as_number().unwrap_or(0.0) * 2.0))
                    .with_publish(|v, _| Value::from(v.as_number().unwrap_or(0.0) / 2.0)),
            );
        let models = ObjectRef::from_pairs([("n", 1)]);
        let el = Node::element("input");
        let binding = Binding::new(
            Weak::new(),
            models.clone(),
            options.resolve().unwrap(),
            BindingSpec {
                el: el.clone(),
                kind: Some("value".into()),
                keypath: "n".into(),
                binder: crate::binders::defaults()
                    .into_iter()
                    .find(|(name, _)| name == "value")
                    .map(|(_, b)| b)
                    .unwrap(),
                arg: None,
                formatters: vec!["double".into(), "add 1".into()],
            },
        );
        binding.bind().unwrap();
        assert_eq!(el.value(), "3");

        // (9 - 1) / 2
        el.set_value("9");
        binding.publish();
        assert_eq!(models.get("n"), Value::from(4));
    }

    #[test]
    fn test_scratch_is_per_binding() {
        let models = ObjectRef::new();
        let (binding, _) = binding(&models, "x", &[], &Options::new());
        let counter = binding.scratch::<Cell<u32>>();
        counter.set(3);
        assert_eq!(binding.scratch::<Cell<u32>>().get(), 3);
    }
}
