//! Shared model objects.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Handle;
use crate::value::Value;

/// Called after an intercepted property is written: `(object, key, old, new)`.
pub type Interceptor = Rc<dyn Fn(&ObjectRef, &str, &Value, &Value)>;

/// Accessor property getter.
pub type Getter = Rc<dyn Fn() -> Value>;

/// Accessor property setter.
pub type Setter = Rc<dyn Fn(Value)>;

enum Property {
    /// Plain stored value, optionally intercepted by one or more adapters.
    Data {
        value: Value,
        interceptors: Vec<(Handle, Interceptor)>,
    },
    /// Externally managed property. Adapters read and write it directly.
    Accessor { get: Getter, set: Option<Setter> },
}

struct ObjectInner {
    handle: Handle,
    properties: RefCell<Vec<(String, Property)>>,
}

/// A shared, mutable model object.
///
/// Writes through [`ObjectRef::set`] run the interceptors installed on that
/// key after the new value is stored, with no borrow held, so interceptors
/// may freely read and write the model again.
///
/// # Example
///
/// ```
/// use spark_bind::{ObjectRef, Value};
///
/// let user = ObjectRef::new();
/// user.set("name", "Ada");
/// assert_eq!(user.get("name").to_display_string(), "Ada");
/// assert!(user.get("missing").is_undefined());
/// ```
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectInner>);

impl ObjectRef {
    /// Create an empty object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            handle: Handle::next(),
            properties: RefCell::new(Vec::new()),
        }))
    }

    /// Create an object from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::new();
        for (key, value) in pairs {
            object.set(key.into(), value.into());
        }
        object
    }

    /// Identity handle of this object.
    pub fn handle(&self) -> Handle {
        self.0.handle
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property. Missing keys read as `undefined`.
    pub fn get(&self, key: &str) -> Value {
        let getter = {
            let properties = self.0.properties.borrow();
            match properties.iter().find(|(k, _)| k == key) {
                Some((_, Property::Data { value, .. })) => return value.clone(),
                Some((_, Property::Accessor { get, .. })) => get.clone(),
                None => return Value::Undefined,
            }
        };
        getter()
    }

    /// Write a property, running any interceptors installed on it.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        enum Write {
            Stored,
            Intercepted(Value, Vec<Interceptor>),
            Accessor(Option<Setter>),
        }

        let write = {
            let mut properties = self.0.properties.borrow_mut();
            match properties.iter_mut().find(|(k, _)| *k == key) {
                Some((_, Property::Data { value: slot, interceptors })) => {
                    let old = std::mem::replace(slot, value.clone());
                    if interceptors.is_empty() {
                        Write::Stored
                    } else {
                        let hooks = interceptors.iter().map(|(_, hook)| hook.clone()).collect();
                        Write::Intercepted(old, hooks)
                    }
                }
                Some((_, Property::Accessor { set, .. })) => Write::Accessor(set.clone()),
                None => {
                    properties.push((
                        key.clone(),
                        Property::Data {
                            value: value.clone(),
                            interceptors: Vec::new(),
                        },
                    ));
                    Write::Stored
                }
            }
        };

        match write {
            Write::Stored => {}
            Write::Intercepted(old, hooks) => {
                for hook in hooks {
                    hook(self, &key, &old, &value);
                }
            }
            Write::Accessor(Some(setter)) => setter(value),
            Write::Accessor(None) => {}
        }
    }

    /// Whether the object defines `key` (as data or accessor).
    pub fn has(&self, key: &str) -> bool {
        self.0.properties.borrow().iter().any(|(k, _)| k == key)
    }

    /// Property names in definition order.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .properties
            .borrow()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.properties.borrow().len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.0.properties.borrow().is_empty()
    }

    /// Define a read/write accessor property, replacing any existing property.
    pub fn define_accessor(
        &self,
        key: impl Into<String>,
        get: impl Fn() -> Value + 'static,
        set: impl Fn(Value) + 'static,
    ) {
        self.define(
            key.into(),
            Property::Accessor {
                get: Rc::new(get),
                set: Some(Rc::new(set)),
            },
        );
    }

    /// Define a read-only accessor property. Writes are ignored.
    pub fn define_getter(&self, key: impl Into<String>, get: impl Fn() -> Value + 'static) {
        self.define(
            key.into(),
            Property::Accessor {
                get: Rc::new(get),
                set: None,
            },
        );
    }

    fn define(&self, key: String, property: Property) {
        let mut properties = self.0.properties.borrow_mut();
        match properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = property,
            None => properties.push((key, property)),
        }
    }

    /// Whether `key` is an accessor property.
    pub fn is_accessor(&self, key: &str) -> bool {
        self.0
            .properties
            .borrow()
            .iter()
            .any(|(k, p)| k == key && matches!(p, Property::Accessor { .. }))
    }

    /// Install `hook` on `key` on behalf of `owner`.
    ///
    /// Returns `false` without installing anything when `owner` already
    /// intercepts the key or the key is an accessor property. A missing key
    /// is created with an `undefined` value.
    pub fn intercept(&self, key: &str, owner: Handle, hook: Interceptor) -> bool {
        let mut properties = self.0.properties.borrow_mut();
        match properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, Property::Accessor { .. })) => false,
            Some((_, Property::Data { interceptors, .. })) => {
                if interceptors.iter().any(|(h, _)| *h == owner) {
                    return false;
                }
                interceptors.push((owner, hook));
                true
            }
            None => {
                properties.push((
                    key.to_string(),
                    Property::Data {
                        value: Value::Undefined,
                        interceptors: vec![(owner, hook)],
                    },
                ));
                true
            }
        }
    }

    /// Remove the interceptor `owner` installed on `key`. Returns whether
    /// one was removed.
    pub fn release(&self, key: &str, owner: Handle) -> bool {
        let mut properties = self.0.properties.borrow_mut();
        let Some((_, Property::Data { interceptors, .. })) = properties.iter_mut().find(|(k, _)| k == key) else {
            return false;
        };
        let before = interceptors.len();
        interceptors.retain(|(h, _)| *h != owner);
        interceptors.len() != before
    }

    /// Number of interceptors installed on `key`.
    pub fn interceptor_count(&self, key: &str) -> usize {
        self.0
            .properties
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| match p {
                Property::Data { interceptors, .. } => interceptors.len(),
                Property::Accessor { .. } => 0,
            })
            .unwrap_or(0)
    }

    /// The enclosing scope object stored under `$parent`, if any.
    pub fn parent_scope(&self) -> Option<ObjectRef> {
        match self.get("$parent") {
            Value::Object(parent) => Some(parent),
            _ => None,
        }
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("handle", &self.0.handle.raw())
            .field("keys", &self.keys())
            .finish()
    }
}
