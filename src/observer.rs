//! Keypath observers.
//!
//! An [`Observer`] follows one keypath such as `user.address.city` through
//! the model graph. Every intermediate link is subscribed with the observer
//! itself, so reassigning `user.address` re-resolves the chain; the terminal
//! `(container, key)` pair is subscribed with the caller's callback.
//!
//! ```text
//! root --user--> {..} --address--> {..} --city--> "Paris"
//!        |                |                  |
//!        observer         observer           callback
//! ```
//!
//! A link whose container is not observable (null, a primitive, missing)
//! is *unreached*: everything past it is released and the value reads as
//! undefined until the graph changes shape again.

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use crate::adapter::{Adapter, AdapterRegistry, Subscriber, SubscriberRef};
use crate::error::{Error, Result};
use crate::model::ObjectRef;
use crate::value::Value;

/// One segment of a keypath and the interface that reaches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeypathToken {
    pub interface: char,
    pub path: String,
}

/// Split `keypath` on any registered interface character.
///
/// A leading interface character selects the root interface; otherwise
/// `root` is used. Returns the intermediate tokens and the terminal key.
pub fn tokenize(keypath: &str, interfaces: &[char], root: char) -> (Vec<KeypathToken>, KeypathToken) {
    let mut chars = keypath.chars().peekable();
    let mut interface = root;
    if let Some(first) = chars.peek().copied() {
        if interfaces.contains(&first) {
            interface = first;
            chars.next();
        }
    }

    let mut tokens = Vec::new();
    let mut current = KeypathToken {
        interface,
        path: String::new(),
    };
    for c in chars {
        if interfaces.contains(&c) {
            let next = KeypathToken {
                interface: c,
                path: String::new(),
            };
            tokens.push(mem::replace(&mut current, next));
        } else {
            current.path.push(c);
        }
    }

    (tokens, current)
}

#[derive(Default)]
struct State {
    /// Container recorded at each reached intermediate link.
    object_path: Vec<Value>,
    /// Container holding the terminal key, or a non-observable value.
    target: Value,
}

/// Resolution state machine for one keypath.
pub struct Observer {
    me: Weak<Observer>,
    keypath: String,
    root: ObjectRef,
    tokens: Vec<KeypathToken>,
    key: KeypathToken,
    callback: SubscriberRef,
    adapters: Rc<AdapterRegistry>,
    state: RefCell<State>,
}

impl Observer {
    /// Resolve `keypath` against `models` and subscribe `callback` to it.
    ///
    /// When `models` has a `$parent` chain, the root is the closest scope
    /// defining the first path segment.
    pub fn new(
        models: &ObjectRef,
        keypath: &str,
        callback: SubscriberRef,
        adapters: Rc<AdapterRegistry>,
        root_interface: char,
    ) -> Result<Rc<Self>> {
        if adapters.is_empty() {
            return Err(Error::NoAdapterInterfaces);
        }
        if !adapters.contains_key(&root_interface) {
            return Err(Error::UnknownInterface(root_interface));
        }

        let interfaces: Vec<char> = adapters.keys().copied().collect();
        let (tokens, key) = tokenize(keypath, &interfaces, root_interface);
        let root = root_object(models, tokens.first().unwrap_or(&key));

        let observer = Rc::new_cyclic(|me| Observer {
            me: me.clone(),
            keypath: keypath.to_string(),
            root,
            tokens,
            key,
            callback,
            adapters,
            state: RefCell::new(State::default()),
        });

        let target = observer.realize();
        if target.is_observable() {
            observer.adapter(&observer.key).observe(&target, &observer.key.path, &observer.callback);
        }
        observer.state.borrow_mut().target = target;

        Ok(observer)
    }

    pub fn keypath(&self) -> &str {
        &self.keypath
    }

    /// Scope object resolution starts from.
    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    /// Container holding the terminal key (undefined when unreachable).
    pub fn target(&self) -> Value {
        self.state.borrow().target.clone()
    }

    /// Current terminal value.
    pub fn value(&self) -> Value {
        let target = self.target();
        if target.is_observable() {
            self.adapter(&self.key).get(&target, &self.key.path)
        } else {
            Value::Undefined
        }
    }

    /// Write the terminal value. Ignored while the path is unreachable.
    pub fn set_value(&self, value: Value) {
        let target = self.target();
        if target.is_observable() {
            self.adapter(&self.key).set(&target, &self.key.path, value);
        }
    }

    /// Release every subscription held by this observer.
    pub fn unobserve(&self) {
        let State { object_path, target } = mem::take(&mut *self.state.borrow_mut());
        let me = self.subscriber();

        for (token, object) in self.tokens.iter().zip(&object_path) {
            self.adapter(token).unobserve(object, &token.path, &me);
        }
        if target.is_observable() {
            self.adapter(&self.key).unobserve(&target, &self.key.path, &self.callback);
        }
    }

    fn adapter(&self, token: &KeypathToken) -> &Rc<dyn Adapter> {
        // Tokens only ever carry registered interfaces, checked in `new`.
        &self.adapters[&token.interface]
    }

    fn subscriber(&self) -> SubscriberRef {
        let weak: Weak<dyn Subscriber> = self.me.clone();
        SubscriberRef::from_weak(weak)
    }

    /// Walk the intermediate links, moving subscriptions only where the
    /// container changed. Returns the container for the terminal key.
    fn realize(&self) -> Value {
        let mut object_path = mem::take(&mut self.state.borrow_mut().object_path);
        let me = self.subscriber();
        let mut current = Value::Object(self.root.clone());
        let mut unreached = None;

        for (i, token) in self.tokens.iter().enumerate() {
            let adapter = self.adapter(token);
            if current.is_observable() {
                match object_path.get(i) {
                    Some(previous) if previous.same(&current) => {}
                    Some(previous) => {
                        adapter.unobserve(previous, &token.path, &me);
                        adapter.observe(&current, &token.path, &me);
                        object_path[i] = current.clone();
                    }
                    None => {
                        adapter.observe(&current, &token.path, &me);
                        object_path.push(current.clone());
                    }
                }
                current = adapter.get(&current, &token.path);
            } else {
                unreached.get_or_insert(i);
                if let Some(previous) = object_path.get(i) {
                    adapter.unobserve(previous, &token.path, &me);
                }
            }
        }

        if let Some(index) = unreached {
            object_path.truncate(index);
        }
        self.state.borrow_mut().object_path = object_path;
        current
    }
}

impl Subscriber for Observer {
    /// An intermediate link changed: re-resolve and move the terminal
    /// subscription if the target container changed.
    fn sync(&self) {
        let next = self.realize();
        let target = self.target();

        if !next.same(&target) {
            let adapter = self.adapter(&self.key);
            if target.is_observable() {
                adapter.unobserve(&target, &self.key.path, &self.callback);
            }
            if next.is_observable() {
                adapter.observe(&next, &self.key.path, &self.callback);
            }

            let old = self.value();
            self.state.borrow_mut().target = next;
            let new = self.value();

            tracing::trace!(keypath = %self.keypath, "target re-resolved");
            if !new.same(&old) || new.is_function() {
                self.callback.sync();
            }
        } else if matches!(next, Value::Array(_)) {
            self.callback.sync();
        }
    }
}

/// Closest scope along the `$parent` chain that defines `token`.
fn root_object(models: &ObjectRef, token: &KeypathToken) -> ObjectRef {
    let mut current = models.clone();
    while let Some(parent) = current.parent_scope() {
        if !current.get(&token.path).is_undefined() {
            break;
        }
        current = parent;
    }
    current
}
