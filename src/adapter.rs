//! Adapters - observe, read and write one path segment of a model container.
//!
//! An [`Adapter`] is registered per path-interface character (`.` is the
//! default). Observers call it once per keypath token to subscribe to, read
//! and write that segment.
//!
//! # Default adapter
//!
//! [`PropertyAdapter`] keeps a side table keyed by container [`Handle`]:
//!
//! ```text
//! handle -> { callbacks: key -> [subscriber], pointers: owner handle -> [key] }
//! ```
//!
//! - `callbacks` are the subscribers observing `key` on that container
//! - `pointers` only exist on arrays: which `(owner, key)` properties
//!   currently hold this array, so a `push` can fan out to them. Keypaths
//!   that reach into an array (`list.length`) are refreshed by their
//!   observer, which holds the array through an owning property.
//!
//! An entry is removed as soon as both maps are empty. Nothing else ever
//! removes entries, so every `observe` must be paired with an `unobserve`.
//!
//! Instrumentation follows the table: a key's interceptor is removed when
//! its last subscriber leaves, and an array's hook when no property holds
//! it. Observing again reinstalls them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::model::{ArrayRef, Handle, Interceptor, MutationHook, ObjectRef};
use crate::value::Value;

// =============================================================================
// Subscribers
// =============================================================================

/// Anything that wants to hear about changes.
pub trait Subscriber {
    fn sync(&self);
}

/// Weak, identity-compared subscriber handle stored in adapter tables.
///
/// Tables never keep subscribers alive. Syncing a dropped subscriber is a no-op.
#[derive(Clone)]
pub struct SubscriberRef(Weak<dyn Subscriber>);

impl SubscriberRef {
    pub fn new<S: Subscriber + 'static>(subscriber: &Rc<S>) -> Self {
        let weak: Weak<S> = Rc::downgrade(subscriber);
        Self(weak)
    }

    pub fn from_weak(weak: Weak<dyn Subscriber>) -> Self {
        Self(weak)
    }

    pub fn sync(&self) {
        if let Some(subscriber) = self.0.upgrade() {
            subscriber.sync();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for SubscriberRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SubscriberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberRef({:p})", self.0.as_ptr())
    }
}

// =============================================================================
// Adapter contract
// =============================================================================

/// Strategy for one path-interface character.
///
/// `obj` is always an observable container (object or array); adapters
/// ignore anything else.
pub trait Adapter {
    /// Subscribe `subscriber` to changes of `obj[key]`. Idempotent.
    fn observe(&self, obj: &Value, key: &str, subscriber: &SubscriberRef);

    /// Remove a subscription made by [`observe`](Adapter::observe).
    fn unobserve(&self, obj: &Value, key: &str, subscriber: &SubscriberRef);

    fn get(&self, obj: &Value, key: &str) -> Value;

    fn set(&self, obj: &Value, key: &str, value: Value);
}

/// Adapters by interface character.
pub type AdapterRegistry = HashMap<char, Rc<dyn Adapter>>;

// =============================================================================
// PropertyAdapter
// =============================================================================

#[derive(Default)]
struct Entry {
    callbacks: HashMap<String, Vec<SubscriberRef>>,
    pointers: HashMap<Handle, Vec<String>>,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.callbacks.is_empty() && self.pointers.is_empty()
    }
}

struct Shared {
    owner: Handle,
    table: RefCell<HashMap<Handle, Entry>>,
}

impl Shared {
    fn cleanup(&self, handle: Handle) {
        let mut table = self.table.borrow_mut();
        if table.get(&handle).is_some_and(Entry::is_empty) {
            table.remove(&handle);
        }
    }

    fn has_callbacks(&self, handle: Handle, key: &str) -> bool {
        self.table
            .borrow()
            .get(&handle)
            .is_some_and(|entry| entry.callbacks.contains_key(key))
    }

    fn is_subscribed(&self, handle: Handle, key: &str, subscriber: &SubscriberRef) -> bool {
        self.table
            .borrow()
            .get(&handle)
            .and_then(|entry| entry.callbacks.get(key))
            .is_some_and(|subs| subs.contains(subscriber))
    }

    /// Install the fan-out hook on `array`, once per adapter.
    fn instrument(self: &Rc<Self>, array: &ArrayRef) {
        if array.is_instrumented(self.owner) {
            return;
        }
        let weak = Rc::downgrade(self);
        let hook: MutationHook = Rc::new(move |array| {
            if let Some(shared) = weak.upgrade() {
                shared.fan_out(array);
            }
        });
        array.instrument(self.owner, hook);
    }

    /// Record that `(owner, key)` now points at `value` if it is an array.
    fn observe_mutations(self: &Rc<Self>, value: &Value, owner: Handle, key: &str) {
        let Value::Array(array) = value else {
            return;
        };
        {
            let mut table = self.table.borrow_mut();
            let keys = table
                .entry(array.handle())
                .or_default()
                .pointers
                .entry(owner)
                .or_default();
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        self.instrument(array);
    }

    fn unobserve_mutations(&self, value: &Value, owner: Handle, key: &str) {
        let Value::Array(array) = value else {
            return;
        };
        {
            let mut table = self.table.borrow_mut();
            let Some(entry) = table.get_mut(&array.handle()) else {
                return;
            };
            if let Some(keys) = entry.pointers.get_mut(&owner) {
                keys.retain(|k| k != key);
                if keys.is_empty() {
                    entry.pointers.remove(&owner);
                }
            }
        }
        self.release_hook(array);
        self.cleanup(array.handle());
    }

    /// Remove the fan-out hook once no property holds `array` any more.
    fn release_hook(&self, array: &ArrayRef) {
        let held = self
            .table
            .borrow()
            .get(&array.handle())
            .is_some_and(|entry| !entry.pointers.is_empty());
        if !held {
            array.release(self.owner);
        }
    }

    /// Sync every subscriber of `(handle, key)`.
    ///
    /// Works on a snapshot, skipping subscribers removed by an earlier
    /// subscriber in the same pass.
    fn notify(&self, handle: Handle, key: &str) {
        let subscribers = self
            .table
            .borrow()
            .get(&handle)
            .and_then(|entry| entry.callbacks.get(key))
            .cloned()
            .unwrap_or_default();

        for subscriber in subscribers {
            if self.is_subscribed(handle, key, &subscriber) {
                subscriber.sync();
            }
        }
    }

    /// Array mutation: notify every property currently holding the array.
    fn fan_out(&self, array: &ArrayRef) {
        let targets: Vec<(Handle, String)> = {
            let table = self.table.borrow();
            let Some(entry) = table.get(&array.handle()) else {
                return;
            };
            entry
                .pointers
                .iter()
                .flat_map(|(owner, keys)| keys.iter().map(move |k| (*owner, k.clone())))
                .collect()
        };

        tracing::trace!(array = array.handle().raw(), targets = targets.len(), "array mutation");
        for (handle, key) in targets {
            self.notify(handle, &key);
        }
    }

    /// Interceptor body: runs after `object[key]` was written.
    fn on_write(self: &Rc<Self>, object: &ObjectRef, key: &str, old: &Value, new: &Value) {
        if old.same(new) && !new.is_function() {
            return;
        }

        self.unobserve_mutations(old, object.handle(), key);
        if !self.has_callbacks(object.handle(), key) {
            return;
        }

        tracing::trace!(object = object.handle().raw(), key, "property changed");
        self.notify(object.handle(), key);

        if self.has_callbacks(object.handle(), key) {
            self.observe_mutations(new, object.handle(), key);
        }
    }
}

thread_local! {
    /// Default `.` adapter every resolved option set on this thread shares.
    static DEFAULT_ADAPTER: Rc<PropertyAdapter> = Rc::new(PropertyAdapter::new());
}

/// Default adapter for the `.` interface.
///
/// Intercepts plain object properties and tracks array mutations. Accessor
/// properties are treated as externally managed: they are read and written
/// directly and never intercepted.
pub struct PropertyAdapter {
    shared: Rc<Shared>,
}

impl PropertyAdapter {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                owner: Handle::next(),
                table: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The thread's default adapter.
    ///
    /// Views resolved without an explicit `.` adapter all use this one, so a
    /// model bound by several views carries one interceptor per key.
    pub fn shared() -> Rc<Self> {
        DEFAULT_ADAPTER.with(Rc::clone)
    }

    /// Handle this adapter uses when instrumenting containers.
    pub fn handle(&self) -> Handle {
        self.shared.owner
    }

    /// Number of containers with bookkeeping entries.
    pub fn tracked_objects(&self) -> usize {
        self.shared.table.borrow().len()
    }

    /// Whether the container with `handle` has a bookkeeping entry.
    pub fn is_tracking(&self, handle: Handle) -> bool {
        self.shared.table.borrow().contains_key(&handle)
    }

    /// Number of subscribers registered on `obj[key]`.
    pub fn subscriber_count(&self, obj: &Value, key: &str) -> usize {
        let Some(handle) = container_handle(obj) else {
            return 0;
        };
        self.shared
            .table
            .borrow()
            .get(&handle)
            .and_then(|entry| entry.callbacks.get(key))
            .map_or(0, Vec::len)
    }

    fn interceptor(&self) -> Interceptor {
        let weak = Rc::downgrade(&self.shared);
        Rc::new(move |object, key, old, new| {
            if let Some(shared) = weak.upgrade() {
                shared.on_write(object, key, old, new);
            }
        })
    }
}

impl Default for PropertyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAdapter")
            .field("handle", &self.shared.owner.raw())
            .field("tracked_objects", &self.tracked_objects())
            .finish()
    }
}

fn container_handle(obj: &Value) -> Option<Handle> {
    match obj {
        Value::Object(o) => Some(o.handle()),
        Value::Array(a) => Some(a.handle()),
        _ => None,
    }
}

fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok()
}

impl Adapter for PropertyAdapter {
    fn observe(&self, obj: &Value, key: &str, subscriber: &SubscriberRef) {
        let Some(handle) = container_handle(obj) else {
            return;
        };

        let first = {
            let mut table = self.shared.table.borrow_mut();
            let entry = table.entry(handle).or_default();
            let first = !entry.callbacks.contains_key(key);
            let subscribers = entry.callbacks.entry(key.to_string()).or_default();
            if !subscribers.contains(subscriber) {
                subscribers.push(subscriber.clone());
            }
            first
        };

        match obj {
            Value::Object(object) => {
                if first {
                    object.intercept(key, self.shared.owner, self.interceptor());
                }
                self.shared.observe_mutations(&object.get(key), handle, key);
            }
            Value::Array(array) => self.shared.instrument(array),
            _ => {}
        }
    }

    fn unobserve(&self, obj: &Value, key: &str, subscriber: &SubscriberRef) {
        let Some(handle) = container_handle(obj) else {
            return;
        };

        let emptied = {
            let mut table = self.shared.table.borrow_mut();
            let Some(entry) = table.get_mut(&handle) else {
                return;
            };
            let Some(subscribers) = entry.callbacks.get_mut(key) else {
                return;
            };
            subscribers.retain(|s| s != subscriber);
            if subscribers.is_empty() {
                entry.callbacks.remove(key);
                true
            } else {
                false
            }
        };

        if emptied {
            match obj {
                Value::Object(object) => {
                    object.release(key, self.shared.owner);
                    self.shared.unobserve_mutations(&object.get(key), handle, key);
                }
                Value::Array(array) => self.shared.release_hook(array),
                _ => {}
            }
        }
        self.shared.cleanup(handle);
    }

    fn get(&self, obj: &Value, key: &str) -> Value {
        match obj {
            Value::Object(object) => object.get(key),
            Value::Array(array) if key == "length" => Value::from(array.len()),
            Value::Array(array) => array_index(key).map_or(Value::Undefined, |i| array.get(i)),
            _ => Value::Undefined,
        }
    }

    fn set(&self, obj: &Value, key: &str, value: Value) {
        match obj {
            Value::Object(object) => object.set(key, value),
            Value::Array(array) => {
                if let Some(index) = array_index(key) {
                    array.set(index, value);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter(Cell<usize>);

    impl Subscriber for Counter {
        fn sync(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    impl Counter {
        fn count(&self) -> usize {
            self.0.get()
        }
    }

    fn counter() -> (Rc<Counter>, SubscriberRef) {
        let counter = Rc::new(Counter::default());
        let subscriber = SubscriberRef::new(&counter);
        (counter, subscriber)
    }

    #[test]
    fn test_observe_is_idempotent() {
        let adapter = PropertyAdapter::new();
        let object = ObjectRef::from_pairs([("a", 1)]);
        let obj = Value::Object(object.clone());
        let (first, first_ref) = counter();
        let (second, second_ref) = counter();
        let (_third, third_ref) = counter();

        adapter.observe(&obj, "a", &first_ref);
        adapter.observe(&obj, "a", &first_ref);
        assert_eq!(object.interceptor_count("a"), 1);
        assert_eq!(adapter.subscriber_count(&obj, "a"), 1);

        adapter.observe(&obj, "a", &second_ref);
        adapter.observe(&obj, "a", &third_ref);
        adapter.unobserve(&obj, "a", &third_ref);
        assert_eq!(adapter.subscriber_count(&obj, "a"), 2);
        assert_eq!(object.interceptor_count("a"), 1);

        object.set("a", 2);
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);
    }

    #[test]
    fn test_notifies_only_on_change() {
        let adapter = PropertyAdapter::new();
        let object = ObjectRef::from_pairs([("a", 1)]);
        let obj = Value::Object(object.clone());
        let (counter, subscriber) = counter();
        adapter.observe(&obj, "a", &subscriber);

        object.set("a", 1);
        assert_eq!(counter.count(), 0);
        object.set("a", 2);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_functions_always_notify() {
        let adapter = PropertyAdapter::new();
        let f = Value::function(|_, _| Value::from(1));
        let object = ObjectRef::from_pairs([("f", f.clone())]);
        let obj = Value::Object(object.clone());
        let (counter, subscriber) = counter();
        adapter.observe(&obj, "f", &subscriber);

        object.set("f", f.clone());
        object.set("f", f);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_array_mutations_fan_out() {
        let adapter = PropertyAdapter::new();
        let items = ArrayRef::from_vec(vec![Value::from(1)]);
        let object = ObjectRef::from_pairs([("items", items.clone())]);
        let obj = Value::Object(object.clone());
        let (counter, subscriber) = counter();
        adapter.observe(&obj, "items", &subscriber);

        items.push(2);
        items.pop();
        items.shift();
        items.splice(0, 0, vec![Value::from(9)]);
        assert_eq!(counter.count(), 4);

        // Replacing the array moves the mutation tracking to the new one
        let replacement = ArrayRef::new();
        object.set("items", replacement.clone());
        assert_eq!(counter.count(), 5);
        items.push(3);
        assert_eq!(counter.count(), 5);
        replacement.push(1);
        assert_eq!(counter.count(), 6);
        assert!(!adapter.is_tracking(items.handle()));
    }

    #[test]
    fn test_shared_array_invalidates_every_holder() {
        let adapter = PropertyAdapter::new();
        let shared = ArrayRef::new();
        let left = ObjectRef::from_pairs([("list", shared.clone())]);
        let right = ObjectRef::from_pairs([("other", shared.clone())]);
        let (left_counter, left_ref) = counter();
        let (right_counter, right_ref) = counter();

        adapter.observe(&Value::Object(left), "list", &left_ref);
        adapter.observe(&Value::Object(right), "other", &right_ref);
        assert_eq!(shared.hook_count(), 1);

        shared.push(1);
        assert_eq!(left_counter.count(), 1);
        assert_eq!(right_counter.count(), 1);
    }

    #[test]
    fn test_unobserve_cleans_up_entries() {
        let adapter = PropertyAdapter::new();
        let items = ArrayRef::new();
        let object = ObjectRef::from_pairs([("items", Value::from(items.clone())), ("n", Value::from(0))]);
        let obj = Value::Object(object.clone());
        let (_counter, subscriber) = counter();

        adapter.observe(&obj, "items", &subscriber);
        adapter.observe(&obj, "n", &subscriber);
        assert_eq!(adapter.tracked_objects(), 2);
        assert_eq!(items.hook_count(), 1);

        adapter.unobserve(&obj, "n", &subscriber);
        assert_eq!(adapter.tracked_objects(), 2);
        assert_eq!(object.interceptor_count("n"), 0);
        assert_eq!(object.interceptor_count("items"), 1);

        adapter.unobserve(&obj, "items", &subscriber);
        assert_eq!(adapter.tracked_objects(), 0);
        assert_eq!(object.interceptor_count("items"), 0);
        assert_eq!(items.hook_count(), 0);
    }

    #[test]
    fn test_repeated_observe_cycles_do_not_accumulate() {
        let adapter = PropertyAdapter::new();
        let items = ArrayRef::new();
        let object = ObjectRef::from_pairs([("items", items.clone())]);
        let obj = Value::Object(object.clone());

        for _ in 0..100 {
            let (_counter, subscriber) = counter();
            adapter.observe(&obj, "items", &subscriber);
            adapter.unobserve(&obj, "items", &subscriber);
        }
        assert_eq!(object.interceptor_count("items"), 0);
        assert_eq!(items.hook_count(), 0);

        let (counter, subscriber) = counter();
        adapter.observe(&obj, "items", &subscriber);
        items.push(1);
        object.set("items", ArrayRef::new());
        assert_eq!(counter.count(), 2);
        assert_eq!(object.interceptor_count("items"), 1);
    }

    #[test]
    fn test_write_after_unobserve_does_not_track() {
        let adapter = PropertyAdapter::new();
        let object = ObjectRef::from_pairs([("a", 0), ("b", 0)]);
        let obj = Value::Object(object.clone());
        let (_counter, subscriber) = counter();

        adapter.observe(&obj, "a", &subscriber);
        adapter.observe(&obj, "b", &subscriber);
        adapter.unobserve(&obj, "a", &subscriber);

        assert_eq!(object.interceptor_count("a"), 0);
        let list = ArrayRef::new();
        object.set("a", list.clone());
        assert!(!adapter.is_tracking(list.handle()));

        adapter.unobserve(&obj, "b", &subscriber);
        assert_eq!(adapter.tracked_objects(), 0);
    }

    #[test]
    fn test_accessor_properties_are_not_intercepted() {
        let adapter = PropertyAdapter::new();
        let object = ObjectRef::new();
        let store = Rc::new(Cell::new(0.0));
        let read = store.clone();
        let write = store.clone();
        object.define_accessor(
            "x",
            move || Value::from(read.get()),
            move |v| write.set(v.as_number().unwrap_or(0.0)),
        );
        let obj = Value::Object(object.clone());
        let (counter, subscriber) = counter();

        adapter.observe(&obj, "x", &subscriber);
        assert_eq!(object.interceptor_count("x"), 0);

        adapter.set(&obj, "x", Value::from(4));
        assert_eq!(store.get(), 4.0);
        assert_eq!(adapter.get(&obj, "x"), Value::from(4));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_array_get_set() {
        let adapter = PropertyAdapter::new();
        let array = Value::from(vec![10, 20]);
        assert_eq!(adapter.get(&array, "1"), Value::from(20));
        assert_eq!(adapter.get(&array, "length"), Value::from(2));
        assert!(adapter.get(&array, "x").is_undefined());

        adapter.set(&array, "0", Value::from(5));
        assert_eq!(adapter.get(&array, "0"), Value::from(5));
    }

    #[test]
    fn test_dropped_subscriber_is_ignored() {
        let adapter = PropertyAdapter::new();
        let object = ObjectRef::from_pairs([("a", 0)]);
        let obj = Value::Object(object.clone());
        let (counter, subscriber) = counter();
        adapter.observe(&obj, "a", &subscriber);
        drop(counter);

        assert!(!subscriber.is_alive());
        object.set("a", 1);
    }
}
