//! Shared model arrays with mutation hooks.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::Handle;
use crate::value::Value;

/// Called after a structural mutation of the array.
pub type MutationHook = Rc<dyn Fn(&ArrayRef)>;

struct ArrayInner {
    handle: Handle,
    items: RefCell<Vec<Value>>,
    hooks: RefCell<Vec<(Handle, MutationHook)>>,
}

/// A shared, mutable model array.
///
/// The mutators `push`, `pop`, `shift`, `unshift`, `splice`, `sort_by`,
/// `reverse`, `set` and `replace_all` run every installed mutation hook once
/// after the change is applied. Reads never notify.
#[derive(Clone)]
pub struct ArrayRef(Rc<ArrayInner>);

impl ArrayRef {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create an array holding `items`.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayInner {
            handle: Handle::next(),
            items: RefCell::new(items),
            hooks: RefCell::new(Vec::new()),
        }))
    }

    /// Identity handle of this array.
    pub fn handle(&self) -> Handle {
        self.0.handle
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Item at `index`, or `undefined` when out of range.
    pub fn get(&self, index: usize) -> Value {
        self.0
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Snapshot of the items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Position of the first item that is the same as `value`.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.0.items.borrow().iter().position(|item| item.same(value))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index_of(value).is_some()
    }

    /// Append an item. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove the last item.
    pub fn pop(&self) -> Value {
        self.mutate(|items| items.pop().unwrap_or(Value::Undefined))
    }

    /// Remove the first item.
    pub fn shift(&self) -> Value {
        self.mutate(|items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    /// Prepend an item. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` items at `start` and insert `insert` in their place.
    ///
    /// `start` and `delete_count` are clamped to the array bounds. Returns the
    /// removed items.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Stable sort in place.
    ///
    /// The comparator runs on a detached copy, so it may read this array.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        let mut sorted = self.to_vec();
        sorted.sort_by(&mut compare);
        self.mutate(|items| *items = sorted);
    }

    /// Replace the item at `index`, padding with `undefined` when past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        self.mutate(|items| {
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
        });
    }

    /// Replace every item.
    pub fn replace_all(&self, values: Vec<Value>) {
        self.mutate(|items| *items = values);
    }

    /// Install `hook` on behalf of `owner`. Returns `false` if `owner`
    /// already has a hook on this array.
    pub fn instrument(&self, owner: Handle, hook: MutationHook) -> bool {
        let mut hooks = self.0.hooks.borrow_mut();
        if hooks.iter().any(|(h, _)| *h == owner) {
            return false;
        }
        hooks.push((owner, hook));
        true
    }

    /// Remove the hook `owner` installed. Returns whether one was removed.
    pub fn release(&self, owner: Handle) -> bool {
        let mut hooks = self.0.hooks.borrow_mut();
        let before = hooks.len();
        hooks.retain(|(h, _)| *h != owner);
        hooks.len() != before
    }

    /// Whether `owner` has a hook on this array.
    pub fn is_instrumented(&self, owner: Handle) -> bool {
        self.0.hooks.borrow().iter().any(|(h, _)| *h == owner)
    }

    /// Number of installed mutation hooks.
    pub fn hook_count(&self) -> usize {
        self.0.hooks.borrow().len()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = f(&mut self.0.items.borrow_mut());
        let hooks: Vec<MutationHook> = self
            .0
            .hooks
            .borrow()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook(self);
        }
        result
    }
}

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("handle", &self.0.handle.raw())
            .field("len", &self.len())
            .finish()
    }
}

impl FromIterator<Value> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn numbers(array: &ArrayRef) -> Vec<f64> {
        array
            .to_vec()
            .iter()
            .map(|v| v.as_number().unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn test_mutators() {
        let array: ArrayRef = (1..=3).map(Value::from).collect();

        assert_eq!(array.push(4), 4);
        assert_eq!(array.pop(), Value::from(4));
        assert_eq!(array.shift(), Value::from(1));
        assert_eq!(array.unshift(0), 3);
        assert_eq!(numbers(&array), vec![0.0, 2.0, 3.0]);

        let removed = array.splice(1, 1, vec![Value::from(7), Value::from(8)]);
        assert_eq!(removed, vec![Value::from(2)]);
        assert_eq!(numbers(&array), vec![0.0, 7.0, 8.0, 3.0]);

        array.reverse();
        assert_eq!(numbers(&array), vec![3.0, 8.0, 7.0, 0.0]);
    }

    #[test]
    fn test_splice_clamps() {
        let array: ArrayRef = (0..2).map(Value::from).collect();
        let removed = array.splice(5, 10, vec![Value::from(9)]);
        assert!(removed.is_empty());
        assert_eq!(numbers(&array), vec![0.0, 1.0, 9.0]);
    }

    #[test]
    fn test_pop_shift_empty() {
        let array = ArrayRef::new();
        assert!(array.pop().is_undefined());
        assert!(array.shift().is_undefined());
    }

    #[test]
    fn test_hooks_fire_once_per_mutation() {
        let array = ArrayRef::new();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let owner = Handle::next();

        assert!(array.instrument(owner, Rc::new(move |_| count_clone.set(count_clone.get() + 1))));
        assert!(!array.instrument(owner, Rc::new(|_| {})));
        assert_eq!(array.hook_count(), 1);

        array.push(1);
        array.push(2);
        array.pop();
        array.sort_by(|_, _| Ordering::Equal);
        assert_eq!(count.get(), 4);

        // Reads do not notify
        let _ = array.get(0);
        let _ = array.len();
        assert_eq!(count.get(), 4);

        assert!(array.release(owner));
        assert!(!array.release(owner));
        array.push(3);
        assert_eq!(count.get(), 4);
        assert_eq!(array.hook_count(), 0);
    }

    #[test]
    fn test_sort_comparator_may_read_array() {
        let array: ArrayRef = [3, 1, 2].into_iter().map(Value::from).collect();
        let reader = array.clone();
        array.sort_by(|a, b| {
            assert_eq!(reader.len(), 3);
            let (a, b) = (a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0));
            a.total_cmp(&b)
        });
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);
    }
}
