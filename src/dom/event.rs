//! Node events and listener bookkeeping.

use std::cell::Cell;
use std::rc::Rc;

use crate::model::ObjectRef;
use crate::value::Value;

/// Listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

thread_local! {
    /// Counter for listener IDs.
    static NEXT_LISTENER: Cell<u64> = const { Cell::new(0) };
}

/// Identifies one registered listener for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        NEXT_LISTENER.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ListenerId(id)
        })
    }
}

/// A synchronous event dispatched to a node's listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Event name, e.g. `"input"`, `"change"`, `"click"`.
    pub kind: String,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// Model representation handed to bound event functions.
    pub fn to_value(&self) -> Value {
        Value::Object(ObjectRef::from_pairs([("type", self.kind.as_str())]))
    }
}
