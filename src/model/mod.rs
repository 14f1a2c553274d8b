//! Model graph - caller-owned objects and arrays.
//!
//! The engine never owns the model. It instruments it:
//! - [`ObjectRef`] properties get per-key interceptors when an adapter observes them
//! - [`ArrayRef`] mutators run mutation hooks after every structural change
//! - Every container carries a [`Handle`] so adapters can keep side tables
//!   keyed by identity instead of hiding bookkeeping fields on the object
//!
//! Both container types are cheap `Rc` handles. Cloning shares the container.

mod array;
mod object;

use std::cell::Cell;

pub use array::*;
pub use object::*;

thread_local! {
    /// Counter for container and adapter handles.
    static NEXT_HANDLE: Cell<u64> = const { Cell::new(0) };
}

/// Opaque, stable identifier for a model container or an adapter.
///
/// Handles are never reused within a thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Allocate a fresh handle.
    pub fn next() -> Self {
        NEXT_HANDLE.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Handle(id)
        })
    }

    /// Raw numeric value (for logging).
    pub fn raw(self) -> u64 {
        self.0
    }
}
