//! # spark-bind
//!
//! Declarative data binding for document trees.
//!
//! Directives written as attributes (`rv-text="user.name"`) and text
//! templates (`Hello { user.name }`) are bound to a shared model graph.
//! Model writes propagate to the nodes synchronously; two-way binders write
//! element values back.
//!
//! ## Architecture
//!
//! ```text
//! Node tree --View::new--> Bindings --bind--> Observers --Adapter--> model side table
//!     ^                        |                                         |
//!     +------ Binder routine --+<------------- sync on change -----------+
//! ```
//!
//! - a [`View`] walks the nodes once and builds one [`Binding`] per directive
//! - each binding resolves its keypath through an [`Observer`], which
//!   subscribes to every link of the path via the registered [`Adapter`]s
//! - a model write runs the adapter's interceptor, which syncs every
//!   subscribed binding before the write returns
//!
//! Everything is single-threaded and synchronous: N writes produce N
//! notification passes, and there is no scheduler.
//!
//! ## Modules
//!
//! - [`value`] - the dynamic [`Value`] flowing through bindings
//! - [`model`] - shared model containers ([`ObjectRef`], [`ArrayRef`])
//! - [`dom`] - the document tree bindings are applied to
//! - [`parser`] - keypath literals, text templates, declarations
//! - [`adapter`] - per-interface observation, default [`PropertyAdapter`]
//! - [`observer`] - keypath resolution state machine
//! - [`binding`] / [`view`] - directive lifecycle and tree walk
//! - [`binders`] / [`formatters`] - built-in directives and value transforms
//! - [`options`] - configuration layers
//!
//! ## Example
//!
//! ```
//! use spark_bind::{bind, Node, ObjectRef, Options};
//!
//! let root = Node::element("div")
//!     .with_child(Node::element("h1").with_attr("rv-text", "title"))
//!     .with_child(Node::element("p").with_child(Node::text("{ count } items")));
//! let model = ObjectRef::from_pairs([("title", "Inbox")]);
//! model.set("count", 3);
//!
//! let view = bind([root.clone()], model.clone(), Options::new()).unwrap();
//! assert_eq!(root.text_content(), "Inbox3 items");
//!
//! model.set("count", 4);
//! assert_eq!(root.text_content(), "Inbox4 items");
//!
//! view.unbind();
//! ```

pub mod adapter;
pub mod binders;
pub mod binding;
pub mod dom;
pub mod error;
pub mod formatters;
pub mod model;
pub mod observer;
pub mod options;
pub mod parser;
pub mod value;
pub mod view;

pub use adapter::{Adapter, AdapterRegistry, PropertyAdapter, Subscriber, SubscriberRef};
pub use binders::{Binder, BinderFlags, FnBinder};
pub use binding::Binding;
pub use dom::{Event, ListenerId, Node, NodeType};
pub use error::{Error, Result};
pub use formatters::Formatter;
pub use model::{ArrayRef, Handle, ObjectRef};
pub use observer::Observer;
pub use options::{EventHandler, Options, Settings, ViewOptions};
pub use value::{FunctionRef, Value};
pub use view::View;

/// Build a view over `roots`, bind it and return it.
///
/// `options` are merged over the defaults. The returned view stays bound
/// until [`View::unbind`] is called.
pub fn bind(roots: impl IntoIterator<Item = Node>, model: ObjectRef, options: Options) -> Result<View> {
    let options = options.resolve()?;
    let view = View::new(roots.into_iter().collect(), model, options);
    view.bind()?;
    Ok(view)
}
