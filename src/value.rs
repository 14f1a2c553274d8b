//! Value - the closed sum type flowing through observers, binders and formatters.
//!
//! Primitives compare by value, containers and functions by identity, the
//! same way a strict equality check does in a dynamic language. That rule is
//! what change notification relies on: a write only notifies when the new
//! value is not [`same`](Value::same) as the old one.

use std::fmt;
use std::rc::Rc;

use crate::model::{ArrayRef, Handle, ObjectRef};

/// Native function callable from the model: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Value;

/// A callable model value with reference identity.
#[derive(Clone)]
pub struct FunctionRef {
    handle: Handle,
    f: Rc<NativeFn>,
}

impl FunctionRef {
    pub fn new(f: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        Self {
            handle: Handle::next(),
            f: Rc::new(f),
        }
    }

    /// Invoke with `this` bound to `context`.
    pub fn call(&self, context: &Value, args: &[Value]) -> Value {
        (self.f)(context, args)
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef(#{})", self.handle.raw())
    }
}

/// A model value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl Value {
    /// Wrap a closure as a function value.
    pub fn function(f: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        Value::Function(FunctionRef::new(f))
    }

    /// Strict identity: primitives by value, containers by reference.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Objects and arrays can be observed; everything else is a leaf.
    pub fn is_observable(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Truthiness: `false`, `0`, `NaN`, `""`, `null` and `undefined` are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// String form used by binders: `null`/`undefined` become empty.
    pub fn to_display_string(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 9e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(a) => {
                for (i, item) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item.to_display_string())?;
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(_) => write!(f, "function"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(a) => a.fmt(f),
            Value::Object(o) => o.fmt(f),
            Value::Function(func) => func.fmt(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Build a fresh model graph from JSON. Objects and arrays become shared containers.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(ObjectRef::from_pairs(map.into_iter().map(|(k, v)| (k, Value::from(v)))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_semantics() {
        assert!(Value::from(1).same(&Value::from(1.0)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(!Value::Null.same(&Value::Undefined));

        let a = ObjectRef::new();
        let b = ObjectRef::new();
        assert!(Value::from(a.clone()).same(&Value::from(a)));
        assert!(!Value::from(ObjectRef::new()).same(&Value::from(b)));

        let f = FunctionRef::new(|_, _| Value::Undefined);
        assert!(Value::from(f.clone()).same(&Value::from(f)));
    }

    #[test]
    fn test_truthy() {
        assert!(!Value::from(0).truthy());
        assert!(!Value::from("").truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::Null.truthy());
        assert!(Value::from("0").truthy());
        assert!(Value::from(ArrayRef::new()).truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "1,2");
        assert_eq!(Value::Undefined.to_display_string(), "");
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({
            "name": "x",
            "items": [{ "val": 0 }, { "val": 1 }],
        }));
        let object = value.as_object().cloned().unwrap_or_default();
        assert_eq!(object.get("name"), Value::from("x"));
        let items = object.get("items");
        let items = items.as_array().cloned().unwrap_or_default();
        assert_eq!(items.len(), 2);
        assert!(items.get(1).as_object().is_some_and(|o| o.get("val") == Value::from(1)));
    }

    #[test]
    fn test_function_call() {
        let f = FunctionRef::new(|this, args| {
            let base = this.as_number().unwrap_or(0.0);
            Value::from(base + args.len() as f64)
        });
        assert_eq!(f.call(&Value::from(10), &[Value::Null, Value::Null]), Value::from(12));
    }
}
