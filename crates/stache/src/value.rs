// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render data.
//!
//! A [`Value`] is what templates see: scalars, lists, string-keyed maps,
//! host objects exposing the [`Resolve`] trait, and [`Lambda`]s. Lists and
//! maps are distinct variants, so a section iterates a list and pushes a map
//! as one scope without inspecting keys.
//!
//! Any `serde::Serialize` type converts through [`to_value`]:
//!
//! ```rust
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Person { name: String }
//!
//! let value = stache::to_value(&Person { name: "Ada".into() }).unwrap();
//! assert_eq!(value.get("name").unwrap().to_string(), "Ada");
//! ```

use crate::error::Result;
use crate::token::Delimiters;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name lookup on host objects.
///
/// Lookup on one context frame tries [`method`](Resolve::method), then
/// [`field`](Resolve::field), then [`key`](Resolve::key). Every method
/// defaults to "not exposed".
pub trait Resolve: Send + Sync + fmt::Debug {
    /// A computed, zero-argument value.
    fn method(&self, _name: &str) -> Option<Value> {
        None
    }

    /// A stored field.
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// A keyed entry, for map-like objects.
    fn key(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Calls the object itself. Only consulted when `strict_callables` is off.
    fn invoke(&self) -> Option<Value> {
        None
    }

    /// Section truthiness. Objects are truthy unless they say otherwise.
    fn is_truthy(&self) -> bool {
        true
    }
}

/// A nullary lambda body.
pub type NullaryFn = dyn Fn() -> Result<Value> + Send + Sync;

/// A unary lambda body: section lambdas receive the raw section text,
/// filters receive the value being piped.
pub type UnaryFn = dyn Fn(&Value, &LambdaHelper<'_>) -> Result<Value> + Send + Sync;

/// A callable context value.
#[derive(Clone)]
pub enum Lambda {
    /// Called with no arguments; its result is rendered as a template.
    Nullary(Arc<NullaryFn>),
    /// Called with one argument and a render helper.
    Unary(Arc<UnaryFn>),
}

impl Lambda {
    /// A lambda taking no arguments.
    pub fn nullary<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Lambda::Nullary(Arc::new(move || -> Result<Value> { Ok(f().into()) }))
    }

    /// A section lambda receiving the unrendered section body.
    pub fn section<F, V>(f: F) -> Self
    where
        F: Fn(&str, &LambdaHelper<'_>) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Lambda::Unary(Arc::new(
            move |input: &Value, helper: &LambdaHelper<'_>| -> Result<Value> {
                Ok(f(&input.to_string(), helper).into())
            },
        ))
    }

    /// A section lambda that can fail.
    pub fn try_section<F>(f: F) -> Self
    where
        F: Fn(&str, &LambdaHelper<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Lambda::Unary(Arc::new(
            move |input: &Value, helper: &LambdaHelper<'_>| -> Result<Value> {
                f(&input.to_string(), helper)
            },
        ))
    }

    /// A filter mapping one value to another.
    pub fn filter<F, V>(f: F) -> Self
    where
        F: Fn(&Value) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Lambda::Unary(Arc::new(
            move |input: &Value, _: &LambdaHelper<'_>| -> Result<Value> { Ok(f(input).into()) },
        ))
    }

    fn ptr_eq(&self, other: &Lambda) -> bool {
        match (self, other) {
            (Lambda::Nullary(a), Lambda::Nullary(b)) => Arc::ptr_eq(a, b),
            (Lambda::Unary(a), Lambda::Unary(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lambda::Nullary(_) => f.write_str("Lambda::Nullary(..)"),
            Lambda::Unary(_) => f.write_str("Lambda::Unary(..)"),
        }
    }
}

/// Renders text in the scope a lambda was called from.
pub(crate) trait RenderText {
    fn render_text(&mut self, text: &str, delimiters: &Delimiters) -> Result<String>;
}

/// Handed to unary lambdas so they can render template text themselves.
pub struct LambdaHelper<'a> {
    renderer: RefCell<&'a mut (dyn RenderText + 'a)>,
    delimiters: Delimiters,
}

impl<'a> LambdaHelper<'a> {
    pub(crate) fn new(renderer: &'a mut (dyn RenderText + 'a), delimiters: Delimiters) -> Self {
        Self {
            renderer: RefCell::new(renderer),
            delimiters,
        }
    }

    /// Renders `text` against the current context stack, using the
    /// delimiters of the enclosing section.
    pub fn render(&self, text: &str) -> Result<String> {
        self.renderer
            .borrow_mut()
            .render_text(text, &self.delimiters)
    }

    /// Delimiters active at the section tag.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }
}

impl fmt::Debug for LambdaHelper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaHelper")
            .field("delimiters", &self.delimiters)
            .finish_non_exhaustive()
    }
}

/// A render-time value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent or null.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    String(String),
    /// A sequence, iterated by sections.
    List(Arc<Vec<Value>>),
    /// A string-keyed map, pushed as one scope by sections.
    Map(Arc<BTreeMap<String, Value>>),
    /// A host object.
    Object(Arc<dyn Resolve>),
    /// A callable.
    Lambda(Lambda),
}

impl Value {
    /// Wraps a nullary closure.
    pub fn lambda<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Lambda(Lambda::nullary(f))
    }

    /// Wraps a section lambda.
    pub fn section<F, V>(f: F) -> Self
    where
        F: Fn(&str, &LambdaHelper<'_>) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Lambda(Lambda::section(f))
    }

    /// Wraps a filter.
    pub fn filter<F, V>(f: F) -> Self
    where
        F: Fn(&Value) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Lambda(Lambda::filter(f))
    }

    /// Wraps a host object.
    pub fn object<R: Resolve + 'static>(object: R) -> Self {
        Value::Object(Arc::new(object))
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Section truthiness.
    ///
    /// Empty strings, empty lists, empty maps, `false`, zero and null are
    /// falsy. The string `"0"` is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(object) => object.is_truthy(),
            Value::Lambda(_) => true,
        }
    }

    /// Looks `name` up on this single value.
    ///
    /// Maps use their keys, objects go through [`Resolve`] and lists accept
    /// numeric indexes. Scalars expose nothing.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(name).cloned(),
            Value::Object(object) => object
                .method(name)
                .or_else(|| object.field(name))
                .or_else(|| object.key(name)),
            Value::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Map(_) | Value::Object(_) | Value::Lambda(_) => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{}", *x as i64)
            }
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Converts any serializable value.
///
/// # Errors
///
/// Fails when `T`'s `Serialize` implementation fails, for example on maps
/// with non-string keys.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?.into())
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
            serde_json::Value::Object(map) => Value::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Lambda> for Value {
    fn from(lambda: Lambda) -> Self {
        Value::Lambda(lambda)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(Arc::new(iter.into_iter().map(Into::into).collect()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Person;

    impl Resolve for Person {
        fn method(&self, name: &str) -> Option<Value> {
            (name == "title").then(|| Value::from("from method"))
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "title" => Some("from field".into()),
                "name" => Some("Ada".into()),
                _ => None,
            }
        }
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from(Vec::<Value>::new()).is_truthy());
        assert!(!Value::from(json!({})).is_truthy());
        assert!(Value::from(json!({"a": 1})).is_truthy());
        assert!(Value::lambda(|| "x").is_truthy());
        assert!(Value::object(Person).is_truthy());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(1.0).to_string(), "1");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(json!([1, "a", null])).to_string(), "1,a,");
        assert_eq!(Value::from(json!({"a": 1})).to_string(), "");
    }

    #[test]
    fn json_numbers_keep_their_kind() {
        assert_eq!(Value::from(json!(3)), Value::Int(3));
        assert_eq!(Value::from(json!(2.5)), Value::Float(2.5));
    }

    #[test]
    fn object_lookup_prefers_methods() {
        let person = Value::object(Person);
        assert_eq!(person.get("title"), Some(Value::from("from method")));
        assert_eq!(person.get("name"), Some(Value::from("Ada")));
        assert_eq!(person.get("age"), None);
    }

    #[test]
    fn list_index_lookup() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.get("1"), Some(Value::from("b")));
        assert_eq!(list.get("2"), None);
        assert_eq!(list.get("x"), None);
    }

    #[test]
    fn serializable_structs_become_maps() {
        #[derive(Serialize)]
        struct Item {
            name: &'static str,
            tags: Vec<&'static str>,
        }

        let value = to_value(&Item {
            name: "pen",
            tags: vec!["a", "b"],
        })
        .unwrap();
        assert_eq!(value.get("name"), Some(Value::from("pen")));
        assert_eq!(value.get("tags").unwrap().as_list().unwrap().len(), 2);
    }
}
