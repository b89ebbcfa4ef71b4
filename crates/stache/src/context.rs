// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The render-time scope stack.

use crate::error::{Result, StacheError};
use crate::value::Value;

/// A stack of scopes, innermost last.
///
/// Each top-level render owns its own `Context`. Sections push the value
/// they iterate or enter, and pop it when their body is done.
#[derive(Debug, Clone, Default)]
pub struct Context {
    stack: Vec<Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with `value` as the only scope.
    pub fn with(value: Value) -> Self {
        Self { stack: vec![value] }
    }

    /// Pushes a new innermost scope.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Removes and returns the innermost scope.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// The innermost scope, `{{ . }}`.
    pub fn last(&self) -> Value {
        self.stack.last().cloned().unwrap_or_default()
    }

    /// Number of scopes.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Finds `name` in the innermost scope that exposes it.
    pub fn find(&self, name: &str) -> Option<Value> {
        self.stack.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Resolves a dotted path.
    ///
    /// The first segment is looked up across the whole stack. Every later
    /// segment is looked up only on the value found so far.
    pub fn find_dot(&self, name: &str) -> Option<Value> {
        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut value = self.find(first)?;
        for segment in segments {
            value = value.get(segment)?;
        }
        Some(value)
    }

    /// Resolves `name` the way a tag does: `.` is the innermost scope,
    /// dotted names walk a path, anything else is a stack lookup.
    ///
    /// Unresolved names yield [`Value::Null`], or `UnknownVariable` when
    /// `strict` is set.
    pub fn resolve(&self, name: &str, strict: bool) -> Result<Value> {
        let found = if name == "." {
            Some(self.last())
        } else if name.contains('.') {
            self.find_dot(name)
        } else {
            self.find(name)
        };

        match found {
            Some(value) => Ok(value),
            None if strict => Err(StacheError::UnknownVariable(name.to_string())),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(frames: &[serde_json::Value]) -> Context {
        let mut context = Context::new();
        for frame in frames {
            context.push(frame.clone().into());
        }
        context
    }

    #[test]
    fn innermost_scope_wins() {
        let context = context(&[json!({"a": "outer", "b": "only"}), json!({"a": "inner"})]);
        assert_eq!(context.find("a"), Some(Value::from("inner")));
        assert_eq!(context.find("b"), Some(Value::from("only")));
        assert_eq!(context.find("c"), None);
    }

    #[test]
    fn present_null_stops_the_search() {
        let context = context(&[json!({"a": "outer"}), json!({"a": null})]);
        assert_eq!(context.find("a"), Some(Value::Null));
    }

    #[test]
    fn dotted_segments_do_not_see_outer_scopes() {
        let context = context(&[json!({"b": {"c": "leak"}}), json!({"a": {"x": 1}})]);
        assert_eq!(context.find_dot("a.x"), Some(Value::Int(1)));
        assert_eq!(context.find_dot("a.b.c"), None);
    }

    #[test]
    fn resolve_strictness() {
        let context = context(&[json!({"a": {}})]);
        assert_eq!(context.resolve("a.b.c", false).unwrap(), Value::Null);
        assert!(matches!(
            context.resolve("a.b.c", true),
            Err(StacheError::UnknownVariable(name)) if name == "a.b.c"
        ));
    }

    #[test]
    fn implicit_iterator() {
        let mut context = Context::new();
        assert_eq!(context.last(), Value::Null);
        context.push("item".into());
        assert_eq!(context.resolve(".", true).unwrap(), Value::from("item"));
        assert_eq!(context.pop(), Some(Value::from("item")));
        assert_eq!(context.depth(), 0);
    }
}
