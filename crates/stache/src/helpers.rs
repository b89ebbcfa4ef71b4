// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Named values visible to every template.

use crate::error::{Result, StacheError};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registry of helpers: values and lambdas (filters included) resolved
/// as the outermost scope of every render.
#[derive(Debug, Clone, Default)]
pub struct HelperCollection {
    helpers: BTreeMap<String, Value>,
}

impl HelperCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, replacing any previous helper.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.helpers.insert(name.into(), value.into());
    }

    /// Looks a helper up.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.helpers
            .get(name)
            .cloned()
            .ok_or_else(|| StacheError::UnknownHelper(name.to_string()))
    }

    /// True if `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Unregisters `name`.
    pub fn remove(&mut self, name: &str) -> Result<Value> {
        self.helpers
            .remove(name)
            .ok_or_else(|| StacheError::UnknownHelper(name.to_string()))
    }

    /// Unregisters everything.
    pub fn clear(&mut self) {
        self.helpers.clear();
    }

    /// True when no helper is registered.
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// A map snapshot, pushed as a context scope.
    pub fn to_value(&self) -> Value {
        Value::Map(Arc::new(self.helpers.clone()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HelperCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut helpers = Self::new();
        for (name, value) in iter {
            helpers.add(name, value);
        }
        helpers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove() {
        let mut helpers = HelperCollection::new();
        assert!(helpers.is_empty());

        helpers.add("site", "Example");
        assert!(helpers.has("site"));
        assert_eq!(helpers.get("site").unwrap(), Value::from("Example"));

        helpers.remove("site").unwrap();
        assert!(!helpers.has("site"));
        assert!(matches!(
            helpers.get("site"),
            Err(StacheError::UnknownHelper(name)) if name == "site"
        ));
        assert!(helpers.remove("site").is_err());
    }

    #[test]
    fn snapshot_is_a_map() {
        let helpers: HelperCollection = [("a", 1), ("b", 2)].into_iter().collect();
        let value = helpers.to_value();
        assert_eq!(value.get("b"), Some(Value::Int(2)));

        let mut helpers = helpers;
        helpers.clear();
        assert!(helpers.is_empty());
    }
}
