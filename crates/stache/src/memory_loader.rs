// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-memory template loaders.

use crate::error::{Result, StacheError};
use crate::loader::Loader;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Memory-based loader holding name/source pairs.
///
/// Clones share the same storage, so templates added through one handle
/// are visible to an engine holding another.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryLoader {
    /// Create an empty memory loader
    pub fn new() -> Self {
        Self::default()
    }

    fn with_templates_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<String, String>) -> R,
    {
        // A panic while holding the lock cannot leave the map half-written
        let mut templates = self
            .templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut templates)
    }

    /// Add a template, replacing any with the same name
    pub fn add_template(&self, name: &str, source: impl Into<String>) {
        let source = source.into();
        self.with_templates_mut(|templates| {
            templates.insert(name.to_string(), source);
        });
    }

    /// Remove a template
    pub fn remove_template(&self, name: &str) -> Option<String> {
        self.with_templates_mut(|templates| templates.remove(name))
    }

    /// Clear all templates
    pub fn clear(&self) {
        self.with_templates_mut(HashMap::clear);
    }

    /// Check whether a template is present
    pub fn contains(&self, name: &str) -> bool {
        self.with_templates_mut(|templates| templates.contains_key(name))
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.with_templates_mut(|templates| templates.len())
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.with_templates_mut(|templates| templates.get(name).cloned())
            .ok_or_else(|| StacheError::UnknownTemplate(name.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryLoader {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let loader = Self::new();
        loader.with_templates_mut(|templates| {
            templates.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
        });
        loader
    }
}

lazy_static! {
    static ref INLINE_HEADER: Regex = Regex::new(r"(?m)^@@[ \t]+([\w.\-/]+)[ \t]*\r?\n").unwrap();
}

/// Loads templates bundled in a single text blob.
///
/// Each template starts with a line `@@ name` and runs until the next such
/// line or the end of the text. Anything before the first header is ignored.
///
/// ```rust
/// use stache::{InlineLoader, Loader};
///
/// let loader = InlineLoader::new("@@ hello\nHello {{name}}!\n@@ bye\nBye!\n");
/// assert_eq!(loader.load("hello").unwrap(), "Hello {{name}}!\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InlineLoader {
    templates: HashMap<String, String>,
}

impl InlineLoader {
    /// Splits `text` into templates.
    pub fn new(text: &str) -> Self {
        let headers: Vec<(String, usize, usize)> = INLINE_HEADER
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((caps[1].to_string(), whole.start(), whole.end()))
            })
            .collect();

        let mut templates = HashMap::new();
        for (i, (name, _, body_start)) in headers.iter().enumerate() {
            let body_end = headers.get(i + 1).map_or(text.len(), |next| next.1);
            templates.insert(name.clone(), text[*body_start..body_end].to_string());
        }

        Self { templates }
    }

    /// Reads and splits a file.
    #[cfg(feature = "filesystem")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::new(&std::fs::read_to_string(path)?))
    }

    /// Template names found in the blob.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

impl Loader for InlineLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| StacheError::UnknownTemplate(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_load_remove() {
        let loader = MemoryLoader::new();
        loader.add_template("greeting", "Hello {{name}}");
        assert_eq!(loader.load("greeting").unwrap(), "Hello {{name}}");
        assert_eq!(loader.len(), 1);

        assert_eq!(loader.remove_template("greeting").as_deref(), Some("Hello {{name}}"));
        assert!(loader.load("greeting").unwrap_err().is_unknown_template());
    }

    #[test]
    fn clones_share_templates() {
        let loader = MemoryLoader::new();
        let handle = loader.clone();
        handle.add_template("late", "added later");
        assert!(loader.contains("late"));

        loader.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn from_pairs() {
        let loader: MemoryLoader = [("a", "A"), ("b", "B")].into_iter().collect();
        assert_eq!(loader.load("b").unwrap(), "B");
    }

    #[test]
    fn inline_sections() {
        let loader = InlineLoader::new(
            "preamble is ignored\n@@ first\nOne {{x}}\n\n@@ second.html\nTwo\n@@ empty\n",
        );
        assert_eq!(loader.load("first").unwrap(), "One {{x}}\n\n");
        assert_eq!(loader.load("second.html").unwrap(), "Two\n");
        assert_eq!(loader.load("empty").unwrap(), "");
        assert!(loader.load("preamble").is_err());

        let mut names: Vec<&str> = loader.names().collect();
        names.sort();
        assert_eq!(names, vec!["empty", "first", "second.html"]);
    }
}
