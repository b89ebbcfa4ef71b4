// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Engine configuration and pragmas.
//!
//! [`Config`] deserializes from TOML or JSON with every field optional:
//!
//! ```toml
//! entity_flags = "quotes"
//! strict_variables = true
//! pragmas = ["FILTERS", "BLOCKS"]
//! delimiters = "<% %>"
//! max_depth = 64
//!
//! [cache]
//! kind = "directory"
//! path = ".stache-cache"
//! memory_capacity = 256
//! ```

use crate::error::{Result, StacheError};
use crate::escape::{is_utf8_charset, EntityFlags, Escape};
use crate::token::Delimiters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// An opt-in language feature, enabled engine-wide or by `{{% NAME }}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Pragma {
    /// `name | filter | filter` pipes.
    Filters,
    /// `{{< parent }}` and `{{$ block }}` inheritance.
    Blocks,
    /// `{{>* name }}` partial names resolved from the context.
    DynamicNames,
    /// Unresolved names are errors.
    StrictVariables,
    /// `{{# name /}}` opens and closes in one tag.
    SelfClosing,
}

impl Pragma {
    /// All recognized pragmas.
    pub const ALL: [Pragma; 5] = [
        Pragma::Filters,
        Pragma::Blocks,
        Pragma::DynamicNames,
        Pragma::StrictVariables,
        Pragma::SelfClosing,
    ];

    /// The name used in `{{% NAME }}` tags.
    pub fn name(self) -> &'static str {
        match self {
            Pragma::Filters => "FILTERS",
            Pragma::Blocks => "BLOCKS",
            Pragma::DynamicNames => "DYNAMIC-NAMES",
            Pragma::StrictVariables => "STRICT-VARIABLES",
            Pragma::SelfClosing => "SELF-CLOSING",
        }
    }

    /// Looks a pragma up by its tag name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Pragma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of pragmas active at a point in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PragmaSet(BTreeSet<Pragma>);

impl PragmaSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables `pragma`.
    pub fn enable(&mut self, pragma: Pragma) {
        self.0.insert(pragma);
    }

    /// Enables a pragma by tag name. Unknown names are ignored.
    pub fn enable_name(&mut self, name: &str) -> bool {
        match Pragma::from_name(name.trim()) {
            Some(pragma) => {
                self.enable(pragma);
                true
            }
            None => {
                debug!(pragma = name, "ignoring unknown pragma");
                false
            }
        }
    }

    /// True if `pragma` is enabled.
    pub fn contains(&self, pragma: Pragma) -> bool {
        self.0.contains(&pragma)
    }

    /// Iterates enabled pragmas in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = Pragma> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Pragma> for PragmaSet {
    fn from_iter<I: IntoIterator<Item = Pragma>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PragmaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Pragma::name).collect();
        f.write_str(&names.join(","))
    }
}

/// Compiled-artifact cache backing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    /// Only the engine's in-memory registry.
    #[default]
    None,
    /// An LRU of parsed artifacts.
    Memory {
        /// Maximum number of artifacts kept.
        #[serde(default = "default_capacity")]
        capacity: usize,
    },
    /// JSON artifacts persisted under `path`, fronted by an LRU.
    Directory {
        /// Cache directory, created on demand.
        path: PathBuf,
        /// Size of the in-memory LRU in front of the directory.
        #[serde(default = "default_capacity")]
        memory_capacity: usize,
    },
}

fn default_capacity() -> usize {
    256
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Custom escape function. Overrides `entity_flags` when set.
    #[serde(skip)]
    pub escape: Option<Escape>,
    /// Quote handling for the built-in HTML escaper.
    pub entity_flags: EntityFlags,
    /// Output character set. Only UTF-8 is accepted.
    pub charset: String,
    /// When false, objects exposing [`Resolve::invoke`](crate::Resolve::invoke)
    /// are called like nullary lambdas.
    pub strict_callables: bool,
    /// Unresolved names fail with `UnknownVariable`.
    pub strict_variables: bool,
    /// Persistent artifact cache.
    pub cache: CacheConfig,
    /// Route lambda-generated templates through `cache` instead of a no-op cache.
    pub cache_lambda_templates: bool,
    /// Pragmas enabled for every template.
    pub pragmas: Vec<Pragma>,
    /// Initial delimiters, as `"open close"`.
    pub delimiters: String,
    /// Maximum nesting of partial, parent and lambda renders.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escape: None,
            entity_flags: EntityFlags::default(),
            charset: "UTF-8".to_string(),
            strict_callables: true,
            strict_variables: false,
            cache: CacheConfig::None,
            cache_lambda_templates: false,
            pragmas: Vec::new(),
            delimiters: "{{ }}".to_string(),
            max_depth: 256,
        }
    }
}

impl Config {
    /// Enables a pragma for every template.
    pub fn with_pragma(mut self, pragma: Pragma) -> Self {
        if !self.pragmas.contains(&pragma) {
            self.pragmas.push(pragma);
        }
        self
    }

    /// Sets strict variable resolution.
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// Sets strict callable detection.
    pub fn with_strict_callables(mut self, strict: bool) -> Self {
        self.strict_callables = strict;
        self
    }

    /// Sets the escape mode.
    pub fn with_escape(mut self, escape: Escape) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Sets the cache backing.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the recursion limit.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Checks option values that cannot be expressed in the type.
    pub fn validate(&self) -> Result<()> {
        if !is_utf8_charset(&self.charset) {
            return Err(StacheError::Config(format!(
                "unsupported charset {}; only UTF-8 is supported",
                self.charset
            )));
        }
        if self.max_depth == 0 {
            return Err(StacheError::Config("max_depth must be at least 1".into()));
        }
        self.initial_delimiters()?;
        Ok(())
    }

    /// The escape mode in effect.
    pub fn escaper(&self) -> Escape {
        self.escape
            .clone()
            .unwrap_or(Escape::Html(self.entity_flags))
    }

    /// Parses the `delimiters` option.
    pub fn initial_delimiters(&self) -> Result<Delimiters> {
        Delimiters::parse(&self.delimiters, 0)
            .map_err(|_| StacheError::Config(format!("invalid delimiters: {}", self.delimiters)))
    }

    /// The engine-wide pragma set.
    pub fn pragma_set(&self) -> PragmaSet {
        self.pragmas.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.strict_callables);
        assert!(!config.strict_variables);
        assert_eq!(config.cache, CacheConfig::None);
        assert_eq!(config.max_depth, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: Config = serde_json::from_str(
            r#"{"pragmas": ["FILTERS", "DYNAMIC-NAMES"], "cache": {"kind": "memory"}}"#,
        )
        .unwrap();
        let pragmas = config.pragma_set();
        assert!(pragmas.contains(Pragma::Filters));
        assert!(pragmas.contains(Pragma::DynamicNames));
        assert_eq!(config.cache, CacheConfig::Memory { capacity: 256 });
        assert_eq!(config.delimiters, "{{ }}");
    }

    #[test]
    fn rejects_other_charsets() {
        let config = Config {
            charset: "ISO-8859-1".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(StacheError::Config(_))));
    }

    #[test]
    fn rejects_bad_delimiters() {
        let config = Config {
            delimiters: "<%".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pragma_names() {
        assert_eq!(Pragma::from_name("SELF-CLOSING"), Some(Pragma::SelfClosing));
        assert_eq!(Pragma::from_name("UNKNOWN"), None);

        let mut set = PragmaSet::new();
        assert!(!set.enable_name("NOPE"));
        assert!(set.enable_name(" BLOCKS "));
        set.enable(Pragma::Filters);
        assert_eq!(set.to_string(), "FILTERS,BLOCKS");
    }
}
