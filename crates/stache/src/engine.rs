// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The stache template engine.
//!
//! This module provides the [`Engine`] type that owns the whole template
//! lifecycle: loading, tokenizing, parsing, compiling, caching and rendering.
//!
//! # Quick Start
//!
//! ```rust
//! use stache::{Config, Engine, Value};
//!
//! let engine = Engine::new(Config::default())?;
//! let data = Value::from(serde_json::json!({ "planet": "World" }));
//! assert_eq!(engine.render("Hello, {{planet}}!", &data)?, "Hello, World!");
//! # Ok::<(), stache::StacheError>(())
//! ```
//!
//! # Loading
//!
//! Template names go through the main [`Loader`] (by default a
//! [`StringLoader`], so the name *is* the source). Partial and parent names
//! go through a separate partials loader, by default an empty
//! [`MemoryLoader`]; a partial that cannot be found renders as nothing.
//!
//! # Caching
//!
//! Every compiled template is registered in memory under a key derived from
//! the engine's options and the exact source, so one source compiled under
//! different names is compiled once. A [`Cache`] behind the registry keeps
//! parse results across engines; see [`CacheConfig`].
//!
//! # Thread Safety
//!
//! `Engine` is `Send + Sync`. Renders share the registry through an
//! `RwLock`; each render owns its own context stack.

use crate::cache::{generate_cache_key, Cache, CompiledArtifact, MemoryCache, NoOpCache};
use crate::compiler::{compile, CompileOptions, Renderer, Template};
use crate::config::{CacheConfig, Config, PragmaSet};
use crate::context::Context;
use crate::error::Result;
use crate::escape::Escape;
use crate::helpers::HelperCollection;
use crate::loader::{Loader, StringLoader};
use crate::memory_loader::MemoryLoader;
use crate::parser::{parse, Node};
use crate::token::{Delimiters, Token};
use crate::tokenizer::scan;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace, warn};

#[cfg(feature = "filesystem")]
use crate::cache::FileSystemCache;

/// Engine version, part of every cache key.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main stache template engine.
///
/// # Examples
///
/// ```rust
/// use stache::{Config, Engine, Value};
///
/// let engine = Engine::new(Config::default())?
///     .with_partials([("user", "<b>{{name}}</b>")]);
///
/// let data = Value::from(serde_json::json!({ "users": [{ "name": "Ada" }, { "name": "Lin" }] }));
/// let out = engine.render("{{#users}}{{> user}}{{/users}}", &data)?;
/// assert_eq!(out, "<b>Ada</b><b>Lin</b>");
/// # Ok::<(), stache::StacheError>(())
/// ```
#[derive(Debug)]
pub struct Engine {
    config: Config,
    escape: Escape,
    delimiters: Delimiters,
    pragmas: PragmaSet,
    loader: Box<dyn Loader>,
    partials_loader: Box<dyn Loader>,
    cache: Box<dyn Cache>,
    templates: RwLock<HashMap<String, Arc<Template>>>,
    helpers: RwLock<HelperCollection>,
}

impl Engine {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StacheError::Config`](crate::StacheError::Config) for an unsupported charset, invalid
    /// delimiters or a zero recursion limit, and an I/O error if a cache
    /// directory cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let escape = config.escaper();
        let delimiters = config.initial_delimiters()?;
        let pragmas = config.pragma_set();
        let cache = build_cache(&config.cache)?;

        debug!(
            escape = %escape.cache_id(),
            delimiters = %delimiters,
            pragmas = %pragmas,
            "created engine"
        );

        Ok(Self {
            config,
            escape,
            delimiters,
            pragmas,
            loader: Box::new(StringLoader),
            partials_loader: Box::new(MemoryLoader::new()),
            cache,
            templates: RwLock::new(HashMap::new()),
            helpers: RwLock::new(HelperCollection::new()),
        })
    }

    /// Replaces the loader used for top-level template names.
    pub fn with_loader<L: Loader + 'static>(mut self, loader: L) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Replaces the loader used for partial and parent names.
    pub fn with_partials_loader<L: Loader + 'static>(mut self, loader: L) -> Self {
        self.partials_loader = Box::new(loader);
        self
    }

    /// Uses an in-memory map of partials.
    pub fn with_partials<I, K, V>(self, partials: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_partials_loader(partials.into_iter().collect::<MemoryLoader>())
    }

    /// Replaces the artifact cache.
    pub fn with_cache<C: Cache + 'static>(mut self, cache: C) -> Self {
        self.cache = Box::new(cache);
        self
    }

    /// Replaces escaping of `{{ name }}` output with a custom function.
    ///
    /// Templates compiled earlier keep the escaping they were compiled with.
    pub fn with_escape<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.escape = Escape::custom(f);
        self.config.escape = Some(self.escape.clone());
        self
    }

    /// Replaces every helper.
    pub fn with_helpers(self, helpers: HelperCollection) -> Self {
        *self.helpers.write().unwrap_or_else(PoisonError::into_inner) = helpers;
        self
    }

    /// The configuration the engine was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The escaping applied to `{{ name }}` tags.
    pub fn escape(&self) -> &Escape {
        &self.escape
    }

    /// Delimiters every template starts with.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Pragmas enabled for every template.
    pub fn pragmas(&self) -> &PragmaSet {
        &self.pragmas
    }

    /// Limit on nested partial, parent and lambda renders.
    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    /// Loads, compiles and renders the template `name`.
    ///
    /// # Errors
    ///
    /// Returns loader, syntax and render errors.
    pub fn render(&self, name: &str, data: &Value) -> Result<String> {
        let template = self.load_template(name)?;
        self.render_template(&template, data)
    }

    /// Renders a compiled template.
    ///
    /// Helpers form the outermost scope, then `data` unless it is null.
    pub fn render_template(&self, template: &Template, data: &Value) -> Result<String> {
        let mut context = Context::new();
        {
            let helpers = self.helpers.read().unwrap_or_else(PoisonError::into_inner);
            if !helpers.is_empty() {
                context.push(helpers.to_value());
            }
        }
        if !data.is_null() {
            context.push(data.clone());
        }

        trace!(template = template.name(), "rendering");
        Renderer::new(self, context).render(template)
    }

    /// Loads and compiles the template `name` through the main loader.
    pub fn load_template(&self, name: &str) -> Result<Arc<Template>> {
        let source = self.loader.load(name)?;
        let label = if source == name { "inline" } else { name };
        self.compile_with(label, &source, self.cache.as_ref())
    }

    /// Loads and compiles a partial. A missing partial is `None`.
    pub fn load_partial(&self, name: &str) -> Result<Option<Arc<Template>>> {
        match self.partials_loader.load(name) {
            Ok(source) => self.compile_with(name, &source, self.cache.as_ref()).map(Some),
            Err(e) if e.is_unknown_template() => {
                warn!(partial = name, "partial not found; rendering nothing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Compiles text returned by a lambda.
    ///
    /// When `delimiters` differ from the engine's, the text is compiled as if
    /// it started with a delimiter change to them.
    pub fn load_lambda(&self, text: &str, delimiters: Option<&Delimiters>) -> Result<Arc<Template>> {
        let source = match delimiters {
            Some(d) if *d != self.delimiters => format!("{}{}", d.switch_from(&self.delimiters), text),
            _ => text.to_string(),
        };

        if self.config.cache_lambda_templates {
            self.compile_with("lambda", &source, self.cache.as_ref())
        } else {
            self.compile_with("lambda", &source, &NoOpCache)
        }
    }

    /// Compiles `source` directly, bypassing the loader.
    pub fn compile(&self, source: &str) -> Result<Arc<Template>> {
        self.compile_with("source", source, self.cache.as_ref())
    }

    /// Scans `source` into tokens.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>> {
        scan(source, Some(&self.delimiters))
    }

    /// Scans and parses `source` into a tree.
    pub fn parse(&self, source: &str) -> Result<Vec<Node>> {
        parse(self.tokenize(source)?, &self.pragmas)
    }

    /// The key `source` is registered and cached under.
    pub fn cache_key(&self, source: &str) -> String {
        generate_cache_key(&self.fingerprint(), source)
    }

    fn fingerprint(&self) -> String {
        format!(
            "stache {}|escape={}|charset={}|strict_callables={}|strict_variables={}|pragmas={}|delimiters={}",
            VERSION,
            self.escape.cache_id(),
            self.config.charset.to_ascii_lowercase(),
            self.config.strict_callables,
            self.config.strict_variables,
            self.pragmas,
            self.delimiters,
        )
    }

    fn compile_with(&self, name: &str, source: &str, cache: &dyn Cache) -> Result<Arc<Template>> {
        let key = self.cache_key(source);

        if let Some(template) = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(template));
        }

        let artifact = match cache.get(&key) {
            Ok(Some(artifact)) => {
                debug!(template = name, key = %key, "loaded parse tree from cache");
                artifact
            }
            Ok(None) => self.parse_artifact(name, &key, source, cache)?,
            Err(e) => {
                warn!(template = name, error = %e, "cache read failed; recompiling");
                self.parse_artifact(name, &key, source, cache)?
            }
        };

        let options = CompileOptions {
            escape: self.escape.clone(),
            strict_callables: self.config.strict_callables,
            strict_variables: self.config.strict_variables,
            pragmas: self.pragmas.clone(),
            key: key.clone(),
        };
        let template = compile(&artifact.source, &artifact.tree, name, &options)
            .map_err(|e| e.in_template(name, source))?;

        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(templates.entry(key).or_insert_with(|| Arc::new(template))))
    }

    fn parse_artifact(
        &self,
        name: &str,
        key: &str,
        source: &str,
        cache: &dyn Cache,
    ) -> Result<Arc<CompiledArtifact>> {
        debug!(template = name, "compiling");
        let tree = self.parse(source).map_err(|e| e.in_template(name, source))?;
        let artifact = Arc::new(CompiledArtifact::new(name, key, source, tree));

        if let Err(e) = cache.set(key, Arc::clone(&artifact)) {
            warn!(template = name, error = %e, "failed to cache parse tree");
        }
        Ok(artifact)
    }

    /// Registers a helper visible to every template.
    pub fn add_helper(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.helpers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(name, value);
    }

    /// Looks a helper up.
    pub fn helper(&self, name: &str) -> Result<Value> {
        self.helpers.read().unwrap_or_else(PoisonError::into_inner).get(name)
    }

    /// True if a helper named `name` exists.
    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.read().unwrap_or_else(PoisonError::into_inner).has(name)
    }

    /// Unregisters a helper.
    pub fn remove_helper(&self, name: &str) -> Result<Value> {
        self.helpers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Drops every compiled template and clears the artifact cache.
    pub fn clear_cache(&self) -> Result<()> {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.cache.clear()
    }

    /// Number of compiled templates held in memory.
    pub fn template_count(&self) -> usize {
        self.templates.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn build_cache(config: &CacheConfig) -> Result<Box<dyn Cache>> {
    match config {
        CacheConfig::None => Ok(Box::new(NoOpCache)),
        CacheConfig::Memory { capacity } => Ok(Box::new(MemoryCache::new(*capacity))),
        #[cfg(feature = "filesystem")]
        CacheConfig::Directory {
            path,
            memory_capacity,
        } => Ok(Box::new(FileSystemCache::new(path, *memory_capacity)?)),
        #[cfg(not(feature = "filesystem"))]
        CacheConfig::Directory { .. } => Err(crate::error::StacheError::Config(
            "directory cache requires the filesystem feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StacheError;

    fn engine() -> Engine {
        Engine::new(Config::default()).unwrap()
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn same_source_compiles_once() {
        let engine = engine();
        let a = engine.compile("Hi {{x}}").unwrap();
        let b = engine.load_template("Hi {{x}}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.template_count(), 1);

        engine.clear_cache().unwrap();
        assert_eq!(engine.template_count(), 0);
    }

    #[test]
    fn cache_key_depends_on_options() {
        let plain = engine();
        let strict = Engine::new(Config::default().with_strict_variables(true)).unwrap();
        assert_eq!(plain.cache_key("x"), engine().cache_key("x"));
        assert_ne!(plain.cache_key("x"), strict.cache_key("x"));
        assert_ne!(plain.cache_key("x"), plain.cache_key("y"));

        let custom = engine().with_escape(|s| s.to_uppercase());
        assert_ne!(plain.cache_key("x"), custom.cache_key("x"));
    }

    #[test]
    fn shared_cache_skips_parsing() {
        let cache = MemoryCache::new(16);
        let first = engine().with_cache(cache.clone());
        first.compile("{{#a}}b{{/a}}").unwrap();
        assert_eq!(cache.len(), 1);

        let second = engine().with_cache(cache.clone());
        let key = second.cache_key("{{#a}}b{{/a}}");
        assert!(cache.contains_key(&key));
        let out = second
            .render_template(&second.compile("{{#a}}b{{/a}}").unwrap(), &Value::from(serde_json::json!({"a": true})))
            .unwrap();
        assert_eq!(out, "b");
    }

    #[test]
    fn lambda_templates_bypass_cache_by_default() {
        let cache = MemoryCache::new(16);
        let engine = engine().with_cache(cache.clone());
        engine.load_lambda("{{x}}", None).unwrap();
        assert!(cache.is_empty());

        let mut config = Config::default();
        config.cache_lambda_templates = true;
        let engine = Engine::new(config).unwrap().with_cache(cache.clone());
        engine.load_lambda("{{x}}", None).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lambda_text_gets_section_delimiters() {
        let engine = engine();
        let template = engine
            .load_lambda("|x|", Some(&Delimiters::new("|", "|")))
            .unwrap();
        assert_eq!(template.source(), "{{= | | =}}|x|");
        assert_eq!(template.name(), "lambda");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.charset = "ISO-8859-1".into();
        assert!(matches!(Engine::new(config), Err(StacheError::Config(_))));

        let mut config = Config::default();
        config.delimiters = "{{".into();
        assert!(matches!(Engine::new(config), Err(StacheError::Config(_))));
    }

    #[test]
    fn syntax_errors_name_the_template() {
        let engine = engine().with_partials([("broken", "{{#a}}")]);
        let err = engine.load_partial("broken").unwrap_err();
        assert!(err.to_string().contains("broken"), "{}", err);
        assert_eq!(engine.template_count(), 0);
    }

    #[test]
    fn missing_partial_is_none() {
        assert!(engine().load_partial("nope").unwrap().is_none());
    }
}
