// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
// StacheError::Syntax carries a source snippet
#![allow(clippy::result_large_err)]

//! # stache
//!
//! A logic-less Mustache template engine for Rust.
//!
//! Templates are scanned into tokens, parsed into a tree, compiled into
//! render steps and rendered against a stack of [`Value`] scopes. Compiled
//! templates are cached by a key derived from the engine options and the
//! exact source.
//!
//! ## Features
//!
//! - The full Mustache language: interpolation, sections, inverted sections,
//!   comments, partials, delimiter changes and lambdas
//! - Template inheritance with `{{< parent}}` and `{{$ block}}`
//! - Pragmas: `FILTERS`, `BLOCKS`, `DYNAMIC-NAMES`, `STRICT-VARIABLES`,
//!   `SELF-CLOSING`
//! - Standalone-line whitespace handling and partial indentation
//! - Pluggable loaders and artifact caches (memory or filesystem)
//!
//! ## Quick Start
//!
//! ```rust
//! use stache::{Config, Engine, Value};
//!
//! let engine = Engine::new(Config::default())?
//!     .with_partials([("item", "- {{.}}\n")]);
//!
//! let data = Value::from(serde_json::json!({ "title": "Fruit", "items": ["apple", "pear"] }));
//! let out = engine.render("{{title}}:\n{{#items}}\n  {{> item}}\n{{/items}}\n", &data)?;
//! assert_eq!(out, "Fruit:\n  - apple\n  - pear\n");
//! # Ok::<(), stache::StacheError>(())
//! ```

/// Token types and delimiters.
pub mod token;
/// Template scanner.
pub mod tokenizer;
/// Token stream to tree.
pub mod parser;
/// Tree to render steps, and the renderer.
pub mod compiler;
/// Data model seen by templates.
pub mod value;
/// Scope stack and name resolution.
pub mod context;
/// Main template engine.
pub mod engine;
/// Engine configuration and pragmas.
pub mod config;
/// Compiled artifact caching.
pub mod cache;
/// Template source loading.
pub mod loader;
/// In-memory loaders.
pub mod memory_loader;
/// Engine-wide helpers.
pub mod helpers;
/// Output escaping.
pub mod escape;
/// Error types and reporting.
pub mod error;

pub use cache::*;
pub use compiler::{CompileOptions, Template};
pub use config::{CacheConfig, Config, Pragma, PragmaSet};
pub use context::Context;
pub use engine::*;
pub use error::*;
pub use escape::{escape_html, EntityFlags, Escape};
pub use helpers::HelperCollection;
pub use loader::*;
pub use memory_loader::{InlineLoader, MemoryLoader};
pub use parser::Node;
pub use token::{Delimiters, Token, TokenKind};
pub use value::{to_value, Lambda, LambdaHelper, Resolve, Value};
