// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Output escaping for `{{ name }}` interpolation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which quote characters HTML escaping encodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFlags {
    /// `&`, `<`, `>` and `"`.
    #[default]
    Compat,
    /// Also encodes `'` as `&#039;`.
    Quotes,
    /// Leaves both quote characters alone.
    NoQuotes,
}

impl EntityFlags {
    fn as_str(self) -> &'static str {
        match self {
            EntityFlags::Compat => "compat",
            EntityFlags::Quotes => "quotes",
            EntityFlags::NoQuotes => "no_quotes",
        }
    }
}

/// User-supplied escape function.
pub type EscapeFn = dyn Fn(&str) -> String + Send + Sync;

/// The escaping applied to escaped interpolations.
#[derive(Clone)]
pub enum Escape {
    /// Built-in HTML entity escaping.
    Html(EntityFlags),
    /// A custom escape function.
    Custom(Arc<EscapeFn>),
}

impl Default for Escape {
    fn default() -> Self {
        Escape::Html(EntityFlags::default())
    }
}

impl fmt::Debug for Escape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Escape::Html(flags) => f.debug_tuple("Html").field(flags).finish(),
            Escape::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Escape {
    /// Wraps a custom escape function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Escape::Custom(Arc::new(f))
    }

    /// Escapes `text`.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Escape::Html(flags) => escape_html(text, *flags),
            Escape::Custom(f) => f(text),
        }
    }

    /// Identifier folded into template cache keys.
    pub fn cache_id(&self) -> String {
        match self {
            Escape::Html(flags) => format!("html:{}", flags.as_str()),
            Escape::Custom(_) => "custom".to_string(),
        }
    }
}

/// HTML-escapes `text` according to `flags`.
pub fn escape_html(text: &str, flags: EntityFlags) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if flags != EntityFlags::NoQuotes => out.push_str("&quot;"),
            '\'' if flags == EntityFlags::Quotes => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Accepts UTF-8 under its common spellings.
pub(crate) fn is_utf8_charset(charset: &str) -> bool {
    matches!(charset.to_ascii_lowercase().as_str(), "utf-8" | "utf8")
}
