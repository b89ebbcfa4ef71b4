// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project configuration.
//!
//! Configuration is loaded from `stache.toml` in the current directory, or
//! from the file given with `--config`.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! strict_variables = true
//! pragmas = ["FILTERS", "BLOCKS"]
//! entity_flags = "quotes"
//! cache = { kind = "directory", path = ".stache/cache" }
//!
//! [templates]
//! extension = "mustache"
//! partials_dir = "partials"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "stache.toml";

/// Main configuration structure loaded from `stache.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Engine options, passed to [`stache::Engine::new`].
    #[serde(default)]
    pub engine: stache::Config,
    /// Where templates and partials live.
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Template file settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Extension of partial files (default: "mustache").
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Directory partials are loaded from. Defaults to the directory of the
    /// template being rendered.
    #[serde(default)]
    pub partials_dir: Option<PathBuf>,
}

fn default_extension() -> String {
    "mustache".to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            partials_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from `stache.toml` in the current
    /// directory when no path is given.
    ///
    /// A missing `stache.toml` yields the default configuration; a missing
    /// explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Config::default());
                }
                default_path
            }
        };

        debug!(path = %config_path.display(), "loading configuration");
        let content = fs::read_to_string(config_path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.engine.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stache::{CacheConfig, EntityFlags, Pragma};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.engine.strict_callables);
        assert_eq!(config.engine.max_depth, 256);
        assert_eq!(config.templates.extension, "mustache");
        assert!(config.templates.partials_dir.is_none());
    }

    #[test]
    fn test_engine_table() {
        let config = Config::from_toml(
            r#"
[engine]
strict_variables = true
pragmas = ["FILTERS", "DYNAMIC-NAMES"]
entity_flags = "quotes"
delimiters = "<% %>"
cache = { kind = "memory", capacity = 32 }

[templates]
extension = "html"
partials_dir = "views/partials"
"#,
        )
        .unwrap();

        assert!(config.engine.strict_variables);
        assert_eq!(config.engine.pragmas, vec![Pragma::Filters, Pragma::DynamicNames]);
        assert_eq!(config.engine.entity_flags, EntityFlags::Quotes);
        assert_eq!(config.engine.delimiters, "<% %>");
        assert_eq!(config.engine.cache, CacheConfig::Memory { capacity: 32 });
        assert_eq!(config.templates.extension, "html");
        assert_eq!(
            config.templates.partials_dir.as_deref(),
            Some(Path::new("views/partials"))
        );
    }

    #[test]
    fn test_directory_cache_default_capacity() {
        let config = Config::from_toml(
            r#"
[engine]
cache = { kind = "directory", path = ".stache/cache" }
"#,
        )
        .unwrap();
        assert_eq!(
            config.engine.cache,
            CacheConfig::Directory {
                path: PathBuf::from(".stache/cache"),
                memory_capacity: 256,
            }
        );
    }

    #[test]
    fn test_invalid_engine_options() {
        assert!(Config::from_toml("[engine]\ncharset = \"latin1\"\n").is_err());
        assert!(Config::from_toml("[engine]\npragmas = [\"NOPE\"]\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/stache.toml"))).is_err());
    }
}
