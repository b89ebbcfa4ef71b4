// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template source loading.
//!
//! This module provides the [`Loader`] trait the engine uses to turn a
//! template or partial name into source text.
//!
//! # Loader Implementations
//!
//! - [`StringLoader`]: the name is the source (the engine's default main loader)
//! - [`FileSystemLoader`]: files under a base directory (native builds)
//! - [`CascadingLoader`]: tries several loaders in order
//! - [`MemoryLoader`](crate::MemoryLoader) and [`InlineLoader`](crate::InlineLoader):
//!   in-memory sources, see [`memory_loader`](crate::memory_loader)
//!
//! # Custom Loaders
//!
//! Implement [`Loader`] for other storage (network, database, etc.). Return
//! [`StacheError::UnknownTemplate`] for a miss so cascading and partial
//! lookup can tell a miss from a failure.

use crate::error::{Result, StacheError};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Converts a Path to a string with forward slashes.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    #[cfg(windows)]
    {
        path.as_ref().to_string_lossy().replace('\\', "/")
    }
    #[cfg(not(windows))]
    {
        path.as_ref().to_string_lossy().to_string()
    }
}

/// Turns template names into template source.
pub trait Loader: Send + Sync + std::fmt::Debug {
    /// Loads the source of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StacheError::UnknownTemplate`] when `name` does not exist.
    fn load(&self, name: &str) -> Result<String>;
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    fn load(&self, name: &str) -> Result<String> {
        (**self).load(name)
    }
}

impl<L: Loader + ?Sized> Loader for std::sync::Arc<L> {
    fn load(&self, name: &str) -> Result<String> {
        (**self).load(name)
    }
}

/// Treats the template name as the template source.
///
/// With this loader, `engine.render("Hello {{name}}", &data)` renders the
/// string itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLoader;

impl StringLoader {
    /// Creates a string loader.
    pub fn new() -> Self {
        Self
    }
}

impl Loader for StringLoader {
    fn load(&self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }
}

/// Loads `<base_dir>/<name><extension>`.
///
/// Names that would leave the base directory (absolute paths, `..`
/// components, or symlinks pointing outside) are reported as unknown.
///
/// # Examples
///
/// ```rust,ignore
/// use stache::FileSystemLoader;
///
/// // views/layouts/main.mustache
/// let loader = FileSystemLoader::new("./views");
/// let source = loader.load("layouts/main")?;
/// ```
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    base_dir: PathBuf,
    extension: String,
}

#[cfg(feature = "filesystem")]
impl FileSystemLoader {
    /// Creates a loader for `base_dir` with the `.mustache` extension.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            extension: ".mustache".to_string(),
        }
    }

    /// Sets the file extension. An empty extension uses names as-is.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = match extension {
            "" => String::new(),
            ext if ext.starts_with('.') => ext.to_string(),
            ext => format!(".{}", ext),
        };
        self
    }

    /// The base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn template_path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return None;
        }

        if self.extension.is_empty() || name.ends_with(&self.extension) {
            Some(self.base_dir.join(relative))
        } else {
            Some(self.base_dir.join(format!("{}{}", name, self.extension)))
        }
    }
}

#[cfg(feature = "filesystem")]
impl Loader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String> {
        let path = self
            .template_path(name)
            .filter(|p| p.is_file())
            .ok_or_else(|| StacheError::UnknownTemplate(name.to_string()))?;

        // Symlinks may still point outside the base directory
        if let (Ok(base), Ok(resolved)) = (self.base_dir.canonicalize(), path.canonicalize()) {
            if !resolved.starts_with(&base) {
                debug!(name, path = %path_to_string(&resolved), "template outside base directory");
                return Err(StacheError::UnknownTemplate(name.to_string()));
            }
        }

        debug!(name, path = %path_to_string(&path), "loading template");
        Ok(std::fs::read_to_string(&path)?)
    }
}

/// Tries each loader in order and returns the first hit.
#[derive(Debug, Default)]
pub struct CascadingLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl CascadingLoader {
    /// Creates an empty cascade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a loader, consulted after the ones already added.
    pub fn with_loader<L: Loader + 'static>(mut self, loader: L) -> Self {
        self.add_loader(loader);
        self
    }

    /// Appends a loader.
    pub fn add_loader<L: Loader + 'static>(&mut self, loader: L) {
        self.loaders.push(Box::new(loader));
    }
}

impl Loader for CascadingLoader {
    fn load(&self, name: &str) -> Result<String> {
        for loader in &self.loaders {
            match loader.load(name) {
                Err(e) if e.is_unknown_template() => continue,
                other => return other,
            }
        }
        Err(StacheError::UnknownTemplate(name.to_string()))
    }
}
