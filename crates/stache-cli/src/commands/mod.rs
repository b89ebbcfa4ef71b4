// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `render`: Render a template with JSON or TOML data
//! - `check`: Report syntax errors in templates
//! - `tokens`: Dump the token stream of a template

/// Template rendering command.
pub mod render;
/// Syntax check command.
pub mod check;
/// Token dump command.
pub mod tokens;

use crate::config::Config;
use anyhow::Context as _;
use stache::{Engine, FileSystemLoader};
use std::path::Path;

/// Builds an engine whose partials are files under `partials_dir`.
pub(crate) fn engine_for(config: &Config, partials_dir: &Path) -> anyhow::Result<Engine> {
    let loader = FileSystemLoader::new(partials_dir).with_extension(&config.templates.extension);
    Ok(Engine::new(config.engine.clone())?.with_partials_loader(loader))
}

/// Reads a template file.
pub(crate) fn read_template(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// The directory partials of `template` are looked up in.
pub(crate) fn partials_dir_for(config: &Config, template: &Path, explicit: Option<&Path>) -> std::path::PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.templates.partials_dir.clone())
        .or_else(|| template.parent().map(Path::to_path_buf))
        .unwrap_or_default()
}
