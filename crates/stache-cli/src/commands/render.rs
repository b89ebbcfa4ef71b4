// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render command: one template, one data file, output to stdout or a file.

use super::{engine_for, partials_dir_for, read_template};
use crate::config::Config;
use anyhow::{bail, Context as _};
use stache::Value;
use std::fs;
use std::path::Path;
use tracing::info;

/// Options for the render command.
#[derive(Debug, Clone, Copy)]
pub struct RenderArgs<'a> {
    /// Template file.
    pub template: &'a Path,
    /// JSON or TOML data file.
    pub data: Option<&'a Path>,
    /// Partials directory, overriding the configuration.
    pub partials: Option<&'a Path>,
    /// Configuration file.
    pub config: Option<&'a Path>,
    /// Output file; stdout when absent.
    pub output: Option<&'a Path>,
}

impl<'a> RenderArgs<'a> {
    /// Arguments for rendering `template` with no data and default settings.
    pub fn new(template: &'a Path) -> Self {
        Self {
            template,
            data: None,
            partials: None,
            config: None,
            output: None,
        }
    }
}

/// Runs the render command.
pub fn run(args: &RenderArgs<'_>) -> anyhow::Result<()> {
    let rendered = render(args)?;

    match args.output {
        Some(output) => {
            fs::write(output, rendered)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(output = %output.display(), "wrote rendered template");
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Renders the template described by `args` to a string.
pub fn render(args: &RenderArgs<'_>) -> anyhow::Result<String> {
    let config = Config::load(args.config)?;
    let partials_dir = partials_dir_for(&config, args.template, args.partials);
    let engine = engine_for(&config, &partials_dir)?;

    let data = match args.data {
        Some(path) => load_data(path)?,
        None => Value::Null,
    };

    let source = read_template(args.template)?;
    let template = engine
        .compile(&source)
        .with_context(|| format!("failed to compile {}", args.template.display()))?;
    engine
        .render_template(&template, &data)
        .with_context(|| format!("failed to render {}", args.template.display()))
}

/// Loads render data from a `.json` or `.toml` file.
pub fn load_data(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => {
            let data: toml::Value = toml::from_str(&content)?;
            Ok(stache::to_value(&data)?)
        }
        Some("json") | None => {
            let data: serde_json::Value = serde_json::from_str(&content)?;
            Ok(Value::from(data))
        }
        Some(other) => bail!("unsupported data format: .{}", other),
    }
}
