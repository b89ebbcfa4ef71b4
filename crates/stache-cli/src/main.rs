// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use stache_cli::commands;
use stache_cli::commands::render::RenderArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stache")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Logic-less Mustache templates from the command line", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Configuration file (defaults to ./stache.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template with JSON or TOML data
    Render {
        /// Template file
        template: PathBuf,
        /// Data file (.json or .toml)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Directory partials are loaded from
        #[arg(short, long)]
        partials: Option<PathBuf>,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check templates for syntax errors
    Check {
        /// Template files
        #[arg(required = true)]
        templates: Vec<PathBuf>,
    },
    /// Print the tokens of a template
    Tokens {
        /// Template file
        template: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Render {
            template,
            data,
            partials,
            output,
        } => commands::render::run(&RenderArgs {
            template: &template,
            data: data.as_deref(),
            partials: partials.as_deref(),
            config,
            output: output.as_deref(),
        }),
        Commands::Check { templates } => commands::check::run(&templates, config),
        Commands::Tokens { template, json } => commands::tokens::run(&template, config, json),
    }
}
