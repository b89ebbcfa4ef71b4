// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tokens command: dump the scanner output for a template.

use super::read_template;
use crate::config::Config;
use stache::{Engine, Token};
use std::fmt::Write as _;
use std::path::Path;

/// Runs the tokens command.
pub fn run(template: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config)?;
    let engine = Engine::new(config.engine)?;
    let tokens = engine.tokenize(&read_template(template)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        print!("{}", format_tokens(&tokens));
    }
    Ok(())
}

/// One line per token: line number, kind, value and standalone indent.
pub fn format_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let _ = write!(out, "{:>4}  {:<15} {:?}", token.line, format!("{:?}", token.kind), token.value);
        if let Some(indent) = &token.indent {
            let _ = write!(out, "  indent={:?}", indent);
        }
        out.push('\n');
    }
    out
}
