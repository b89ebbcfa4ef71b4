// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Check command: parse templates and report syntax errors.

use super::read_template;
use crate::config::Config;
use anyhow::bail;
use stache::Engine;
use std::path::{Path, PathBuf};

/// Result of checking one template.
#[derive(Debug)]
pub struct CheckReport {
    /// The template checked.
    pub path: PathBuf,
    /// The error message, if the template is invalid.
    pub error: Option<String>,
}

/// Runs the check command, printing one line per template.
pub fn run(templates: &[PathBuf], config: Option<&Path>) -> anyhow::Result<()> {
    let reports = check(templates, config)?;

    let mut failed = 0;
    for report in &reports {
        match &report.error {
            None => println!("ok      {}", report.path.display()),
            Some(error) => {
                failed += 1;
                eprintln!("error   {}: {}", report.path.display(), error);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} templates failed", failed, reports.len());
    }
    Ok(())
}

/// Parses each template and collects the outcome.
pub fn check(templates: &[PathBuf], config: Option<&Path>) -> anyhow::Result<Vec<CheckReport>> {
    let config = Config::load(config)?;
    let engine = Engine::new(config.engine)?;

    templates
        .iter()
        .map(|path| -> anyhow::Result<CheckReport> {
            let source = read_template(path)?;
            let error = engine.parse(&source).err().map(|e| {
                e.in_template(&path.display().to_string(), &source).to_string()
            });
            Ok(CheckReport {
                path: path.clone(),
                error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reports_each_template() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.mustache");
        let bad = dir.path().join("bad.mustache");
        std::fs::write(&good, "{{#a}}{{b}}{{/a}}").unwrap();
        std::fs::write(&bad, "line one\n{{#a}}{{/b}}").unwrap();

        let reports = check(&[good, bad.clone()], None).unwrap();
        assert!(reports[0].error.is_none());

        let error = reports[1].error.as_deref().unwrap();
        assert!(error.contains("Nesting error"), "{}", error);
        assert!(error.contains("bad.mustache"), "{}", error);

        assert!(run(&[bad], None).is_err());
    }
}
