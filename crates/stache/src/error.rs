// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the stache template engine.
//!
//! This module defines [`StacheError`], the single error enum returned by
//! every fallible operation, and [`SourceContext`] for rendering the
//! offending template lines alongside syntax errors.
//!
//! # Error Categories
//!
//! - **Syntax errors**: unclosed or mismatched sections, illegal parent content
//! - **Unknown template**: a loader miss (partials downgrade this to empty output)
//! - **Unknown filter / helper / variable**: render-time lookup failures
//! - **Recursion limit**: partial, parent or lambda nesting beyond `max_depth`
//! - **Cache errors**: persistent cache failures

use std::fmt;
use thiserror::Error;

/// Source context for syntax error messages.
///
/// Captures the template lines around an error so the message can show
/// where nesting went wrong.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the template source.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context around `line` (1-indexed).
    ///
    /// Keeps two lines before and after the error line.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Creates a source context pointing at a byte offset in `source`.
    pub fn at_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map(|nl| before[nl + 1..].chars().count() + 1)
            .unwrap_or_else(|| before.chars().count() + 1);
        Self::from_source(source, line, column)
    }

    /// Formats the snippet with line numbers and a caret under the error.
    ///
    /// ```text
    ///    1 | {{#list}}
    ///    2 |   {{name}}
    ///    3 | {{/lsit}}
    ///      | ^
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num == 0 || line_num > self.lines.len() {
                break;
            }

            let line = &self.lines[line_num - 1];
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Displays an optional source context, printing nothing for `None`.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "\n{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// The main error type for stache operations.
#[derive(Error, Debug)]
pub enum StacheError {
    /// The template is structurally invalid. Fatal for the template being compiled.
    #[error("Syntax error in {}: {message} (line {line}){}", template.as_deref().unwrap_or("template"), source_context.as_display())]
    Syntax {
        /// Description of the defect.
        message: String,
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Template name, if known.
        template: Option<String>,
        /// Source snippet around the error.
        source_context: Option<SourceContext>,
    },

    /// A loader could not find the named template.
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// A filter in a `name | filter` pipe did not resolve to a lambda.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// A helper was requested that is not registered.
    #[error("Unknown helper: {0}")]
    UnknownHelper(String),

    /// A name did not resolve while strict variables were enabled.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Partial, parent or lambda nesting exceeded the configured depth.
    #[error("Recursion limit of {limit} exceeded while rendering {template}")]
    RecursionLimit {
        /// The configured maximum depth.
        limit: usize,
        /// The template that would have exceeded it.
        template: String,
    },

    /// Cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lambda reported a failure.
    #[error("Lambda error: {0}")]
    Lambda(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StacheError {
    /// Builds a syntax error without template context.
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        StacheError::Syntax {
            message: message.into(),
            line,
            template: None,
            source_context: None,
        }
    }

    /// Attaches the template name and a source snippet to a syntax error.
    ///
    /// Other variants pass through untouched.
    pub fn in_template(self, name: &str, source: &str) -> Self {
        match self {
            StacheError::Syntax {
                message,
                line,
                template,
                source_context,
            } => StacheError::Syntax {
                message,
                line,
                template: template.or_else(|| Some(name.to_string())),
                source_context: source_context
                    .or_else(|| Some(SourceContext::from_source(source, line, 1))),
            },
            other => other,
        }
    }

    /// Attaches a snippet pointing at byte `offset` of `source` to a syntax error.
    pub fn in_source(self, source: &str, offset: usize) -> Self {
        match self {
            StacheError::Syntax {
                message,
                line,
                template,
                source_context: None,
            } => StacheError::Syntax {
                message,
                line,
                template,
                source_context: Some(SourceContext::at_offset(source, offset)),
            },
            other => other,
        }
    }

    /// Returns true for loader misses.
    pub fn is_unknown_template(&self) -> bool {
        matches!(self, StacheError::UnknownTemplate(_))
    }
}

/// Convenience type alias for Results with [`StacheError`].
pub type Result<T> = std::result::Result<T, StacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_error_line() {
        let ctx = SourceContext::from_source("a\nb\nc\nd", 3, 2);
        let snippet = ctx.format_snippet();
        assert!(snippet.contains("   3 | c\n     |  ^\n"));
        assert!(snippet.starts_with("   1 | a"));
    }

    #[test]
    fn offset_maps_to_line_and_column() {
        let ctx = SourceContext::at_offset("ab\ncd", 4);
        assert_eq!(ctx.error_line, 2);
        assert_eq!(ctx.error_column, 2);
    }

    #[test]
    fn in_template_fills_missing_context() {
        let err = StacheError::syntax("Missing closing tag: a", 1).in_template("page", "{{#a}}");
        let message = err.to_string();
        assert!(message.contains("page"));
        assert!(message.contains("Missing closing tag: a"));
        assert!(message.contains("{{#a}}"));
    }
}
