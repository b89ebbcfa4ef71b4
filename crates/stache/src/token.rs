// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Token and delimiter types shared by the tokenizer and parser.

use crate::error::{Result, StacheError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a scanned token, derived from the tag sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Literal text between tags.
    Text,
    /// `{{ name }}`
    Escaped,
    /// `{{{ name }}}` or `{{& name }}`
    Unescaped,
    /// `{{# name }}`
    Section,
    /// `{{^ name }}`
    Inverted,
    /// `{{/ name }}`
    Close,
    /// `{{> name }}`
    Partial,
    /// `{{>* name }}`
    DynamicPartial,
    /// `{{< name }}`
    Parent,
    /// `{{$ name }}`
    Block,
    /// `{{! comment }}`
    Comment,
    /// `{{= <% %> =}}`
    Delimiters,
    /// `{{% PRAGMA }}`
    Pragma,
}

impl TokenKind {
    /// Maps a tag sigil to its kind. `None` means the tag is an escaped variable.
    pub fn from_sigil(sigil: char) -> Option<Self> {
        match sigil {
            '#' => Some(TokenKind::Section),
            '^' => Some(TokenKind::Inverted),
            '/' => Some(TokenKind::Close),
            '>' => Some(TokenKind::Partial),
            '<' => Some(TokenKind::Parent),
            '$' => Some(TokenKind::Block),
            '!' => Some(TokenKind::Comment),
            '=' => Some(TokenKind::Delimiters),
            '%' => Some(TokenKind::Pragma),
            '{' | '&' => Some(TokenKind::Unescaped),
            _ => None,
        }
    }

    /// Tags that may sit alone on a line and take the line's whitespace with them.
    pub fn can_stand_alone(self) -> bool {
        matches!(
            self,
            TokenKind::Section
                | TokenKind::Inverted
                | TokenKind::Close
                | TokenKind::Partial
                | TokenKind::DynamicPartial
                | TokenKind::Parent
                | TokenKind::Block
                | TokenKind::Comment
                | TokenKind::Delimiters
                | TokenKind::Pragma
        )
    }

    /// Tags that capture the indentation of a standalone line.
    pub fn takes_indent(self) -> bool {
        matches!(
            self,
            TokenKind::Partial | TokenKind::DynamicPartial | TokenKind::Parent | TokenKind::Block
        )
    }
}

/// An open/close tag delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delimiters {
    /// Opening delimiter, `{{` by default.
    pub open: String,
    /// Closing delimiter, `}}` by default.
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

impl Delimiters {
    /// Creates a delimiter pair.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Parses `"<open> <close>"`, the body of a `{{= ... =}}` tag.
    pub fn parse(body: &str, line: usize) -> Result<Self> {
        let mut parts = body.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(open), Some(close), None) if !open.contains('=') && !close.contains('=') => {
                Ok(Self::new(open, close))
            }
            _ => Err(StacheError::syntax(
                format!("Invalid delimiter change: {}", body.trim()),
                line,
            )),
        }
    }

    /// True for `{{ }}`.
    pub fn is_default(&self) -> bool {
        self.open == "{{" && self.close == "}}"
    }

    /// The delimiter-change tag, written in `active` delimiters, that switches to this pair.
    pub fn switch_from(&self, active: &Delimiters) -> String {
        format!("{}= {} {} ={}", active.open, self.open, self.close, active.close)
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}

/// A single scanned token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Literal text for [`TokenKind::Text`], trimmed tag name otherwise.
    pub value: String,
    /// Source line the token starts on (1-indexed).
    pub line: usize,
    /// Byte offset of the token start in the source.
    pub start: usize,
    /// Byte offset just past the token end in the source.
    pub end: usize,
    /// Delimiters active when the token was scanned.
    pub delimiters: Delimiters,
    /// Whitespace removed from in front of a standalone partial, parent or block tag.
    pub indent: Option<String>,
}

impl Token {
    /// True for text tokens containing only whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Text && self.value.chars().all(char::is_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delimiter_change_body() {
        let delims = Delimiters::parse(" <% %> ", 1).unwrap();
        assert_eq!(delims, Delimiters::new("<%", "%>"));
        assert_eq!(delims.switch_from(&Delimiters::default()), "{{= <% %> =}}");
    }

    #[test]
    fn rejects_malformed_delimiters() {
        assert!(Delimiters::parse("<%", 1).is_err());
        assert!(Delimiters::parse("<% %> |", 1).is_err());
        assert!(Delimiters::parse("<= =>", 1).is_err());
    }

    #[test]
    fn sigils_map_to_kinds() {
        assert_eq!(TokenKind::from_sigil('#'), Some(TokenKind::Section));
        assert_eq!(TokenKind::from_sigil('&'), Some(TokenKind::Unescaped));
        assert_eq!(TokenKind::from_sigil('n'), None);
        assert!(TokenKind::Comment.can_stand_alone());
        assert!(!TokenKind::Escaped.can_stand_alone());
    }
}
