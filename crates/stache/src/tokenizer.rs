// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template tokenizer.
//!
//! Scans raw template text into a flat list of [`Token`]s with a three-state
//! machine (`InText`, `InTagType`, `InTag`), tracking the active delimiters.
//!
//! Tokens are buffered per source line. When a line ends, the line is
//! checked for the standalone rule: if it holds only whitespace and structural
//! tags (no interpolation), its text tokens are dropped, and a partial, parent
//! or block tag on that line keeps the whitespace before it as its indent.
//!
//! The tag type is the character right after the opening delimiter, so
//! `{{ #a }}` is a variable named `#a`.

use crate::error::{Result, StacheError};
use crate::token::{Delimiters, Token, TokenKind};

/// Scans `source` into tokens, starting with `delimiters` (or `{{ }}`).
///
/// # Errors
///
/// Returns a syntax error for unclosed tags, malformed delimiter changes
/// and mismatched triple mustaches.
pub fn scan(source: &str, delimiters: Option<&Delimiters>) -> Result<Vec<Token>> {
    Tokenizer::new(source, delimiters.cloned().unwrap_or_default()).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InText,
    InTagType,
    InTag,
}

struct Tokenizer<'s> {
    source: &'s str,
    state: State,
    delimiters: Delimiters,
    tokens: Vec<Token>,
    line_tokens: Vec<Token>,
    line: usize,
    text_start: usize,
    tag_start: usize,
    tag_line: usize,
    tag_kind: TokenKind,
    triple: bool,
}

impl<'s> Tokenizer<'s> {
    fn new(source: &'s str, delimiters: Delimiters) -> Self {
        Self {
            source,
            state: State::InText,
            delimiters,
            tokens: Vec::new(),
            line_tokens: Vec::new(),
            line: 1,
            text_start: 0,
            tag_start: 0,
            tag_line: 1,
            tag_kind: TokenKind::Escaped,
            triple: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let len = self.source.len();
        let mut pos = 0;

        while pos < len {
            pos = match self.state {
                State::InText => self.scan_text(pos),
                State::InTagType => self.scan_tag_type(pos),
                State::InTag => self.scan_tag(pos)?,
            };
        }

        if self.state != State::InText {
            return Err(self.unclosed_tag());
        }

        self.flush_text(len);
        self.end_line();
        Ok(self.tokens)
    }

    fn scan_text(&mut self, pos: usize) -> usize {
        let rest = &self.source[pos..];

        if rest.starts_with(self.delimiters.open.as_str()) {
            self.flush_text(pos);
            self.tag_start = pos;
            self.tag_line = self.line;
            self.state = State::InTagType;
            return pos + self.delimiters.open.len();
        }

        let Some(ch) = rest.chars().next() else {
            return self.source.len();
        };
        let next = pos + ch.len_utf8();

        if ch == '\n' {
            self.flush_text(next);
            self.end_line();
            self.line += 1;
        }

        next
    }

    fn scan_tag_type(&mut self, pos: usize) -> usize {
        let rest = &self.source[pos..];

        self.triple = false;
        self.state = State::InTag;

        let Some(kind) = rest.chars().next().and_then(TokenKind::from_sigil) else {
            self.tag_kind = TokenKind::Escaped;
            return pos;
        };

        // Every sigil is a single ASCII byte.
        let mut consumed = 1;
        self.tag_kind = kind;
        self.triple = rest.starts_with('{');

        if kind == TokenKind::Partial && rest[1..].starts_with('*') {
            self.tag_kind = TokenKind::DynamicPartial;
            consumed += 1;
        }

        pos + consumed
    }

    fn scan_tag(&mut self, pos: usize) -> Result<usize> {
        let close = if self.tag_kind == TokenKind::Delimiters {
            format!("={}", self.delimiters.close)
        } else {
            self.delimiters.close.clone()
        };

        let Some(offset) = self.source[pos..].find(close.as_str()) else {
            return Err(self.unclosed_tag());
        };

        let body_end = pos + offset;
        let mut end = body_end + close.len();
        let body = &self.source[pos..body_end];
        self.line += body.matches('\n').count();

        let mut new_delimiters = None;
        let value = match self.tag_kind {
            TokenKind::Delimiters => {
                new_delimiters = Some(
                    Delimiters::parse(body, self.tag_line)
                        .map_err(|e| e.in_source(self.source, self.tag_start))?,
                );
                body.trim().to_string()
            }
            TokenKind::Comment => body.to_string(),
            TokenKind::Unescaped if self.triple => {
                let name = body.trim();
                if let Some(stripped) = name.strip_suffix('}') {
                    stripped.trim_end().to_string()
                } else if self.source[end..].starts_with('}') {
                    end += 1;
                    name.to_string()
                } else {
                    return Err(self.error_at_tag(format!("Mismatched tag delimiters: {{{}", name)));
                }
            }
            _ => body.trim().to_string(),
        };

        self.line_tokens.push(Token {
            kind: self.tag_kind,
            value,
            line: self.tag_line,
            start: self.tag_start,
            end,
            delimiters: self.delimiters.clone(),
            indent: None,
        });

        if let Some(delimiters) = new_delimiters {
            self.delimiters = delimiters;
        }

        self.text_start = end;
        self.state = State::InText;
        Ok(end)
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.line_tokens.push(Token {
                kind: TokenKind::Text,
                value: self.source[self.text_start..end].to_string(),
                line: self.line,
                start: self.text_start,
                end,
                delimiters: self.delimiters.clone(),
                indent: None,
            });
        }
        self.text_start = end;
    }

    /// Applies the standalone rule to the buffered line and moves it to the output.
    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.line_tokens);

        let has_tag = line.iter().any(|t| t.kind != TokenKind::Text);
        let standalone = has_tag
            && line.iter().all(|t| match t.kind {
                TokenKind::Text => t.is_whitespace(),
                kind => kind.can_stand_alone(),
            });

        if !standalone {
            self.tokens.extend(line);
            return;
        }

        // Indent is the whitespace directly before the tag
        let mut indent = String::new();
        for mut token in line {
            if token.kind == TokenKind::Text {
                indent.push_str(&token.value);
                continue;
            }
            if token.kind.takes_indent() {
                token.indent = Some(std::mem::take(&mut indent));
            } else {
                indent.clear();
            }
            self.tokens.push(token);
        }
    }

    fn unclosed_tag(&self) -> StacheError {
        let snippet: String = self.source[self.tag_start..].chars().take(20).collect();
        self.error_at_tag(format!("Unclosed tag: {}", snippet.trim_end()))
    }

    fn error_at_tag(&self, message: String) -> StacheError {
        StacheError::syntax(message, self.tag_line).in_source(self.source, self.tag_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_text_and_variables() {
        let tokens = scan("Hello {{ name }}!", None).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Text, TokenKind::Escaped, TokenKind::Text]
        );
        assert_eq!(tokens[1].value, "name");
        assert_eq!(tokens[1].start, 6);
        assert_eq!(tokens[1].end, 16);
    }

    #[test]
    fn classifies_sigils() {
        let tokens = scan("{{#a}}{{^b}}{{/b}}{{/a}}{{>p}}{{!c}}{{&u}}{{{t}}}", None).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Section,
                TokenKind::Inverted,
                TokenKind::Close,
                TokenKind::Close,
                TokenKind::Partial,
                TokenKind::Comment,
                TokenKind::Unescaped,
                TokenKind::Unescaped,
            ]
        );
        assert_eq!(tokens[7].value, "t");
        assert_eq!(tokens[7].end, 49);
    }

    #[test]
    fn triple_mustache_with_custom_delimiters() {
        let tokens = scan("{{=<% %>=}}<%{ t }%>", None).unwrap();
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Unescaped);
        assert_eq!(tokens.last().unwrap().value, "t");
    }

    #[test]
    fn delimiter_change_applies_to_following_tags() {
        let tokens = scan("{{=<% %>=}}<% name %> {{ text }}", None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Delimiters);
        assert_eq!(tokens[1].kind, TokenKind::Escaped);
        assert_eq!(tokens[1].delimiters, Delimiters::new("<%", "%>"));
        assert_eq!(tokens[2].value, " {{ text }}");
    }

    #[test]
    fn splits_text_at_newlines() {
        let tokens = scan("a\nb\n", None).unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["a\n", "b\n"]);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn standalone_lines_drop_whitespace() {
        let tokens = scan("  {{#a}}\nx\n  {{/a}}  \n", None).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Section, TokenKind::Text, TokenKind::Close]
        );
        assert_eq!(tokens[1].value, "x\n");
    }

    #[test]
    fn standalone_partial_keeps_indent() {
        let tokens = scan("  {{> item }}\n", None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].indent.as_deref(), Some("  "));
    }

    #[test]
    fn tag_only_lines_stand_alone() {
        let tokens = scan(" {{#a}}{{/a}}\n", None).unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Section, TokenKind::Close]);

        let tokens = scan("  {{! note }} {{> p }}\n", None).unwrap();
        assert_eq!(tokens[1].indent.as_deref(), Some(" "));
    }

    #[test]
    fn inline_partials_have_no_indent() {
        let tokens = scan("x {{> p }}\n", None).unwrap();
        assert_eq!(tokens[1].indent, None);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn variables_never_stand_alone() {
        let tokens = scan("  {{ name }}\n", None).unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn crlf_line_endings_stand_alone() {
        let tokens = scan("|\r\n{{#a}}\r\n{{/a}}\r\n|", None).unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["|\r\n", "a", "a", "|"]);
    }

    #[test]
    fn multiline_comment_is_standalone() {
        let tokens = scan("Begin.\n{{!\nnote\n}}\nEnd.\n", None).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Text, TokenKind::Comment, TokenKind::Text]
        );
        assert_eq!(tokens[2].line, 5);
    }

    #[test]
    fn dynamic_partial_marker() {
        let tokens = scan("{{>* name }}", None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DynamicPartial);
        assert_eq!(tokens[0].value, "name");
    }

    #[test]
    fn unclosed_tag_is_an_error() {
        let err = scan("Hello {{ name", None).unwrap_err();
        assert!(err.to_string().contains("Unclosed tag"));
        assert!(scan("{{", None).is_err());
    }

    #[test]
    fn mismatched_triple_is_an_error() {
        assert!(scan("{{{ name }}", None).is_err());
    }

    #[test]
    fn errors_point_at_the_tag() {
        let err = scan("ok
Hello {{ name", None).unwrap_err();
        let StacheError::Syntax {
            line,
            source_context: Some(ctx),
            ..
        } = &err
        else {
            panic!("expected syntax error with context, got {:?}", err);
        };
        assert_eq!(*line, 2);
        assert_eq!(ctx.error_column, 7);
        assert!(err.to_string().contains("   2 | Hello {{ name\n     |       ^"));
    }

    #[test]
    fn sigil_must_follow_the_delimiter() {
        let tokens = scan("{{ #a }}{{ >p }}", None).unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Escaped, TokenKind::Escaped]);
        assert_eq!(tokens[0].value, "#a");
        assert_eq!(tokens[1].value, ">p");
    }

    #[test]
    fn standalone_block_tags_keep_indent() {
        let tokens = scan("  {{$a}}{{/a}}\n{{$b}}x{{/b}}\n", None).unwrap();
        assert_eq!(tokens[0].indent.as_deref(), Some("  "));
        assert_eq!(tokens[2].kind, TokenKind::Block);
        assert_eq!(tokens[2].indent, None);
    }
}
