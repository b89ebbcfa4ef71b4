// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Parse tree construction.
//!
//! [`parse`] turns the flat token stream into a tree of [`Node`]s, checking
//! that every section is closed by a tag with the same name. Pragma tags are
//! honored as they appear, so `{{% BLOCKS }}` changes how every later tag in
//! the same template is read.

use crate::config::{Pragma, PragmaSet};
use crate::error::{Result, StacheError};
use crate::token::{Delimiters, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::vec;

/// A node of the parse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Literal text.
    Text {
        /// The text, newline included if the source line had one.
        text: String,
    },
    /// `{{ name }}`, `{{{ name }}}` or `{{& name }}`.
    Variable {
        /// Name, dotted path or filter pipe.
        name: String,
        /// False for the unescaped forms.
        escape: bool,
        /// Source line.
        line: usize,
    },
    /// `{{# name }}...{{/ name }}` or `{{^ name }}...{{/ name }}`.
    Section {
        /// Name, dotted path or filter pipe.
        name: String,
        /// True for `{{^ name }}`.
        inverted: bool,
        /// Body nodes.
        children: Vec<Node>,
        /// Byte offset where the body starts.
        start: usize,
        /// Byte offset where the body ends.
        end: usize,
        /// Delimiters active at the opening tag.
        delimiters: Delimiters,
        /// Source line of the opening tag.
        line: usize,
    },
    /// `{{> name }}` or `{{>* name }}`.
    Partial {
        /// Partial name, or the variable holding it when `dynamic`.
        name: String,
        /// Resolve `name` from the context first.
        dynamic: bool,
        /// Indent of a standalone tag, `None` when inline.
        indent: Option<String>,
        /// Source line.
        line: usize,
    },
    /// `{{< name }}...{{/ name }}`, a parent template with block overrides.
    Parent {
        /// Parent template name.
        name: String,
        /// Indent of a standalone tag, `None` when inline.
        indent: Option<String>,
        /// Override blocks, all [`Node::Block`].
        blocks: Vec<Node>,
        /// Source line.
        line: usize,
    },
    /// `{{$ name }}...{{/ name }}`, a replaceable block with default content.
    Block {
        /// Block name.
        name: String,
        /// Default content, or the override inside a parent.
        children: Vec<Node>,
        /// Indent of a standalone opening tag, `None` when inline.
        #[serde(default)]
        indent: Option<String>,
        /// Source line.
        line: usize,
    },
    /// `{{% NAME }}`.
    Pragma {
        /// Pragma name as written.
        name: String,
        /// Source line.
        line: usize,
    },
}

/// Builds a parse tree from `tokens`, starting with the `pragmas` enabled.
///
/// # Errors
///
/// Returns a syntax error for unclosed, unexpected or mismatched closing
/// tags and for illegal content inside a parent tag.
pub fn parse(tokens: Vec<Token>, pragmas: &PragmaSet) -> Result<Vec<Node>> {
    let mut parser = Parser {
        tokens: tokens.into_iter(),
        pragmas: pragmas.clone(),
    };
    let (nodes, _) = parser.build_tree(None)?;
    Ok(nodes)
}

struct Parser {
    tokens: vec::IntoIter<Token>,
    pragmas: PragmaSet,
}

impl Parser {
    /// Collects nodes until `parent` is closed or input ends.
    ///
    /// Returns the children together with the closing token.
    fn build_tree(&mut self, parent: Option<&Token>) -> Result<(Vec<Node>, Option<Token>)> {
        let mut nodes = Vec::new();
        let in_parent = parent.is_some_and(|p| p.kind == TokenKind::Parent);

        while let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Text => {
                    if !in_parent {
                        nodes.push(Node::Text { text: token.value });
                    }
                }
                TokenKind::Comment | TokenKind::Delimiters => {}
                TokenKind::Pragma => {
                    self.pragmas.enable_name(&token.value);
                    if !in_parent {
                        nodes.push(Node::Pragma {
                            name: token.value,
                            line: token.line,
                        });
                    }
                }
                TokenKind::Close => {
                    let Some(open) = parent else {
                        return Err(StacheError::syntax(
                            format!(
                                "Unexpected closing tag: /{} on line {}",
                                token.value, token.line
                            ),
                            token.line,
                        ));
                    };
                    if open.value != token.value {
                        return Err(StacheError::syntax(
                            format!(
                                "Nesting error: {} (on line {}) vs. {} (on line {})",
                                open.value, open.line, token.value, token.line
                            ),
                            token.line,
                        ));
                    }
                    return Ok((nodes, Some(token)));
                }
                TokenKind::Block if in_parent || self.blocks() => {
                    let node = self.block(token)?;
                    nodes.push(node);
                }
                _ if in_parent => {
                    return Err(StacheError::syntax(
                        format!(
                            "Illegal content in < parent tag: {} on line {}",
                            token.value, token.line
                        ),
                        token.line,
                    ));
                }
                TokenKind::Escaped | TokenKind::Unescaped => nodes.push(Node::Variable {
                    name: token.value,
                    escape: token.kind == TokenKind::Escaped,
                    line: token.line,
                }),
                TokenKind::Block => nodes.push(Node::Variable {
                    name: format!("${}", token.value),
                    escape: true,
                    line: token.line,
                }),
                TokenKind::Section | TokenKind::Inverted => {
                    let node = self.section(token)?;
                    nodes.push(node);
                }
                TokenKind::Partial => nodes.push(Node::Partial {
                    name: token.value,
                    dynamic: false,
                    indent: token.indent,
                    line: token.line,
                }),
                TokenKind::DynamicPartial => {
                    let dynamic = self.pragmas.contains(Pragma::DynamicNames);
                    let name = if dynamic {
                        token.value
                    } else {
                        format!("*{}", token.value)
                    };
                    nodes.push(Node::Partial {
                        name,
                        dynamic,
                        indent: token.indent,
                        line: token.line,
                    });
                }
                TokenKind::Parent => {
                    let node = if self.blocks() {
                        self.parent(token)?
                    } else {
                        Node::Partial {
                            name: token.value,
                            dynamic: false,
                            indent: token.indent,
                            line: token.line,
                        }
                    };
                    nodes.push(node);
                }
            }
        }

        if let Some(open) = parent {
            return Err(StacheError::syntax(
                format!(
                    "Missing closing tag: {} opened on line {}",
                    open.value, open.line
                ),
                open.line,
            ));
        }

        Ok((nodes, None))
    }

    fn blocks(&self) -> bool {
        self.pragmas.contains(Pragma::Blocks)
    }

    /// Strips a trailing `/` under SELF-CLOSING, returning whether it was there.
    fn self_closing(&self, token: &mut Token) -> bool {
        if !self.pragmas.contains(Pragma::SelfClosing) {
            return false;
        }
        match token.value.strip_suffix('/') {
            Some(name) => {
                token.value = name.trim_end().to_string();
                true
            }
            None => false,
        }
    }

    /// Parses a body, or returns an empty one for a self-closing tag.
    fn body(&mut self, token: &mut Token) -> Result<(Vec<Node>, usize)> {
        if self.self_closing(token) {
            return Ok((Vec::new(), token.end));
        }
        let (children, close) = self.build_tree(Some(&*token))?;
        let end = close.map_or(token.end, |c| c.start);
        Ok((children, end))
    }

    fn section(&mut self, mut token: Token) -> Result<Node> {
        let (children, end) = self.body(&mut token)?;
        Ok(Node::Section {
            inverted: token.kind == TokenKind::Inverted,
            children,
            start: token.end,
            end,
            delimiters: token.delimiters,
            line: token.line,
            name: token.value,
        })
    }

    fn block(&mut self, mut token: Token) -> Result<Node> {
        let (children, _) = self.body(&mut token)?;
        Ok(Node::Block {
            name: token.value,
            children,
            indent: token.indent,
            line: token.line,
        })
    }

    fn parent(&mut self, mut token: Token) -> Result<Node> {
        let (blocks, _) = self.body(&mut token)?;
        Ok(Node::Parent {
            name: token.value,
            indent: token.indent,
            blocks,
            line: token.line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::scan;

    fn tree(source: &str) -> Result<Vec<Node>> {
        parse(scan(source, None)?, &PragmaSet::new())
    }

    fn tree_with(source: &str, pragma: Pragma) -> Result<Vec<Node>> {
        let pragmas: PragmaSet = [pragma].into_iter().collect();
        parse(scan(source, None)?, &pragmas)
    }

    #[test]
    fn nests_sections() {
        let nodes = tree("{{#a}}{{#b}}x{{/b}}{{/a}}").unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Section { name, children, start, end, .. } = &nodes[0] else {
            panic!("expected section, got {:?}", nodes[0]);
        };
        assert_eq!(name, "a");
        assert_eq!((*start, *end), (6, 19));
        assert!(matches!(&children[0], Node::Section { name, .. } if name == "b"));
    }

    #[test]
    fn section_offsets_slice_the_body() {
        let source = "{{#wrap}}Hi {{name}}{{/wrap}}";
        let nodes = tree(source).unwrap();
        let Node::Section { start, end, .. } = &nodes[0] else {
            panic!("expected section");
        };
        assert_eq!(&source[*start..*end], "Hi {{name}}");
    }

    #[test]
    fn nesting_error_names_both_tags() {
        let err = tree("{{#a}}\n{{/b}}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Nesting error: a (on line 1) vs. b (on line 2)"));
    }

    #[test]
    fn missing_and_unexpected_close() {
        let err = tree("{{#a}}x").unwrap_err();
        assert!(err.to_string().contains("Missing closing tag: a"));

        let err = tree("x{{/a}}").unwrap_err();
        assert!(err.to_string().contains("Unexpected closing tag: /a"));
    }

    #[test]
    fn comments_and_delimiters_leave_no_nodes() {
        let nodes = tree("{{! note }}{{=<% %>=}}<% x %>").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Variable {
                name: "x".into(),
                escape: true,
                line: 1
            }]
        );
    }

    #[test]
    fn blocks_without_pragma_are_variables_and_partials() {
        let nodes = tree("{{$x}}{{<p}}").unwrap();
        assert!(matches!(&nodes[0], Node::Variable { name, .. } if name == "$x"));
        assert!(matches!(&nodes[1], Node::Partial { name, .. } if name == "p"));
    }

    #[test]
    fn parent_collects_override_blocks() {
        let nodes = tree_with(
            "{{<layout}}\n  {{! ignored }}\n{{$title}}Hi{{/title}}\n{{/layout}}",
            Pragma::Blocks,
        )
        .unwrap();
        let Node::Parent { name, blocks, .. } = &nodes[0] else {
            panic!("expected parent");
        };
        assert_eq!(name, "layout");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Node::Block { name, .. } if name == "title"));
    }

    #[test]
    fn parent_rejects_other_tags() {
        let err = tree_with("{{<layout}}{{name}}{{/layout}}", Pragma::Blocks).unwrap_err();
        assert!(err.to_string().contains("Illegal content in < parent tag"));
    }

    #[test]
    fn pragma_tag_applies_to_later_tags() {
        let nodes = tree("{{$a}}{{% BLOCKS }}{{$b}}{{/b}}").unwrap();
        assert!(matches!(&nodes[0], Node::Variable { .. }));
        assert!(matches!(&nodes[1], Node::Pragma { .. }));
        assert!(matches!(&nodes[2], Node::Block { .. }));
    }

    #[test]
    fn dynamic_partials_need_the_pragma() {
        let nodes = tree("{{>*name}}").unwrap();
        assert!(matches!(&nodes[0], Node::Partial { name, dynamic: false, .. } if name == "*name"));

        let nodes = tree_with("{{>*name}}", Pragma::DynamicNames).unwrap();
        assert!(matches!(&nodes[0], Node::Partial { name, dynamic: true, .. } if name == "name"));
    }

    #[test]
    fn self_closing_sections() {
        let nodes = tree_with("{{#lambda/}}after", Pragma::SelfClosing).unwrap();
        let Node::Section { name, children, start, end, .. } = &nodes[0] else {
            panic!("expected section");
        };
        assert_eq!(name, "lambda");
        assert!(children.is_empty());
        assert_eq!(start, end);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn standalone_partial_indent_reaches_the_node() {
        let nodes = tree("a\n  {{> item }}\n").unwrap();
        assert!(matches!(&nodes[1], Node::Partial { indent: Some(indent), .. } if indent == "  "));
    }

    #[test]
    fn standalone_block_indent_reaches_the_node() {
        let nodes = tree_with("Hi,\n  {{$body}}\n  {{/body}}\n", Pragma::Blocks).unwrap();
        assert!(matches!(&nodes[1], Node::Block { indent: Some(indent), .. } if indent == "  "));

        let nodes = tree_with("{{$body}}x{{/body}}", Pragma::Blocks).unwrap();
        assert!(matches!(&nodes[0], Node::Block { indent: None, .. }));
    }
}
