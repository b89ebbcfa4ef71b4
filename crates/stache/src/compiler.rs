// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compilation of parse trees into render steps, and the render loop.
//!
//! A [`Template`] is a list of steps interpreted by a renderer bound to one
//! [`Engine`]. Compilation resolves everything that does not depend on data:
//! which pragmas apply to each tag, filter pipes, the literal body of every
//! section (handed to section lambdas) and which output chunks begin a line
//! and so receive the indent of an enclosing standalone partial.

use crate::config::{Pragma, PragmaSet};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Result, StacheError};
use crate::escape::Escape;
use crate::parser::Node;
use crate::token::Delimiters;
use crate::value::{Lambda, LambdaHelper, RenderText, Value};
use std::sync::Arc;
use tracing::trace;

/// Settings fixed at compile time.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Escaping for `{{ name }}` tags.
    pub escape: Escape,
    /// When false, objects exposing `Resolve::invoke` are called like lambdas.
    pub strict_callables: bool,
    /// Unresolved names are errors throughout the template.
    pub strict_variables: bool,
    /// Pragmas enabled before the first tag.
    pub pragmas: PragmaSet,
    /// Cache key the template is registered under.
    pub key: String,
}

/// A compiled template.
///
/// Immutable once built; the engine shares it between renders and threads.
#[derive(Debug)]
pub struct Template {
    name: String,
    key: String,
    source: String,
    escape: Escape,
    strict_callables: bool,
    steps: Vec<Step>,
}

impl Template {
    /// Name the template was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Exact template source.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A variable or section name with its filter pipe split off.
#[derive(Debug, Clone)]
struct Name {
    path: String,
    filters: Vec<String>,
}

impl Name {
    fn new(name: &str, filters: bool) -> Self {
        if !filters || !name.contains('|') {
            return Self {
                path: name.to_string(),
                filters: Vec::new(),
            };
        }

        let mut parts = name.split('|').map(|p| p.trim().to_string());
        Self {
            path: parts.next().unwrap_or_default(),
            filters: parts.collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum PartialName {
    Static(String),
    Dynamic(String),
}

/// A block override declared inside a parent tag.
#[derive(Debug, Clone)]
struct Override {
    name: String,
    /// The opening tag stood alone; the body's own indent is stripped.
    dedent: bool,
    steps: Vec<Step>,
}

/// Block overrides declared inside one parent tag, in source order.
type BlockArgs = Vec<Override>;

#[derive(Debug, Clone)]
enum Step {
    Text {
        text: String,
        line_start: bool,
    },
    Variable {
        name: Name,
        escape: bool,
        strict: bool,
        line_start: bool,
    },
    Section {
        name: Name,
        strict: bool,
        body: String,
        delimiters: Delimiters,
        steps: Vec<Step>,
    },
    Inverted {
        name: Name,
        steps: Vec<Step>,
    },
    Partial {
        name: PartialName,
        indent: Option<String>,
    },
    Parent {
        name: String,
        indent: Option<String>,
        blocks: Arc<BlockArgs>,
    },
    Block {
        name: String,
        /// Indent overrides are moved to when the opening tag stands alone.
        indent: Option<String>,
        steps: Vec<Step>,
    },
}

/// Compiles a parse tree of `source` into a template.
///
/// # Errors
///
/// Returns a syntax error if a parent node holds anything but blocks.
pub fn compile(source: &str, tree: &[Node], name: &str, options: &CompileOptions) -> Result<Template> {
    let mut compiler = Compiler {
        source,
        pragmas: options.pragmas.clone(),
        strict_variables: options.strict_variables,
        indent_next_line: true,
    };
    let steps = compiler.walk(tree)?;

    Ok(Template {
        name: name.to_string(),
        key: options.key.clone(),
        source: source.to_string(),
        escape: options.escape.clone(),
        strict_callables: options.strict_callables,
        steps,
    })
}

struct Compiler<'s> {
    source: &'s str,
    pragmas: PragmaSet,
    strict_variables: bool,
    indent_next_line: bool,
}

impl Compiler<'_> {
    fn walk(&mut self, nodes: &[Node]) -> Result<Vec<Step>> {
        let mut steps = Vec::with_capacity(nodes.len());

        for node in nodes {
            match node {
                Node::Text { text } => {
                    let line_start = self.take_line_start();
                    self.indent_next_line = text.ends_with('\n');
                    steps.push(Step::Text {
                        text: text.clone(),
                        line_start,
                    });
                }
                Node::Variable { name, escape, .. } => steps.push(Step::Variable {
                    name: self.name(name),
                    escape: *escape,
                    strict: self.strict(),
                    line_start: self.take_line_start(),
                }),
                Node::Section {
                    name,
                    inverted: false,
                    children,
                    start,
                    end,
                    delimiters,
                    ..
                } => {
                    let name = self.name(name);
                    let strict = self.strict();
                    let body = self.source.get(*start..*end).unwrap_or_default().to_string();
                    steps.push(Step::Section {
                        name,
                        strict,
                        body,
                        delimiters: delimiters.clone(),
                        steps: self.walk(children)?,
                    });
                }
                Node::Section {
                    name,
                    inverted: true,
                    children,
                    ..
                } => {
                    let name = self.name(name);
                    steps.push(Step::Inverted {
                        name,
                        steps: self.walk(children)?,
                    });
                }
                Node::Partial {
                    name,
                    dynamic,
                    indent,
                    ..
                } => steps.push(Step::Partial {
                    name: if *dynamic {
                        PartialName::Dynamic(name.clone())
                    } else {
                        PartialName::Static(name.clone())
                    },
                    indent: indent.clone(),
                }),
                Node::Parent {
                    name,
                    indent,
                    blocks,
                    line,
                } => {
                    let mut args = Vec::with_capacity(blocks.len());
                    for block in blocks {
                        let Node::Block {
                            name,
                            children,
                            indent,
                            ..
                        } = block
                        else {
                            return Err(StacheError::syntax(
                                format!("Illegal content in < parent tag: {}", name),
                                *line,
                            ));
                        };
                        args.push(Override {
                            name: name.clone(),
                            dedent: indent.is_some(),
                            steps: self.walk(children)?,
                        });
                    }
                    steps.push(Step::Parent {
                        name: name.clone(),
                        indent: indent.clone(),
                        blocks: Arc::new(args),
                    });
                }
                Node::Block {
                    name,
                    children,
                    indent,
                    ..
                } => steps.push(Step::Block {
                    name: name.clone(),
                    indent: indent.as_deref().map(|tag| block_indent(children, tag)),
                    steps: self.walk(children)?,
                }),
                Node::Pragma { name, .. } => {
                    self.pragmas.enable_name(name);
                }
            }
        }

        Ok(steps)
    }

    fn name(&self, name: &str) -> Name {
        Name::new(name, self.pragmas.contains(Pragma::Filters))
    }

    fn strict(&self) -> bool {
        self.strict_variables || self.pragmas.contains(Pragma::StrictVariables)
    }

    fn take_line_start(&mut self) -> bool {
        std::mem::replace(&mut self.indent_next_line, false)
    }
}

/// Indent of a standalone block: that of its first default line, or the
/// tag's own when there is no default text.
fn block_indent(children: &[Node], tag: &str) -> String {
    match children.first() {
        Some(Node::Text { text }) => leading_whitespace(text).to_string(),
        _ => tag.to_string(),
    }
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start_matches([' ', '\t']).len()]
}

/// Writes `text` line by line, replacing a leading `strip` with `indent`.
/// Blank lines get no indent; the first line only when `first_line` is set.
fn reindent(text: &str, strip: &str, indent: &str, first_line: bool, out: &mut String) {
    for (i, line) in text.split_inclusive('\n').enumerate() {
        let line = line.strip_prefix(strip).unwrap_or(line);
        let blank = line.trim_end_matches(['\r', '\n']).is_empty();
        if (first_line || i > 0) && !blank {
            out.push_str(indent);
        }
        out.push_str(line);
    }
}

/// Executes templates against one context stack.
pub(crate) struct Renderer<'e> {
    engine: &'e Engine,
    context: Context,
    blocks: Vec<Arc<BlockArgs>>,
    depth: usize,
}

impl<'e> Renderer<'e> {
    pub(crate) fn new(engine: &'e Engine, context: Context) -> Self {
        Self {
            engine,
            context,
            blocks: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn render(&mut self, template: &Template) -> Result<String> {
        let mut out = String::with_capacity(template.source.len());
        self.render_steps(template, &template.steps, "", &mut out)?;
        Ok(out)
    }

    fn render_steps(
        &mut self,
        template: &Template,
        steps: &[Step],
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        for step in steps {
            match step {
                Step::Text { text, line_start } => {
                    if *line_start {
                        out.push_str(indent);
                    }
                    out.push_str(text);
                }
                Step::Variable {
                    name,
                    escape,
                    strict,
                    line_start,
                } => {
                    let text = self.interpolate(template, name, *strict)?;
                    if *line_start {
                        out.push_str(indent);
                    }
                    if *escape {
                        out.push_str(&template.escape.apply(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
                Step::Section {
                    name,
                    strict,
                    body,
                    delimiters,
                    steps,
                } => {
                    let value = self.context.resolve(&name.path, *strict)?;
                    let value = self.apply_filters(name, value)?;
                    self.section(template, value, body, delimiters, steps, indent, out)?;
                }
                Step::Inverted { name, steps } => {
                    let value = self.context.resolve(&name.path, false)?;
                    let value = self.apply_filters(name, value)?;
                    if !value.is_truthy() {
                        self.render_steps(template, steps, indent, out)?;
                    }
                }
                Step::Partial {
                    name,
                    indent: own,
                } => self.partial(name, own.as_deref(), indent, out)?,
                Step::Parent {
                    name,
                    indent: own,
                    blocks,
                } => self.parent(name, own.as_deref(), blocks, indent, out)?,
                Step::Block {
                    name,
                    indent: site,
                    steps,
                } => self.block(template, name, site.as_deref(), steps, indent, out)?,
            }
        }
        Ok(())
    }

    fn interpolate(&mut self, template: &Template, name: &Name, strict: bool) -> Result<String> {
        let mut value = self.context.resolve(&name.path, strict)?;

        let called = match &value {
            Value::Lambda(Lambda::Nullary(f)) => Some(f()?),
            Value::Object(object) if !template.strict_callables => object.invoke(),
            _ => None,
        };
        if let Some(result) = called {
            value = Value::String(self.render_lambda(&result.to_string(), None)?);
        }

        Ok(self.apply_filters(name, value)?.to_string())
    }

    fn apply_filters(&mut self, name: &Name, mut value: Value) -> Result<Value> {
        for filter in &name.filters {
            value = match self.context.resolve(filter, false)? {
                Value::Lambda(Lambda::Unary(f)) => {
                    let delimiters = self.engine.delimiters().clone();
                    let helper = LambdaHelper::new(self, delimiters);
                    f(&value, &helper)?
                }
                Value::Lambda(Lambda::Nullary(f)) => f()?,
                _ => return Err(StacheError::UnknownFilter(filter.clone())),
            };
        }
        Ok(value)
    }

    #[allow(clippy::too_many_arguments)]
    fn section(
        &mut self,
        template: &Template,
        value: Value,
        body: &str,
        delimiters: &Delimiters,
        steps: &[Step],
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        let value = match value {
            Value::Lambda(Lambda::Unary(f)) => {
                let result = {
                    let helper = LambdaHelper::new(self, delimiters.clone());
                    f(&Value::String(body.to_string()), &helper)?
                };
                let rendered = self.render_lambda(&result.to_string(), Some(delimiters))?;
                out.push_str(&rendered);
                return Ok(());
            }
            Value::Lambda(Lambda::Nullary(f)) => {
                let result = f()?;
                let rendered = self.render_lambda(&result.to_string(), Some(delimiters))?;
                out.push_str(&rendered);
                return Ok(());
            }
            Value::Object(object) if !template.strict_callables => {
                object.invoke().unwrap_or(Value::Object(object))
            }
            other => other,
        };

        match value {
            Value::List(items) => {
                for item in items.iter() {
                    self.scoped(template, item.clone(), steps, indent, out)?;
                }
                Ok(())
            }
            value if value.is_truthy() => self.scoped(template, value, steps, indent, out),
            _ => Ok(()),
        }
    }

    fn scoped(
        &mut self,
        template: &Template,
        frame: Value,
        steps: &[Step],
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        self.context.push(frame);
        let result = self.render_steps(template, steps, indent, out);
        self.context.pop();
        result
    }

    fn partial(
        &mut self,
        name: &PartialName,
        own_indent: Option<&str>,
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        let name = match name {
            PartialName::Static(name) => name.clone(),
            PartialName::Dynamic(variable) => self.context.resolve(variable, false)?.to_string(),
        };

        let engine = self.engine;
        let Some(partial) = engine.load_partial(&name)? else {
            return Ok(());
        };

        let indent = own_indent.map(|own| format!("{}{}", indent, own)).unwrap_or_default();
        self.enter(&name)?;
        let result = self.render_steps(&partial, &partial.steps, &indent, out);
        self.leave();
        result
    }

    fn parent(
        &mut self,
        name: &str,
        own_indent: Option<&str>,
        blocks: &Arc<BlockArgs>,
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        let engine = self.engine;
        let Some(parent) = engine.load_partial(name)? else {
            return Ok(());
        };

        let indent = own_indent.map(|own| format!("{}{}", indent, own)).unwrap_or_default();
        self.enter(name)?;
        self.blocks.push(Arc::clone(blocks));
        let result = self.render_steps(&parent, &parent.steps, &indent, out);
        self.blocks.pop();
        self.leave();
        result
    }

    /// Renders the outermost override of `name`, or the default content.
    ///
    /// Overrides of a standalone block are re-indented: the override's own
    /// indent is stripped when its opening tag stood alone, and `site` is
    /// added to every line.
    fn block(
        &mut self,
        template: &Template,
        name: &str,
        site: Option<&str>,
        defaults: &[Step],
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        let found = self.blocks.iter().find_map(|frame| {
            frame
                .iter()
                .position(|block| block.name == name)
                .map(|i| (Arc::clone(frame), i))
        });
        let Some((frame, i)) = found else {
            return self.render_steps(template, defaults, indent, out);
        };
        let block = &frame[i];

        if site.is_none() && !block.dedent {
            self.enter(name)?;
            let result = self.render_steps(template, &block.steps, indent, out);
            self.leave();
            return result;
        }

        let mut body = String::new();
        self.enter(name)?;
        let result = self.render_steps(template, &block.steps, "", &mut body);
        self.leave();
        result?;

        let strip = if block.dedent { leading_whitespace(&body) } else { "" };
        match site {
            Some(site) => {
                reindent(&body, strip, &format!("{}{}", indent, site), true, out);
                if !body.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => reindent(&body, strip, indent, false, out),
        }
        Ok(())
    }

    /// Renders text produced by a lambda as a template in the current scope.
    fn render_lambda(&mut self, text: &str, delimiters: Option<&Delimiters>) -> Result<String> {
        let engine = self.engine;
        let open = delimiters.unwrap_or(engine.delimiters()).open.as_str();
        if !text.contains(open) {
            return Ok(text.to_string());
        }

        let lambda = engine.load_lambda(text, delimiters)?;
        trace!(key = lambda.key(), "rendering lambda result");

        let mut out = String::new();
        self.enter(lambda.name())?;
        let result = self.render_steps(&lambda, &lambda.steps, "", &mut out);
        self.leave();
        result.map(|_| out)
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        let limit = self.engine.max_depth();
        if self.depth >= limit {
            return Err(StacheError::RecursionLimit {
                limit,
                template: name.to_string(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl RenderText for Renderer<'_> {
    fn render_text(&mut self, text: &str, delimiters: &Delimiters) -> Result<String> {
        self.render_lambda(text, Some(delimiters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::scan;

    fn compiled(source: &str) -> Template {
        let tree = parse(scan(source, None).unwrap(), &PragmaSet::new()).unwrap();
        compile(source, &tree, "test", &CompileOptions::default()).unwrap()
    }

    #[test]
    fn section_steps_keep_their_literal_body() {
        let template = compiled("{{#wrap}}Hi {{name}}!{{/wrap}}");
        let Step::Section { body, steps, .. } = &template.steps[0] else {
            panic!("expected section step");
        };
        assert_eq!(body, "Hi {{name}}!");
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn line_starts_follow_newlines() {
        let template = compiled("a\n{{b}}c\n");
        let starts: Vec<bool> = template
            .steps
            .iter()
            .map(|step| match step {
                Step::Text { line_start, .. } | Step::Variable { line_start, .. } => *line_start,
                _ => false,
            })
            .collect();
        assert_eq!(starts, vec![true, true, false]);
    }

    #[test]
    fn filter_pipes_split_only_under_the_pragma() {
        let template = compiled("{{a | b}}{{% FILTERS }}{{c | d | e}}");
        let names: Vec<(String, usize)> = template
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Variable { name, .. } => Some((name.path.clone(), name.filters.len())),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![("a | b".to_string(), 0), ("c".to_string(), 2)]);
    }

    #[test]
    fn strict_pragma_marks_later_tags() {
        let template = compiled("{{a}}{{% STRICT-VARIABLES }}{{b}}");
        let strict: Vec<bool> = template
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Variable { strict, .. } => Some(*strict),
                _ => None,
            })
            .collect();
        assert_eq!(strict, vec![false, true]);
    }

    #[test]
    fn parent_nodes_must_hold_blocks() {
        let tree = vec![Node::Parent {
            name: "layout".into(),
            indent: None,
            blocks: vec![Node::Text { text: "x".into() }],
            line: 1,
        }];
        let err = compile("", &tree, "test", &CompileOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Illegal content"));
    }

    #[test]
    fn reindent_moves_lines_to_the_new_indent() {
        let mut out = String::new();
        reindent("    a\n\n    b\n", "    ", "  ", true, &mut out);
        assert_eq!(out, "  a\n\n  b\n");

        let mut out = String::from("x");
        reindent("a\nb", "", "> ", false, &mut out);
        assert_eq!(out, "xa\n> b");
    }
}
