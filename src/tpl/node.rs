use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Variable;
use crate::tpl::parser;
use crate::tpl::render_context::{Context, Interrupt};
use crate::tpl::tags::{
    Assign, Capture, Case, Comment, Counter, Cycle, For, If, Include,
};
use crate::tpl::tokenizer::{RawTag, Token, Tokenizer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A user-defined tag. Built-in tags are dedicated [`Node`] variants.
pub trait Tag: fmt::Debug + Send + Sync {
    /// Consumes any body tokens the tag owns. Inline tags keep the default.
    fn parse(&mut self, _tokens: &mut Tokenizer<'_>, _ctx: &ParseContext<'_>) -> Result<()> {
        Ok(())
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()>;
}

/// Builds the node for a tag from its name and markup.
pub type TagBuilder =
    Arc<dyn Fn(&str, Option<&str>, &ParseContext<'_>) -> Result<Node> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TagRegistry {
    builders: HashMap<String, TagBuilder>,
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.builders.keys().collect();
        names.sort();
        f.debug_struct("TagRegistry").field("tags", &names).finish()
    }
}

impl TagRegistry {
    /// All built-in tags.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register("assign", |_, markup, _| Ok(Node::Assign(Assign::new(markup)?)));
        registry.register("break", |_, _, _| Ok(Node::Interrupt(Interrupt::Break)));
        registry.register("capture", |name, markup, _| {
            Ok(Node::Capture(Capture::new(name, markup)?))
        });
        registry.register("case", |name, markup, _| Ok(Node::Case(Case::new(name, markup)?)));
        registry.register("comment", |name, _, _| Ok(Node::Comment(Comment::new(name))));
        registry.register("continue", |_, _, _| Ok(Node::Interrupt(Interrupt::Continue)));
        registry.register("cycle", |name, markup, _| Ok(Node::Cycle(Cycle::new(name, markup)?)));
        registry.register("decrement", |name, markup, _| {
            Ok(Node::Counter(Counter::decrement(name, markup)?))
        });
        registry.register("for", |name, markup, _| Ok(Node::For(For::new(name, markup)?)));
        registry.register("if", |name, markup, _| Ok(Node::If(If::new(name, markup, false)?)));
        registry.register("include", |name, markup, _| {
            Ok(Node::Include(Include::new(name, markup)?))
        });
        registry.register("increment", |name, markup, _| {
            Ok(Node::Counter(Counter::increment(name, markup)?))
        });
        registry.register("unless", |name, markup, _| {
            Ok(Node::If(If::new(name, markup, true)?))
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&str, Option<&str>, &ParseContext<'_>) -> Result<Node> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(builder));
    }

    pub fn insert(&mut self, name: impl Into<String>, builder: TagBuilder) {
        self.builders.insert(name.into(), builder);
    }

    pub fn get(&self, name: &str) -> Option<&TagBuilder> {
        self.builders.get(name)
    }
}

/// What the parser needs to know while building nodes.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    tags: &'a TagRegistry,
}

impl<'a> ParseContext<'a> {
    pub fn new(tags: &'a TagRegistry) -> Self {
        Self { tags }
    }

    pub fn tag(&self, name: &str) -> Option<&'a TagBuilder> {
        self.tags.get(name)
    }
}

#[derive(Debug)]
pub enum Node {
    Text(String),
    Variable(Variable),
    If(If),
    For(For),
    Case(Case),
    Cycle(Cycle),
    Assign(Assign),
    Capture(Capture),
    Comment(Comment),
    Counter(Counter),
    Interrupt(Interrupt),
    Include(Include),
    Custom(Box<dyn Tag>),
}

impl Node {
    /// Lets block nodes consume their bodies after being built.
    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<()> {
        match self {
            Node::If(tag) => tag.parse(tokens, ctx),
            Node::For(tag) => tag.parse(tokens, ctx),
            Node::Case(tag) => tag.parse(tokens, ctx),
            Node::Capture(tag) => tag.parse(tokens, ctx),
            Node::Comment(tag) => tag.parse(tokens),
            Node::Custom(tag) => tag.parse(tokens, ctx),
            _ => Ok(()),
        }
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        match self {
            Node::Text(text) => {
                out.push_str(text);
                Ok(())
            }
            Node::Variable(variable) => {
                let value = variable.evaluate(ctx)?;
                out.push_str(&value.render_string(ctx.options()));
                Ok(())
            }
            Node::If(tag) => tag.render(ctx, out),
            Node::For(tag) => tag.render(ctx, out),
            Node::Case(tag) => tag.render(ctx, out),
            Node::Cycle(tag) => tag.render(ctx, out),
            Node::Assign(tag) => tag.render(ctx),
            Node::Capture(tag) => tag.render(ctx),
            Node::Comment(_) => Ok(()),
            Node::Counter(tag) => tag.render(ctx, out),
            Node::Interrupt(interrupt) => {
                ctx.push_interrupt(*interrupt);
                Ok(())
            }
            Node::Include(tag) => tag.render(ctx, out),
            Node::Custom(tag) => tag.render(ctx, out),
        }
    }
}

/// An ordered run of nodes.
#[derive(Debug, Default)]
pub struct BlockBody {
    nodes: Vec<Node>,
}

impl BlockBody {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Parses nodes until the token stream ends or a tag with no registered builder shows up.
    ///
    /// That tag is handed back to the caller, which decides whether it is a delimiter
    /// (`else`, `endfor`, ...) or an error.
    pub fn parse<'s>(
        &mut self,
        tokens: &mut Tokenizer<'s>,
        ctx: &ParseContext<'_>,
    ) -> Result<Option<RawTag<'s>>> {
        while let Some(token) = tokens.next() {
            match token {
                Token::Text(text) => self.nodes.push(Node::Text(text.to_string())),
                Token::Variable(markup) => {
                    self.nodes
                        .push(Node::Variable(parser::parse_variable_markup(markup)?));
                }
                Token::Tag(raw) => {
                    let Some(builder) = ctx.tag(raw.name) else {
                        return Ok(Some(raw));
                    };
                    let mut node = builder(raw.name, raw.markup, ctx)?;
                    node.parse(tokens, ctx)?;
                    self.nodes.push(node);
                }
            }
        }
        Ok(None)
    }

    /// Renders nodes in order, stopping as soon as one leaves an interrupt pending.
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        for node in &self.nodes {
            node.render(ctx, out)?;
            if ctx.has_interrupt() {
                break;
            }
        }
        Ok(())
    }
}

/// Parses one section of a block tag named `name`.
///
/// Returns `Ok(false)` once `end<name>` is reached. Any other unregistered tag is
/// passed to `on_unknown` and `Ok(true)` is returned so the caller can parse the
/// next section. Running out of tokens is an unclosed tag.
pub fn parse_block<F>(
    name: &str,
    body: &mut BlockBody,
    tokens: &mut Tokenizer<'_>,
    ctx: &ParseContext<'_>,
    mut on_unknown: F,
) -> Result<bool>
where
    F: FnMut(&str, Option<&str>) -> Result<()>,
{
    match body.parse(tokens, ctx)? {
        None => Err(SyntaxError::UnclosedTag(name.to_string()).into()),
        Some(tag) if tag.name.strip_prefix("end") == Some(name) => Ok(false),
        Some(tag) => {
            on_unknown(tag.name, tag.markup)?;
            Ok(true)
        }
    }
}

/// Rejects any delimiter a tag does not understand.
pub fn unknown_tag(name: &str, _markup: Option<&str>) -> Result<()> {
    Err(SyntaxError::UnknownTag(name.to_string()).into())
}

/// Parses a whole template body; every tag must be registered.
pub fn parse_document(source: &str, ctx: &ParseContext<'_>) -> Result<BlockBody> {
    let mut tokens = Tokenizer::new(source);
    let mut body = BlockBody::default();
    match body.parse(&mut tokens, ctx)? {
        None => Ok(body),
        Some(tag) => Err(SyntaxError::UnknownTag(tag.name.to_string()).into()),
    }
}
