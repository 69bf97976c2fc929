use crate::Result;
use crate::error::{RuntimeError, SyntaxError};
use crate::tpl::ast::Expression;
use crate::tpl::lexer::TokenKind;
use crate::tpl::node::{BlockBody, parse_document};
use crate::tpl::parser::Parser;
use crate::tpl::render_context::{Context, Scope};
use crate::value::Value;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;

const PARTIALS_REGISTER: &str = "include:partials";

/// `{% include 'name' [with|for expr] [key: value, ...] %}`
///
/// The partial renders against the caller's context, so `assign` inside it
/// is visible afterwards. Locals and the bound target live in a scope that
/// is dropped when the include finishes.
#[derive(Debug)]
pub struct Include {
    template: Expression,
    target: Option<Expression>,
    locals: Vec<(String, Expression)>,
}

impl Include {
    pub fn new(name: &str, markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;

        let template = parser.parse_expression()?;
        let target = if parser.consume_id("for") || parser.consume_id("with") {
            Some(parser.parse_expression()?)
        } else {
            None
        };

        let mut locals = Vec::new();
        while let Some(key) = parser.consume(TokenKind::Id) {
            parser.expect(TokenKind::Colon)?;
            locals.push((key, parser.parse_expression()?));
            parser.consume(TokenKind::Comma);
        }
        parser.expect_end()?;

        Ok(Self {
            template,
            target,
            locals,
        })
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let path = self.template.evaluate(ctx).to_string();
        if path.is_empty() {
            return Err(RuntimeError::FileSystem(format!(
                "include requires a template name, '{}' is empty",
                self.template
            ))
            .into());
        }

        ctx.enter_include(&path)?;
        let result = self.render_partial(&path, ctx, out);
        ctx.exit_include();
        result
    }

    fn render_partial(&self, path: &str, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let partial = load_partial(path, ctx)?;

        // `products/item` binds `item`.
        let variable = path.rsplit('/').next().unwrap_or(path).to_string();
        let value = match &self.target {
            Some(target) => target.evaluate(ctx),
            None => ctx.read(&variable),
        };

        let mut scope = Scope::immutable(HashMap::new());
        for (key, expression) in &self.locals {
            scope = scope.with(key.clone(), expression.evaluate(ctx));
        }
        let mut ctx = ctx.scope(scope);

        match value {
            Value::Array(items) => {
                for item in items {
                    let mut ctx = ctx.scope(Scope::immutable(HashMap::new()).with(&variable, item));
                    partial.render(&mut ctx, out)?;
                    if ctx.has_interrupt() {
                        break;
                    }
                }
                Ok(())
            }
            Value::Nil => partial.render(&mut ctx, out),
            value => {
                let mut ctx = ctx.scope(Scope::immutable(HashMap::new()).with(&variable, value));
                partial.render(&mut ctx, out)
            }
        }
    }
}

/// Reads and parses a partial once per render.
fn load_partial(path: &str, ctx: &mut Context<'_>) -> Result<Arc<BlockBody>> {
    let mut cache: HashMap<String, Arc<BlockBody>> =
        ctx.take_register(PARTIALS_REGISTER).unwrap_or_default();

    let partial = match cache.get(path) {
        Some(partial) => {
            trace!("partial '{}' served from render cache", path);
            Ok(partial.clone())
        }
        None => {
            debug!("loading partial '{}'", path);
            ctx.file_system()
                .read(path)
                .and_then(|source| parse_document(&source, &ctx.parse_context()))
                .map(|body| {
                    let body = Arc::new(body);
                    cache.insert(path.to_string(), body.clone());
                    body
                })
        }
    };

    ctx.set_register(PARTIALS_REGISTER, cache);
    partial
}
