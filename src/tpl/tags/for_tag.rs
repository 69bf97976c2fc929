use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Expression;
use crate::tpl::lexer::TokenKind;
use crate::tpl::node::{BlockBody, ParseContext, parse_block};
use crate::tpl::parser::Parser;
use crate::tpl::render_context::{Context, Interrupt, Scope};
use crate::tpl::tokenizer::Tokenizer;
use crate::value::{DropObject, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
enum Source {
    Range(Expression, Expression),
    Collection(Expression),
}

/// `for item in collection [reversed] [limit: n] [offset: n]` with an optional `else`.
#[derive(Debug)]
pub struct For {
    name: String,
    variable: String,
    source: Source,
    reversed: bool,
    limit: Option<Expression>,
    offset: Option<Expression>,
    body: BlockBody,
    else_body: Option<BlockBody>,
}

impl For {
    pub fn new(name: &str, markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;

        let variable = parser.expect(TokenKind::Id)?;
        if !parser.consume_id("in") {
            return Err(SyntaxError::Invalid(format!(
                "expected 'in' after '{variable}' in '{name}'"
            ))
            .into());
        }

        let source = if parser.consume(TokenKind::OpenRound).is_some() {
            let start = parser.parse_expression()?;
            parser.expect(TokenKind::DotDot)?;
            let end = parser.parse_expression()?;
            parser.expect(TokenKind::CloseRound)?;
            Source::Range(start, end)
        } else {
            Source::Collection(parser.parse_expression()?)
        };

        let reversed = parser.consume_id("reversed");

        let mut limit = None;
        let mut offset = None;
        while !parser.at_end() {
            let key = parser.expect(TokenKind::Id)?;
            parser.expect(TokenKind::Colon)?;
            let value = parser.parse_expression()?;
            match key.as_str() {
                "limit" => limit = Some(value),
                "offset" => offset = Some(value),
                other => {
                    return Err(SyntaxError::Invalid(format!(
                        "unknown attribute '{other}' in '{name}'"
                    ))
                    .into());
                }
            }
            parser.consume(TokenKind::Comma);
        }

        Ok(Self {
            name: name.to_string(),
            variable,
            source,
            reversed,
            limit,
            offset,
            body: BlockBody::default(),
            else_body: None,
        })
    }

    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<()> {
        let mut saw_else = false;
        let more = parse_block(&self.name, &mut self.body, tokens, ctx, |tag, _| {
            if tag == "else" {
                saw_else = true;
                Ok(())
            } else {
                Err(SyntaxError::UnknownTag(tag.to_string()).into())
            }
        })?;

        if more && saw_else {
            let mut else_body = BlockBody::default();
            parse_block(&self.name, &mut else_body, tokens, ctx, |tag, _| {
                Err(SyntaxError::UnknownTag(tag.to_string()).into())
            })?;
            self.else_body = Some(else_body);
        }
        Ok(())
    }

    fn items(&self, ctx: &Context<'_>) -> Items {
        let offset = self.count(&self.offset, ctx).unwrap_or(0);
        let limit = self.count(&self.limit, ctx);
        match &self.source {
            Source::Range(start, end) => {
                let start = start.evaluate(ctx).to_int();
                let end = end.evaluate(ctx).to_int();
                range_window(start, end, offset, limit, self.reversed)
            }
            Source::Collection(expression) => {
                let items = match expression.evaluate(ctx) {
                    Value::Array(items) => window(items, offset, limit, self.reversed),
                    _ => Vec::new(),
                };
                Items {
                    len: items.len(),
                    values: Box::new(items.into_iter()),
                }
            }
        }
    }

    fn count(&self, expression: &Option<Expression>, ctx: &Context<'_>) -> Option<usize> {
        expression
            .as_ref()
            .map(|e| usize::try_from(e.evaluate(ctx).to_int()).unwrap_or(0))
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let items = self.items(ctx);
        if items.len == 0 {
            if let Some(else_body) = &self.else_body {
                else_body.render(ctx, out)?;
            }
            return Ok(());
        }

        let register = format!("for:{}", self.name);
        let mut stack: Vec<Arc<ForLoopDrop>> = ctx.take_register(&register).unwrap_or_default();
        let drop = Arc::new(ForLoopDrop::new(items.len, stack.last().cloned()));
        stack.push(drop.clone());
        ctx.set_register(register.clone(), stack);

        let result = self.render_items(items, &drop, ctx, out);

        if let Some(mut stack) = ctx.take_register::<Vec<Arc<ForLoopDrop>>>(&register) {
            stack.pop();
            ctx.set_register(register, stack);
        }
        result
    }

    fn render_items(
        &self,
        items: Items,
        drop: &Arc<ForLoopDrop>,
        ctx: &mut Context<'_>,
        out: &mut String,
    ) -> Result<()> {
        let forloop = Value::Drop(drop.clone());
        let mut ctx = ctx.scope(Scope::immutable(HashMap::new()).with("forloop", forloop));

        for item in items.values {
            {
                let mut ctx = ctx.scope(Scope::immutable(HashMap::new()).with(&self.variable, item));
                self.body.render(&mut ctx, out)?;
            }
            drop.increment();

            match ctx.pop_interrupt() {
                Some(Interrupt::Break) => break,
                Some(Interrupt::Continue) | None => {}
            }
        }
        Ok(())
    }
}

/// Loop values after `offset` and `limit`, produced on demand.
struct Items {
    len: usize,
    values: Box<dyn Iterator<Item = Value>>,
}

/// Windows `start..=end` without materializing it.
fn range_window(
    start: i64,
    end: i64,
    offset: usize,
    limit: Option<usize>,
    reversed: bool,
) -> Items {
    let total = (i128::from(end) - i128::from(start) + 1).max(0);
    let skip = total.min(i128::try_from(offset).unwrap_or(i128::MAX));
    let limit = limit.map_or(i128::MAX, |n| i128::try_from(n).unwrap_or(i128::MAX));
    let take = (total - skip).min(limit);
    let (first, step) = if reversed {
        (i128::from(end) - skip, -1)
    } else {
        (i128::from(start) + skip, 1)
    };

    Items {
        len: usize::try_from(take).unwrap_or(usize::MAX),
        values: Box::new(
            (0..take).map_while(move |i| i64::try_from(first + step * i).ok().map(Value::Int)),
        ),
    }
}

/// Applies `offset` then `limit` from the end the loop starts at, and orders the result
/// in traversal order.
fn window(items: Vec<Value>, offset: usize, limit: Option<usize>, reversed: bool) -> Vec<Value> {
    let mut items = items;
    if reversed {
        items.reverse();
    }
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// The `forloop` object exposed inside a loop body.
#[derive(Debug)]
pub struct ForLoopDrop {
    length: usize,
    index: AtomicUsize,
    parent: Option<Arc<ForLoopDrop>>,
}

impl ForLoopDrop {
    fn new(length: usize, parent: Option<Arc<ForLoopDrop>>) -> Self {
        Self {
            length,
            index: AtomicUsize::new(0),
            parent,
        }
    }

    fn increment(&self) {
        self.index.fetch_add(1, Ordering::Relaxed);
    }
}

impl DropObject for ForLoopDrop {
    fn get(&self, key: &str) -> Option<Value> {
        let index = self.index.load(Ordering::Relaxed);
        let int = |n: usize| Some(Value::Int(n as i64));
        match key {
            "length" => int(self.length),
            "index" => int(index + 1),
            "index0" => int(index),
            "rindex" => int(self.length.saturating_sub(index)),
            "rindex0" => int(self.length.saturating_sub(index + 1)),
            "first" => Some(Value::Bool(index == 0)),
            "last" => Some(Value::Bool(index + 1 == self.length)),
            "parentloop" => Some(
                self.parent
                    .clone()
                    .map(|p| Value::Drop(p as Arc<dyn DropObject>))
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}
