use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Expression;
use crate::tpl::lexer::TokenKind;
use crate::tpl::parser::Parser;
use crate::tpl::render_context::Context;
use std::collections::HashMap;

/// Emits the next value of a list on every render: `{% cycle 'odd', 'even' %}`.
///
/// Cycles sharing a group (an explicit `group: ...` prefix, or the same value
/// list) advance together for the rest of the render.
#[derive(Debug)]
pub struct Cycle {
    name: String,
    group: Option<Expression>,
    values: Vec<Expression>,
}

impl Cycle {
    pub fn new(name: &str, markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;

        let first = parser.parse_expression()?;
        let (group, mut values) = if parser.consume(TokenKind::Colon).is_some() {
            (Some(first), vec![parser.parse_expression()?])
        } else {
            (None, vec![first])
        };
        while parser.consume(TokenKind::Comma).is_some() {
            values.push(parser.parse_expression()?);
        }
        parser.expect_end()?;

        Ok(Self {
            name: name.to_string(),
            group,
            values,
        })
    }

    fn group_key(&self, ctx: &Context<'_>) -> String {
        match &self.group {
            Some(group) => group.evaluate(ctx).to_string(),
            None => self
                .values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let key = self.group_key(ctx);
        let mut positions: HashMap<String, usize> =
            ctx.take_register(&self.name).unwrap_or_default();

        let position = positions.get(&key).copied().unwrap_or(0) % self.values.len();
        let value = self.values[position].evaluate(ctx);
        out.push_str(&value.render_string(ctx.options()));

        positions.insert(key, (position + 1) % self.values.len());
        ctx.set_register(self.name.clone(), positions);
        Ok(())
    }
}
