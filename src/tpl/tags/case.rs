use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Expression;
use crate::tpl::lexer::TokenKind;
use crate::tpl::node::{BlockBody, ParseContext, parse_block};
use crate::tpl::parser::Parser;
use crate::tpl::render_context::Context;
use crate::tpl::tokenizer::Tokenizer;

#[derive(Debug)]
struct When {
    /// Empty for the `else` clause.
    expressions: Vec<Expression>,
    is_else: bool,
    body: BlockBody,
}

#[derive(Debug)]
pub struct Case {
    name: String,
    expression: Expression,
    clauses: Vec<When>,
}

impl Case {
    pub fn new(name: &str, markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;
        let expression = parser.parse_expression()?;
        parser.expect_end()?;
        Ok(Self {
            name: name.to_string(),
            expression,
            clauses: Vec::new(),
        })
    }

    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<()> {
        // Anything between `case` and the first `when` is dropped.
        let mut body = BlockBody::default();
        loop {
            let mut next: Option<When> = None;
            let more = parse_block(&self.name, &mut body, tokens, ctx, |tag, markup| {
                next = Some(match tag {
                    "when" => When {
                        expressions: parse_when(markup)?,
                        is_else: false,
                        body: BlockBody::default(),
                    },
                    "else" => When {
                        expressions: Vec::new(),
                        is_else: true,
                        body: BlockBody::default(),
                    },
                    _ => return Err(SyntaxError::UnknownTag(tag.to_string()).into()),
                });
                Ok(())
            })?;

            if let Some(current) = self.clauses.last_mut() {
                current.body = std::mem::take(&mut body);
            }
            match next {
                Some(clause) if more => self.clauses.push(clause),
                _ => return Ok(()),
            }
            body = BlockBody::default();
        }
    }

    /// Renders every matching `when` in order; `else` only if none matched before it.
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let value = self.expression.evaluate(ctx);
        let mut matched = false;
        for clause in &self.clauses {
            if clause.is_else {
                if !matched {
                    return clause.body.render(ctx, out);
                }
                continue;
            }
            if clause.expressions.iter().any(|e| e.evaluate(ctx) == value) {
                matched = true;
                clause.body.render(ctx, out)?;
                if ctx.has_interrupt() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

/// `when a, b or c`
fn parse_when(markup: Option<&str>) -> Result<Vec<Expression>> {
    let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup("when".to_string()))?;
    let mut parser = Parser::new(markup)?;
    let mut expressions = vec![parser.parse_expression()?];
    loop {
        if parser.consume(TokenKind::Comma).is_some() || parser.consume_id("or") {
            expressions.push(parser.parse_expression()?);
        } else if parser.look(TokenKind::Id, 0) {
            let found = parser.expect(TokenKind::Id)?;
            return Err(SyntaxError::Invalid(format!("expected \"or\" but found {found}")).into());
        } else {
            break;
        }
    }
    parser.expect_end()?;
    Ok(expressions)
}
