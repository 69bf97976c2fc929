use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Variable;
use crate::tpl::lexer::TokenKind;
use crate::tpl::node::{BlockBody, ParseContext, parse_block, unknown_tag};
use crate::tpl::parser::Parser;
use crate::tpl::render_context::Context;
use crate::tpl::tokenizer::Tokenizer;
use crate::value::Value;

/// `{% assign name = value | filter %}`
#[derive(Debug)]
pub struct Assign {
    target: String,
    value: Variable,
}

impl Assign {
    pub fn new(markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup("assign".to_string()))?;
        let mut parser = Parser::new(markup)?;
        let target = parser.expect(TokenKind::Id)?;
        parser.expect(TokenKind::Equal)?;
        let value = parser.parse_variable()?;
        parser.expect_end()?;
        Ok(Self { target, value })
    }

    pub fn render(&self, ctx: &mut Context<'_>) -> Result<()> {
        let value = self.value.evaluate(ctx)?;
        ctx.write(self.target.clone(), value);
        Ok(())
    }
}

/// `{% capture name %}...{% endcapture %}` stores the rendered body as a string.
#[derive(Debug)]
pub struct Capture {
    name: String,
    target: String,
    body: BlockBody,
}

impl Capture {
    pub fn new(name: &str, markup: Option<&str>) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;
        let target = match parser.consume(TokenKind::Id) {
            Some(id) => id,
            None => parser.expect(TokenKind::String)?,
        };
        parser.expect_end()?;
        Ok(Self {
            name: name.to_string(),
            target,
            body: BlockBody::default(),
        })
    }

    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<()> {
        parse_block(&self.name, &mut self.body, tokens, ctx, unknown_tag)?;
        Ok(())
    }

    pub fn render(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut captured = String::new();
        self.body.render(ctx, &mut captured)?;
        ctx.write(self.target.clone(), Value::String(captured));
        Ok(())
    }
}
