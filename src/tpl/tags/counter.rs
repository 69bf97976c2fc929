use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::lexer::TokenKind;
use crate::tpl::parser::Parser;
use crate::tpl::render_context::Context;
use crate::value::Value;

/// `increment` / `decrement`: counters kept in the environment, independent of assigned variables.
#[derive(Debug)]
pub struct Counter {
    variable: String,
    step: i64,
}

impl Counter {
    pub fn increment(name: &str, markup: Option<&str>) -> Result<Self> {
        Self::new(name, markup, 1)
    }

    pub fn decrement(name: &str, markup: Option<&str>) -> Result<Self> {
        Self::new(name, markup, -1)
    }

    fn new(name: &str, markup: Option<&str>, step: i64) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        let mut parser = Parser::new(markup)?;
        let variable = parser.expect(TokenKind::Id)?;
        parser.expect_end()?;
        Ok(Self { variable, step })
    }

    /// `increment` shows the value before stepping, `decrement` the value after.
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let mut shown = 0;
        ctx.update_environment(self.variable.clone(), |current| {
            let current = current.map(Value::to_int).unwrap_or(0);
            let next = current.saturating_add(self.step);
            shown = if self.step > 0 { current } else { next };
            Value::Int(next)
        });
        out.push_str(&shown.to_string());
        Ok(())
    }
}
