use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::ast::Condition;
use crate::tpl::node::{BlockBody, ParseContext, parse_block};
use crate::tpl::parser::parse_condition_markup;
use crate::tpl::render_context::Context;
use crate::tpl::tokenizer::Tokenizer;

#[derive(Debug)]
struct Branch {
    /// `None` for the `else` branch.
    condition: Option<Condition>,
    body: BlockBody,
}

/// `if` / `unless` with any number of `elsif` branches and an optional `else`.
///
/// `unless` only negates its own condition; `elsif` branches read as written.
#[derive(Debug)]
pub struct If {
    name: String,
    inverted: bool,
    branches: Vec<Branch>,
}

impl If {
    pub fn new(name: &str, markup: Option<&str>, inverted: bool) -> Result<Self> {
        let markup = markup.ok_or_else(|| SyntaxError::MissingMarkup(name.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            inverted,
            branches: vec![Branch {
                condition: Some(parse_condition_markup(markup)?),
                body: BlockBody::default(),
            }],
        })
    }

    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<()> {
        loop {
            let mut body = BlockBody::default();
            let mut next: Option<Branch> = None;
            let after_else = self.branches.last().is_some_and(|b| b.condition.is_none());
            let name = &self.name;
            let more = parse_block(name, &mut body, tokens, ctx, |tag, markup| {
                if after_else && (tag == "elsif" || tag == "else") {
                    return Err(SyntaxError::Invalid(format!("'{tag}' after 'else' in '{name}'")).into());
                }
                let condition = match tag {
                    "elsif" => {
                        let markup = markup
                            .ok_or_else(|| SyntaxError::MissingMarkup(tag.to_string()))?;
                        Some(parse_condition_markup(markup)?)
                    }
                    "else" => None,
                    _ => return Err(SyntaxError::UnknownTag(tag.to_string()).into()),
                };
                next = Some(Branch {
                    condition,
                    body: BlockBody::default(),
                });
                Ok(())
            })?;

            if let Some(current) = self.branches.last_mut() {
                current.body = body;
            }
            match next {
                Some(branch) if more => self.branches.push(branch),
                _ => return Ok(()),
            }
        }
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        for (i, branch) in self.branches.iter().enumerate() {
            let taken = match &branch.condition {
                Some(condition) => {
                    let result = condition.evaluate(ctx);
                    if i == 0 && self.inverted { !result } else { result }
                }
                None => true,
            };
            if taken {
                return branch.body.render(ctx, out);
            }
        }
        Ok(())
    }
}
