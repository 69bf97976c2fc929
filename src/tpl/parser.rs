use crate::Result;
use crate::error::{Error, SyntaxError};
use crate::tpl::ast::{
    Condition, Expression, FilterCall, LogicalOperator, LookupFilter, Operator, Variable,
};
use crate::tpl::lexer::{self, Token, TokenKind};
use crate::value::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

/// A cursor over the lexed tokens of one piece of markup.
///
/// The token list always ends with `EndOfString`, which is never consumed
/// by the helpers below.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    pub fn new(markup: &str) -> Result<Self> {
        Ok(Self {
            tokens: lexer::tokenize(markup)?,
            index: 0,
        })
    }

    fn token(&self, skip: usize) -> Option<&Token> {
        self.tokens.get(self.index + skip)
    }

    /// True if the token `skip` positions ahead has the given kind.
    pub fn look(&self, kind: TokenKind, skip: usize) -> bool {
        self.token(skip).is_some_and(|t| t.kind == kind)
    }

    /// True if the current token is the identifier `word`.
    pub fn look_id(&self, word: &str) -> bool {
        self.token(0)
            .is_some_and(|t| t.kind == TokenKind::Id && t.value == word)
    }

    pub fn consume(&mut self, kind: TokenKind) -> Option<String> {
        if kind == TokenKind::EndOfString || !self.look(kind, 0) {
            return None;
        }
        let value = self.tokens[self.index].value.clone();
        self.index += 1;
        Some(value)
    }

    pub fn consume_id(&mut self, word: &str) -> bool {
        if self.look_id(word) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<String> {
        self.consume(kind)
            .ok_or_else(|| Error::unexpected_token(kind.to_string(), self.describe_current()))
    }

    pub fn expect_end(&self) -> Result<()> {
        if self.look(TokenKind::EndOfString, 0) {
            Ok(())
        } else {
            Err(Error::unexpected_token(
                TokenKind::EndOfString.to_string(),
                self.describe_current(),
            ))
        }
    }

    pub fn at_end(&self) -> bool {
        self.look(TokenKind::EndOfString, 0)
    }

    fn describe_current(&self) -> String {
        match self.token(0) {
            Some(t) if t.kind == TokenKind::EndOfString => t.kind.to_string(),
            Some(t) => format!("{} '{}'", t.kind, t.value),
            None => TokenKind::EndOfString.to_string(),
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expression> {
        if self.at_end() {
            return Ok(Expression::Literal(Value::Nil));
        }
        if let Some(s) = self.consume(TokenKind::String) {
            return Ok(Expression::Literal(Value::String(s)));
        }
        if let Some(n) = self.consume(TokenKind::Integer) {
            return n
                .parse::<i64>()
                .map(|n| Expression::Literal(Value::Int(n)))
                .map_err(|_| SyntaxError::Invalid(format!("integer out of range: {n}")).into());
        }
        if let Some(d) = self.consume(TokenKind::Decimal) {
            return Decimal::from_str(&d)
                .map(|d| Expression::Literal(Value::Decimal(d)))
                .map_err(|_| SyntaxError::Invalid(format!("decimal out of range: {d}")).into());
        }
        if !self.look(TokenKind::Id, 0) {
            return Err(Error::unexpected_token("expression", self.describe_current()));
        }

        let mut steps = Vec::new();
        while let Some(id) = self.consume(TokenKind::Id) {
            if steps.is_empty() {
                match id.as_str() {
                    "nil" | "null" => return Ok(Expression::Literal(Value::Nil)),
                    "true" => return Ok(Expression::Literal(Value::Bool(true))),
                    "false" => return Ok(Expression::Literal(Value::Bool(false))),
                    _ => steps.push(Expression::Variable(id)),
                }
            } else {
                match LookupFilter::from_name(&id) {
                    Some(filter) => steps.push(Expression::LookupFilter(filter)),
                    None => steps.push(Expression::Variable(id)),
                }
            }

            while self.consume(TokenKind::OpenSquare).is_some() {
                let key = self.parse_expression()?;
                self.expect(TokenKind::CloseSquare)?;
                steps.push(Expression::Subscript(Box::new(key)));
            }

            if self.consume(TokenKind::Dot).is_none() {
                break;
            }
        }
        Ok(Expression::Lookup(steps))
    }

    pub fn parse_condition(&mut self) -> Result<Condition> {
        let lhs = self.parse_expression()?;
        let comparison = match self.consume(TokenKind::Comparison) {
            Some(symbol) => {
                let op = Operator::from_symbol(&symbol)
                    .ok_or(SyntaxError::UnknownOperator(symbol))?;
                Some((op, self.parse_expression()?))
            }
            None => None,
        };
        Ok(Condition {
            lhs,
            comparison,
            link: None,
        })
    }

    /// Parses `condition (and|or condition)*`, grouping to the right.
    pub fn parse_logical_condition(&mut self) -> Result<Condition> {
        let mut condition = self.parse_condition()?;
        let op = if self.consume_id("and") {
            Some(LogicalOperator::And)
        } else if self.consume_id("or") {
            Some(LogicalOperator::Or)
        } else {
            None
        };
        if let Some(op) = op {
            condition.link = Some((op, Box::new(self.parse_logical_condition()?)));
        }
        Ok(condition)
    }

    /// Parses an expression and its `| filter: args` pipeline.
    pub fn parse_variable(&mut self) -> Result<Variable> {
        let expression = self.parse_expression()?;
        let mut filters = Vec::new();
        while self.consume(TokenKind::Pipe).is_some() {
            let name = self.expect(TokenKind::Id)?;
            let mut call = FilterCall {
                name,
                args: Vec::new(),
                kwargs: Vec::new(),
            };
            if self.consume(TokenKind::Colon).is_some() {
                self.parse_filter_args(&mut call)?;
            }
            filters.push(call);
        }
        Ok(Variable {
            expression,
            filters,
        })
    }

    fn parse_filter_args(&mut self, call: &mut FilterCall) -> Result<()> {
        loop {
            if self.look(TokenKind::Id, 0) && self.look(TokenKind::Colon, 1) {
                let key = self.expect(TokenKind::Id)?;
                self.expect(TokenKind::Colon)?;
                call.kwargs.push((key, self.parse_expression()?));
            } else {
                call.args.push(self.parse_expression()?);
            }
            if self.consume(TokenKind::Comma).is_none() {
                return Ok(());
            }
        }
    }
}

/// Parses the complete markup of a `{{ }}` output.
pub fn parse_variable_markup(markup: &str) -> Result<Variable> {
    let mut parser = Parser::new(markup)?;
    let variable = parser.parse_variable()?;
    parser.expect_end()?;
    Ok(variable)
}

/// Parses the complete markup of an `if`/`elsif`/`unless` tag.
pub fn parse_condition_markup(markup: &str) -> Result<Condition> {
    let mut parser = Parser::new(markup)?;
    let condition = parser.parse_logical_condition()?;
    parser.expect_end()?;
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expression {
        Expression::Variable(name.to_string())
    }

    fn parse(markup: &str) -> Expression {
        Parser::new(markup).unwrap().parse_expression().unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse(""), Expression::Literal(Value::Nil));
        assert_eq!(parse("'x'"), Expression::Literal(Value::String("x".into())));
        assert_eq!(parse("42"), Expression::Literal(Value::Int(42)));
        assert_eq!(
            parse("2.5"),
            Expression::Literal(Value::Decimal(Decimal::new(25, 1)))
        );
        assert_eq!(parse("null"), Expression::Literal(Value::Nil));
        assert_eq!(parse("true"), Expression::Literal(Value::Bool(true)));
    }

    #[test]
    fn test_lookup_chain() {
        assert_eq!(
            parse("products[0].title.size"),
            Expression::Lookup(vec![
                var("products"),
                Expression::Subscript(Box::new(Expression::Literal(Value::Int(0)))),
                var("title"),
                Expression::LookupFilter(LookupFilter::Size),
            ])
        );
        assert_eq!(parse("size"), Expression::Lookup(vec![var("size")]));
        assert_eq!(
            parse("a[b['c']]").to_string(),
            "a[b['c']]"
        );
    }

    #[test]
    fn test_unexpected_token() {
        match Parser::new("| x").unwrap().parse_expression() {
            Err(Error::Syntax(SyntaxError::UnexpectedToken { .. })) => {}
            other => panic!("Expected unexpected token, got {other:?}"),
        }
        assert!(Parser::new("a[0").unwrap().parse_expression().is_err());
    }

    #[test]
    fn test_logical_condition_groups_right() {
        let condition = parse_condition_markup("a == 1 or b and c").unwrap();
        assert_eq!(condition.lhs, Expression::Lookup(vec![var("a")]));
        assert_eq!(
            condition.comparison,
            Some((Operator::Equal, Expression::Literal(Value::Int(1))))
        );
        let (op, rest) = condition.link.unwrap();
        assert_eq!(op, LogicalOperator::Or);
        assert_eq!(rest.link.as_ref().unwrap().0, LogicalOperator::And);
    }

    #[test]
    fn test_operator_words_inside_strings() {
        let condition = parse_condition_markup("a == 'and' and b == 'or'").unwrap();
        assert_eq!(
            condition.comparison,
            Some((
                Operator::Equal,
                Expression::Literal(Value::String("and".into()))
            ))
        );
        assert!(condition.link.is_some());
    }

    #[test]
    fn test_variable_with_filters() {
        let variable =
            parse_variable_markup("title | truncate: 20, ellipsis: '..' | upcase").unwrap();
        assert_eq!(variable.filters.len(), 2);
        let truncate = &variable.filters[0];
        assert_eq!(truncate.name, "truncate");
        assert_eq!(truncate.args, vec![Expression::Literal(Value::Int(20))]);
        assert_eq!(truncate.kwargs[0].0, "ellipsis");
        assert!(variable.filters[1].args.is_empty());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_variable_markup("a b").is_err());
        assert!(parse_condition_markup("a == ").is_ok());
        assert!(parse_variable_markup("a |").is_err());
    }
}
