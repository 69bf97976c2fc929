use crate::value::Value;
use std::fmt;

/// Built-in lookups that can appear as a step of a lookup chain (`items.size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFilter {
    Size,
    First,
    Last,
}

impl LookupFilter {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "size" => Some(LookupFilter::Size),
            "first" => Some(LookupFilter::First),
            "last" => Some(LookupFilter::Last),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LookupFilter::Size => "size",
            LookupFilter::First => "first",
            LookupFilter::Last => "last",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Steps applied left to right, each to the result of the previous one.
    Lookup(Vec<Expression>),
    Variable(String),
    LookupFilter(LookupFilter),
    Literal(Value),
    Subscript(Box<Expression>),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Lookup(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 && !matches!(step, Expression::Subscript(_)) {
                        f.write_str(".")?;
                    }
                    write!(f, "{step}")?;
                }
                Ok(())
            }
            Expression::Variable(name) => f.write_str(name),
            Expression::LookupFilter(filter) => f.write_str(filter.name()),
            Expression::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Expression::Literal(Value::Nil) => f.write_str("nil"),
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Subscript(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// A filter application inside a variable: `| name: arg, key: arg`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
}

/// An expression followed by its filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub expression: Expression,
    pub filters: Vec<FilterCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    Contains,
}

impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Operator::Equal),
            "!=" | "<>" => Some(Operator::NotEqual),
            "<" => Some(Operator::LessThan),
            ">" => Some(Operator::GreaterThan),
            "<=" => Some(Operator::LessOrEqual),
            ">=" => Some(Operator::GreaterOrEqual),
            "contains" => Some(Operator::Contains),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// `lhs [op rhs] [and|or condition]`, grouped to the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Expression,
    pub comparison: Option<(Operator, Expression)>,
    pub link: Option<(LogicalOperator, Box<Condition>)>,
}
