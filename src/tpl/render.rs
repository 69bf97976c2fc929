use crate::Result;
use crate::error::RuntimeError;
use crate::tpl::ast::{Condition, Expression, LogicalOperator, LookupFilter, Operator, Variable};
use crate::tpl::render_context::Context;
use crate::value::Value;
use log::trace;
use std::cmp::Ordering;
use std::collections::HashMap;

impl Expression {
    pub fn evaluate(&self, ctx: &Context<'_>) -> Value {
        self.evaluate_step(ctx, None)
    }

    /// Evaluates one step of a lookup chain against the previous step's result.
    fn evaluate_step(&self, ctx: &Context<'_>, data: Option<Value>) -> Value {
        let keys = ctx.options().key_encoding;
        match self {
            Expression::Lookup(steps) => {
                let mut current = data;
                for step in steps {
                    current = Some(step.evaluate_step(ctx, current));
                }
                current.unwrap_or_default()
            }
            Expression::Variable(name) => match data {
                Some(data) => data.lookup(&Value::String(name.clone()), keys),
                None => ctx.read(name),
            },
            Expression::Literal(value) => value.clone(),
            Expression::Subscript(key) => match data {
                Some(data) => data.lookup(&key.evaluate(ctx), keys),
                None => Value::Nil,
            },
            Expression::LookupFilter(filter) => match data {
                Some(data) => apply_lookup_filter(*filter, data, ctx),
                None => Value::Nil,
            },
        }
    }
}

fn apply_lookup_filter(filter: LookupFilter, data: Value, ctx: &Context<'_>) -> Value {
    match data {
        // Keyed containers may define their own `size`/`first`/`last`.
        Value::Dictionary(_) | Value::Drop(_) => data.lookup(
            &Value::String(filter.name().to_string()),
            ctx.options().key_encoding,
        ),
        Value::Array(items) => match filter {
            LookupFilter::Size => Value::Int(items.len() as i64),
            LookupFilter::First => items.into_iter().next().unwrap_or_default(),
            LookupFilter::Last => items.into_iter().last().unwrap_or_default(),
        },
        other => match filter {
            LookupFilter::Size => Value::Int(other.size() as i64),
            LookupFilter::First | LookupFilter::Last => Value::Nil,
        },
    }
}

impl Condition {
    pub fn evaluate(&self, ctx: &Context<'_>) -> bool {
        let lhs = self.lhs.evaluate(ctx);
        let result = match &self.comparison {
            None => lhs.is_truthy(),
            Some((op, rhs)) => compare(&lhs, *op, &rhs.evaluate(ctx)),
        };
        match &self.link {
            None => result,
            Some((LogicalOperator::And, next)) => result && next.evaluate(ctx),
            Some((LogicalOperator::Or, next)) => result || next.evaluate(ctx),
        }
    }
}

pub fn compare(lhs: &Value, op: Operator, rhs: &Value) -> bool {
    match op {
        Operator::Equal => lhs == rhs,
        Operator::NotEqual => lhs != rhs,
        Operator::LessThan => lhs.compare(rhs) == Some(Ordering::Less),
        Operator::GreaterThan => lhs.compare(rhs) == Some(Ordering::Greater),
        Operator::LessOrEqual => matches!(lhs.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
        Operator::GreaterOrEqual => {
            matches!(lhs.compare(rhs), Some(Ordering::Greater | Ordering::Equal))
        }
        Operator::Contains => match lhs {
            Value::Array(items) => items.contains(rhs),
            Value::Dictionary(map) => map.contains_key(&rhs.to_string()),
            Value::String(s) => s.contains(&rhs.to_string()),
            _ => false,
        },
    }
}

impl Variable {
    /// Evaluates the expression, then threads it through each filter in order.
    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value> {
        let mut value = self.expression.evaluate(ctx);
        for call in &self.filters {
            let filter = ctx
                .filter(&call.name)
                .ok_or_else(|| RuntimeError::UnknownFilter(call.name.clone()))?;
            let args: Vec<Value> = call.args.iter().map(|a| a.evaluate(ctx)).collect();
            let kwargs: HashMap<String, Value> = call
                .kwargs
                .iter()
                .map(|(k, v)| (k.clone(), v.evaluate(ctx)))
                .collect();
            trace!("applying filter '{}' with {} argument(s)", call.name, args.len());
            value = filter(&value, &args, &kwargs, ctx.options())?;
        }
        Ok(value)
    }
}
