mod serializer;

pub use serializer::{ValueSerializer, to_value};

use crate::options::{KeyEncoding, RenderOptions};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An object that answers key lookups on demand instead of holding its data in a map.
///
/// Drops are shared by reference and compare by identity.
pub trait DropObject: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
}

/// A runtime datum flowing through templates.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    String(String),
    Int(i64),
    Decimal(Decimal),
    Array(Vec<Value>),
    Dictionary(HashMap<String, Value>),
    Drop(Arc<dyn DropObject>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Dictionary(a), Value::Dictionary(b)) => a == b,
            (Value::Drop(a), Value::Drop(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Orders two values of the same numeric or string variant; every other pair is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Value::Dictionary(_))
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Value::Drop(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Character count for strings, element count for collections, zero otherwise.
    pub fn size(&self) -> usize {
        match self {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Dictionary(map) => map.len(),
            _ => 0,
        }
    }

    /// Resolves `key` against this value. Never fails; mismatches yield `Nil`.
    pub fn lookup(&self, key: &Value, keys: KeyEncoding) -> Value {
        match (self, key) {
            (Value::Array(items), Value::Int(index)) => usize::try_from(*index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default(),
            (Value::Dictionary(map), Value::String(key)) => {
                map.get(key).cloned().unwrap_or_default()
            }
            (Value::Drop(drop), Value::String(key)) => {
                drop.get(&keys.transform(key)).unwrap_or_default()
            }
            _ => Value::Nil,
        }
    }

    pub fn to_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Decimal(d) => d.trunc().to_i64().unwrap_or_default(),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| Decimal::from_str(s).ok().and_then(|d| d.trunc().to_i64()))
                    .unwrap_or_default()
            }
            _ => 0,
        }
    }

    pub fn to_decimal(&self) -> Decimal {
        match self {
            Value::Int(n) => Decimal::from(*n),
            Value::Decimal(d) => *d,
            Value::String(s) => Decimal::from_str(s.trim()).unwrap_or_default(),
            _ => Decimal::ZERO,
        }
    }

    /// Arrays as-is, `Nil` as empty, anything else as a single element.
    pub fn to_array(&self) -> Vec<Value> {
        match self {
            Value::Array(items) => items.clone(),
            Value::Nil => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Text written to the output for this value.
    pub fn render_string(&self, options: &RenderOptions) -> String {
        match self {
            Value::Decimal(d) => options.decimal_encoding.encode(d),
            other => other.to_string(),
        }
    }

    pub fn push(&mut self, value: Value) {
        if let Value::Array(items) = self {
            items.push(value);
        }
    }

    pub fn pop(&mut self) -> Option<Value> {
        match self {
            Value::Array(items) => items.pop(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{}", d.normalize()),
            Value::Nil | Value::Array(_) | Value::Dictionary(_) | Value::Drop(_) => Ok(()),
        }
    }
}

/// Anything that can be handed to a template as data.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! impl_to_value_int {
    ($($rust_type:ty),*) => {
        $(
            impl ToValue for $rust_type {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )*
    };
}

impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        i64::try_from(*self)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Decimal(Decimal::from(*self)))
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        (*self as u64).to_value()
    }
}

/// NaN and infinities have no decimal form and become `Nil`. `to_value` through
/// serde rejects them with `Error::Conversion` instead.
impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Decimal::try_from(*self)
            .map(Value::Decimal)
            .unwrap_or_default()
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        f64::from(*self).to_value()
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Arc<dyn DropObject> {
    fn to_value(&self) -> Value {
        Value::Drop(Arc::clone(self))
    }
}

impl<T> ToValue for &T
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Nil,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Dictionary(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ProductDrop;

    impl DropObject for ProductDrop {
        fn get(&self, key: &str) -> Option<Value> {
            match key {
                "title" => Some(Value::String("Shoe".to_string())),
                "unit_price" => Some(Value::Int(42)),
                _ => None,
            }
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_cross_variant_equality() {
        assert_ne!(Value::Int(1), Value::Decimal(dec("1.0")));
        assert_ne!(Value::Int(1), Value::String("1".to_string()));
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(
            Value::Array(vec![Value::Int(1)]),
            Value::Array(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_drop_identity() {
        let drop: Arc<dyn DropObject> = Arc::new(ProductDrop);
        let a = Value::Drop(drop.clone());
        let b = Value::Drop(drop);
        let c = Value::Drop(Arc::new(ProductDrop));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::String("b".into()).compare(&Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Nil.compare(&Value::Int(10)), None);
        assert_eq!(Value::Int(1).compare(&Value::Decimal(dec("2.0"))), None);
        assert_eq!(Value::Nil.compare(&Value::Nil), None);
    }

    #[test]
    fn test_lookup() {
        let array = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(array.lookup(&Value::Int(1), KeyEncoding::Identity), Value::Int(2));
        assert_eq!(array.lookup(&Value::Int(5), KeyEncoding::Identity), Value::Nil);
        assert_eq!(array.lookup(&Value::Int(-1), KeyEncoding::Identity), Value::Nil);
        assert_eq!(
            array.lookup(&Value::String("0".into()), KeyEncoding::Identity),
            Value::Nil
        );

        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Bool(true));
        let dict = Value::Dictionary(map);
        assert_eq!(
            dict.lookup(&Value::String("a".into()), KeyEncoding::Identity),
            Value::Bool(true)
        );
        assert_eq!(dict.lookup(&Value::Int(0), KeyEncoding::Identity), Value::Nil);

        let drop = Value::Drop(Arc::new(ProductDrop));
        assert_eq!(
            drop.lookup(&Value::String("unitPrice".into()), KeyEncoding::SnakeCase),
            Value::Int(42)
        );
        assert_eq!(
            drop.lookup(&Value::String("unitPrice".into()), KeyEncoding::Identity),
            Value::Nil
        );
        assert_eq!(
            Value::Int(3).lookup(&Value::String("x".into()), KeyEncoding::Identity),
            Value::Nil
        );
    }

    #[test]
    fn test_coercion() {
        assert_eq!(Value::Decimal(dec("3.9")).to_int(), 3);
        assert_eq!(Value::Decimal(dec("-3.9")).to_int(), -3);
        assert_eq!(Value::String("12".into()).to_int(), 12);
        assert_eq!(Value::String("invalid integer".into()).to_int(), 0);
        assert_eq!(Value::Nil.to_int(), 0);
        assert_eq!(Value::Int(4).to_decimal(), dec("4"));
        assert_eq!(Value::String("1.25".into()).to_decimal(), dec("1.25"));
    }

    #[test]
    fn test_size() {
        assert_eq!(Value::String("héllo".into()).size(), 5);
        assert_eq!(Value::Array(vec![Value::Nil; 3]).size(), 3);
        assert_eq!(Value::Int(10).size(), 0);
    }

    #[test]
    fn test_display_and_render() {
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Decimal(dec("2.50")).to_string(), "2.5");
        assert_eq!(Value::Array(vec![Value::Int(1)]).to_string(), "");

        let options = RenderOptions::default();
        let value = Value::Decimal(dec("20") / dec("7.0"));
        assert_eq!(value.render_string(&options), "2.85714286");
    }

    #[test]
    fn test_push_pop() {
        let mut array = Value::Array(vec![]);
        array.push(Value::Int(1));
        array.push(Value::Int(2));
        assert_eq!(array.pop(), Some(Value::Int(2)));
        assert_eq!(array.size(), 1);

        let mut scalar = Value::Int(1);
        scalar.push(Value::Int(2));
        assert_eq!(scalar.pop(), None);
    }

    #[test]
    fn test_to_value() {
        assert_eq!(5i32.to_value(), Value::Int(5));
        assert_eq!("x".to_value(), Value::String("x".into()));
        assert_eq!(None::<i32>.to_value(), Value::Nil);
        assert_eq!(vec![1u8, 2].to_value(), Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(2.5f64.to_value(), Value::Decimal(dec("2.5")));
        assert_eq!(u64::MAX.to_value(), Value::Decimal(Decimal::from(u64::MAX)));
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(f64::NAN.to_value(), Value::Nil);
        assert_eq!(f64::INFINITY.to_value(), Value::Nil);
        assert_eq!(f32::NEG_INFINITY.to_value(), Value::Nil);
        assert!(matches!(
            to_value(&f64::INFINITY),
            Err(crate::error::Error::Conversion(_))
        ));
    }
}
