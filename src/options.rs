use rust_decimal::{Decimal, RoundingStrategy};

/// Maximum number of nested `include` tags allowed during a single render.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 100;

/// How decimals are turned into output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalEncoding {
    /// Every significant digit is kept.
    Full,
    /// Rounded (half away from zero) to the given number of fractional digits.
    Scaled(u32),
}

impl Default for DecimalEncoding {
    fn default() -> Self {
        DecimalEncoding::Scaled(8)
    }
}

impl DecimalEncoding {
    pub fn encode(&self, value: &Decimal) -> String {
        let value = match self {
            DecimalEncoding::Full => *value,
            DecimalEncoding::Scaled(scale) => {
                value.round_dp_with_strategy(*scale, RoundingStrategy::MidpointAwayFromZero)
            }
        };
        value.normalize().to_string()
    }
}

/// How keys are rewritten before being handed to a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    #[default]
    Identity,
    /// `myURLProperty` becomes `my_url_property`.
    SnakeCase,
}

impl KeyEncoding {
    pub fn transform(&self, key: &str) -> String {
        match self {
            KeyEncoding::Identity => key.to_string(),
            KeyEncoding::SnakeCase => to_snake_case(key),
        }
    }
}

/// Render-time settings shared by tags and filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub decimal_encoding: DecimalEncoding,
    pub key_encoding: KeyEncoding,
    pub max_include_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            decimal_encoding: DecimalEncoding::default(),
            key_encoding: KeyEncoding::default(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut iter = s.chars().peekable();
    let mut prev_is_lower_or_digit = false;

    while let Some(ch) = iter.next() {
        if ch == '_' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_is_lower_or_digit = false;
            continue;
        }

        if ch.is_uppercase() {
            // A run of capitals is one word; the last capital starts the next one.
            let next_is_lower = iter.peek().is_some_and(|n| n.is_lowercase());
            if !out.is_empty() && (prev_is_lower_or_digit || next_is_lower) && !out.ends_with('_')
            {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_is_lower_or_digit = false;
        } else {
            out.push(ch);
            prev_is_lower_or_digit = ch.is_lowercase() || ch.is_numeric();
        }
    }
    out
}
