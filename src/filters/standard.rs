use super::FilterRegistry;
use crate::Result;
use crate::error::RuntimeError;
use crate::options::RenderOptions;
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::ops::Range;

const ELLIPSIS: &str = "…";

/// Used by `date` when the format argument is empty, e.g. `7/5/06, 10:00:00 AM`.
const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%y, %-I:%M:%S %p";

type StandardFilter = fn(&Value, &[Value], &RenderOptions) -> Result<Value>;

const FILTERS: &[(&str, StandardFilter)] = &[
    ("append", append),
    ("prepend", prepend),
    ("downcase", downcase),
    ("upcase", upcase),
    ("capitalize", capitalize),
    ("strip", strip),
    ("lstrip", lstrip),
    ("rstrip", rstrip),
    ("strip_newlines", strip_newlines),
    ("newline_to_br", newline_to_br),
    ("escape", escape),
    ("escape_once", escape_once),
    ("url_encode", url_encode),
    ("url_decode", url_decode),
    ("strip_html", strip_html),
    ("truncate", truncate),
    ("truncatewords", truncatewords),
    ("replace", replace),
    ("replace_first", replace_first),
    ("remove", remove),
    ("remove_first", remove_first),
    ("slice", slice),
    ("split", split),
    ("plus", plus),
    ("minus", minus),
    ("times", times),
    ("divided_by", divided_by),
    ("modulo", modulo),
    ("abs", abs),
    ("ceil", ceil),
    ("floor", floor),
    ("round", round),
    ("join", join),
    ("uniq", uniq),
    ("size", size),
    ("first", first),
    ("last", last),
    ("reverse", reverse),
    ("compact", compact),
    ("map", map),
    ("concat", concat),
    ("sort", sort),
    ("sort_natural", sort_natural),
    ("default", default),
    ("date", date),
];

pub(super) fn register_all(registry: &mut FilterRegistry) {
    for &(name, filter) in FILTERS {
        registry.register(name, move |value, args, _kwargs, options| {
            filter(value, args, options)
        });
    }
}

fn arity(filter: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    let received = args.len();
    if received < min || received > max {
        let expected = if received < min { min } else { max };
        return Err(RuntimeError::InvalidArgCount {
            filter: filter.to_string(),
            expected,
            received,
        }
        .into());
    }
    Ok(())
}

fn text(value: &Value, options: &RenderOptions) -> String {
    value.render_string(options)
}

fn string_filter(
    name: &str,
    value: &Value,
    args: &[Value],
    options: &RenderOptions,
    f: impl FnOnce(&str) -> String,
) -> Result<Value> {
    arity(name, args, 0, 0)?;
    Ok(Value::String(f(&text(value, options))))
}

// ---------- strings ----------

fn append(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    let mut out = text(value, options);
    for arg in args {
        out.push_str(&text(arg, options));
    }
    Ok(Value::String(out))
}

fn prepend(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("prepend", args, 1, 1)?;
    let mut out = text(&args[0], options);
    out.push_str(&text(value, options));
    Ok(Value::String(out))
}

fn downcase(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("downcase", value, args, options, str::to_lowercase)
}

fn upcase(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("upcase", value, args, options, str::to_uppercase)
}

fn capitalize(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("capitalize", value, args, options, |s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    })
}

fn strip(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("strip", value, args, options, |s| s.trim().to_string())
}

fn lstrip(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("lstrip", value, args, options, |s| s.trim_start().to_string())
}

fn rstrip(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("rstrip", value, args, options, |s| s.trim_end().to_string())
}

fn strip_newlines(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("strip_newlines", value, args, options, |s| {
        s.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
    })
}

fn newline_to_br(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("newline_to_br", value, args, options, |s| s.replace('\n', "<br />\n"))
}

fn escape(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("escape", value, args, options, escape_html)
}

fn escape_once(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("escape_once", value, args, options, |s| {
        escape_html(&unescape_html(s))
    })
}

fn url_encode(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("url_encode", value, args, options, |s| {
        let mut out = String::with_capacity(s.len());
        for byte in s.bytes() {
            match byte {
                b' ' => out.push('+'),
                b if b.is_ascii_alphanumeric() || b"-._~/?".contains(&b) => out.push(b as char),
                b => out.push_str(&format!("%{b:02X}")),
            }
        }
        out
    })
}

fn url_decode(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("url_decode", value, args, options, |s| {
        percent_decode(s).unwrap_or_else(|| s.replace('+', " "))
    })
}

fn strip_html(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    string_filter("strip_html", value, args, options, |s| {
        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(open) = rest.find('<') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('>') {
                Some(close) if close > 0 => rest = &after[close + 1..],
                _ => {
                    out.push('<');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    })
}

/// Shortens to `length` characters, the suffix included.
fn truncate(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("truncate", args, 1, 2)?;
    let input = text(value, options);
    let limit = usize::try_from(args[0].to_int()).unwrap_or(0);
    if input.chars().count() <= limit {
        return Ok(Value::String(input));
    }

    let suffix = args
        .get(1)
        .map(|suffix| text(suffix, options))
        .unwrap_or_else(|| ELLIPSIS.to_string());
    let keep = limit.saturating_sub(suffix.chars().count());
    let mut out: String = input.chars().take(keep).collect();
    out.push_str(&suffix);
    Ok(Value::String(out))
}

fn truncatewords(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("truncatewords", args, 1, 2)?;
    let input = text(value, options);
    let limit = usize::try_from(args[0].to_int()).unwrap_or(0).max(1);
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.len() <= limit {
        return Ok(Value::String(input));
    }

    let suffix = args
        .get(1)
        .map(|suffix| text(suffix, options))
        .unwrap_or_else(|| ELLIPSIS.to_string());
    let mut out = words[..limit].join(" ");
    out.push_str(&suffix);
    Ok(Value::String(out))
}

fn replace(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("replace", args, 2, 2)?;
    let target = text(&args[0], options);
    let replacement = text(&args[1], options);
    Ok(Value::String(replace_n(&text(value, options), &target, &replacement, None)))
}

fn replace_first(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("replace_first", args, 2, 2)?;
    let target = text(&args[0], options);
    let replacement = text(&args[1], options);
    Ok(Value::String(replace_n(&text(value, options), &target, &replacement, Some(1))))
}

fn remove(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("remove", args, 1, 1)?;
    let target = text(&args[0], options);
    Ok(Value::String(replace_n(&text(value, options), &target, "", None)))
}

fn remove_first(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("remove_first", args, 1, 1)?;
    let target = text(&args[0], options);
    Ok(Value::String(replace_n(&text(value, options), &target, "", Some(1))))
}

/// Substring of a string or sub-array of an array. A negative offset counts from the end.
fn slice(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("slice", args, 1, 2)?;
    let offset = args[0].to_int();
    let length = args
        .get(1)
        .map(|length| usize::try_from(length.to_int()).unwrap_or(0))
        .unwrap_or(1);

    let sliced = match value {
        Value::Array(items) => {
            window(items.len(), offset, length).map(|range| Value::Array(items[range].to_vec()))
        }
        other => {
            let chars: Vec<char> = text(other, options).chars().collect();
            window(chars.len(), offset, length)
                .map(|range| Value::String(chars[range].iter().collect()))
        }
    };
    Ok(sliced.unwrap_or_default())
}

fn split(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("split", args, 1, 1)?;
    let input = text(value, options);
    let separator = text(&args[0], options);
    let parts = if separator.is_empty() {
        input.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        input
            .split(separator.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

// ---------- math ----------

fn plus(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arithmetic("plus", value, args, i64::checked_add, Decimal::checked_add)
}

fn minus(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arithmetic("minus", value, args, i64::checked_sub, Decimal::checked_sub)
}

fn times(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arithmetic("times", value, args, i64::checked_mul, Decimal::checked_mul)
}

fn divided_by(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arithmetic("divided_by", value, args, i64::checked_div, Decimal::checked_div)
}

fn modulo(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arithmetic("modulo", value, args, i64::checked_rem, Decimal::checked_rem)
}

fn abs(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("abs", args, 0, 0)?;
    Ok(match value {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .unwrap_or_else(|| Value::Decimal(Decimal::from(*n).abs())),
        other => Value::Decimal(other.to_decimal().abs()),
    })
}

fn ceil(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("ceil", args, 0, 0)?;
    Ok(match value {
        Value::Int(_) => value.clone(),
        other => integral(other.to_decimal().ceil()),
    })
}

fn floor(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("floor", args, 0, 0)?;
    Ok(match value {
        Value::Int(_) => value.clone(),
        other => integral(other.to_decimal().floor()),
    })
}

/// Rounds half away from zero to an optional number of decimal places.
fn round(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("round", args, 0, 1)?;
    if let Value::Int(_) = value {
        return Ok(value.clone());
    }
    let scale = args
        .first()
        .map(|scale| scale.to_int().clamp(0, 28) as u32)
        .unwrap_or(0);
    Ok(Value::Decimal(
        value
            .to_decimal()
            .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
    ))
}

/// Int op Int stays an Int unless it overflows; anything else is computed as a Decimal.
fn arithmetic(
    name: &str,
    value: &Value,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    decimal_op: fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Value> {
    arity(name, args, 1, 1)?;
    let operand = &args[0];
    if let (Value::Int(lhs), Value::Int(rhs)) = (value, operand)
        && let Some(result) = int_op(*lhs, *rhs)
    {
        return Ok(Value::Int(result));
    }

    let rhs = operand.to_decimal();
    if rhs.is_zero() && matches!(name, "divided_by" | "modulo") {
        return Err(RuntimeError::WrongType(format!("{name}: division by zero")).into());
    }
    decimal_op(value.to_decimal(), rhs)
        .map(Value::Decimal)
        .ok_or_else(|| RuntimeError::WrongType(format!("{name}: numeric overflow")).into())
}

fn integral(value: Decimal) -> Value {
    value.to_i64().map(Value::Int).unwrap_or(Value::Decimal(value))
}

// ---------- arrays ----------

fn join(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("join", args, 0, 1)?;
    let separator = args
        .first()
        .map(|separator| text(separator, options))
        .unwrap_or_else(|| " ".to_string());
    let joined = value
        .to_array()
        .iter()
        .map(|item| text(item, options))
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::String(joined))
}

fn uniq(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("uniq", args, 0, 0)?;
    let mut unique: Vec<Value> = Vec::new();
    for item in value.to_array() {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    Ok(Value::Array(unique))
}

fn size(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("size", args, 0, 0)?;
    Ok(Value::Int(value.size() as i64))
}

fn first(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("first", args, 0, 0)?;
    Ok(value.to_array().into_iter().next().unwrap_or_default())
}

fn last(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("last", args, 0, 0)?;
    Ok(value.to_array().pop().unwrap_or_default())
}

fn reverse(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("reverse", args, 0, 0)?;
    let mut items = value.to_array();
    items.reverse();
    Ok(Value::Array(items))
}

fn compact(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("compact", args, 0, 0)?;
    let mut items = value.to_array();
    items.retain(|item| !item.is_nil());
    Ok(Value::Array(items))
}

fn map(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("map", args, 1, 1)?;
    let property = &args[0];
    Ok(Value::Array(
        value
            .to_array()
            .iter()
            .map(|item| item.lookup(property, options.key_encoding))
            .collect(),
    ))
}

fn concat(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("concat", args, 1, 1)?;
    let Value::Array(tail) = &args[0] else {
        return Err(RuntimeError::WrongType("concat requires an array argument".to_string()).into());
    };
    let mut items = value.to_array();
    items.extend(tail.iter().cloned());
    Ok(Value::Array(items))
}

fn sort(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("sort", args, 0, 1)?;
    let mut items = value.to_array();
    match args.first() {
        Some(property) => items.sort_by(|a, b| {
            sort_order(
                &a.lookup(property, options.key_encoding),
                &b.lookup(property, options.key_encoding),
            )
        }),
        None => items.sort_by(sort_order),
    }
    Ok(Value::Array(items))
}

/// Case-insensitive ordering on the rendered text.
fn sort_natural(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("sort_natural", args, 0, 1)?;
    let mut items = value.to_array();
    items.sort_by_cached_key(|item| {
        let key = match args.first() {
            Some(property) => item.lookup(property, options.key_encoding),
            None => item.clone(),
        };
        text(&key, options).to_lowercase()
    });
    Ok(Value::Array(items))
}

/// Same-variant values use their natural order. Ints and decimals are compared
/// numerically; anything else groups by kind.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    if let Some(ordering) = a.compare(b) {
        return ordering;
    }
    match (a, b) {
        (Value::Int(_) | Value::Decimal(_), Value::Int(_) | Value::Decimal(_)) => {
            a.to_decimal().cmp(&b.to_decimal())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Nil => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Decimal(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Dictionary(_) => 5,
        Value::Drop(_) => 6,
    }
}

// ---------- other ----------

/// The argument replaces nil and empty strings, arrays and dictionaries.
fn default(value: &Value, args: &[Value], _options: &RenderOptions) -> Result<Value> {
    arity("default", args, 1, 1)?;
    let empty = match value {
        Value::Nil => true,
        Value::String(_) | Value::Array(_) | Value::Dictionary(_) => value.size() == 0,
        _ => false,
    };
    Ok(if empty { args[0].clone() } else { value.clone() })
}

fn date(value: &Value, args: &[Value], options: &RenderOptions) -> Result<Value> {
    arity("date", args, 1, 1)?;
    let date = to_datetime(value)
        .ok_or_else(|| RuntimeError::WrongType(format!("Could not convert '{value}' to date")))?;

    let format = match &args[0] {
        Value::Nil => String::new(),
        other => text(other, options),
    };
    let format = if format.is_empty() {
        DEFAULT_DATE_FORMAT
    } else {
        format.as_str()
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(RuntimeError::WrongType(format!("Invalid date format '{format}'")).into());
    }
    Ok(Value::String(date.format_with_items(items.iter()).to_string()))
}

fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let input = match value {
        Value::Int(seconds) => return DateTime::from_timestamp(*seconds, 0),
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(seconds) = input.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0);
    }
    if input.eq_ignore_ascii_case("now") || input.eq_ignore_ascii_case("today") {
        return Some(Utc::now());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

// ---------- helpers ----------

fn replace_n(input: &str, target: &str, replacement: &str, count: Option<usize>) -> String {
    if target.is_empty() {
        return input.to_string();
    }
    match count {
        Some(count) => input.replacen(target, replacement, count),
        None => input.replace(target, replacement),
    }
}

fn window(len: usize, offset: i64, length: usize) -> Option<Range<usize>> {
    let start = if offset < 0 {
        len.checked_sub(usize::try_from(offset.unsigned_abs()).ok()?)?
    } else {
        usize::try_from(offset).ok().filter(|start| *start <= len)?
    };
    Some(start..start.saturating_add(length).min(len))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let code = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// `+` becomes a space. Returns `None` for malformed escapes or invalid UTF-8.
fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                if !hex.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
