//! The formatter registry (spec.md §4.E): a fixed dispatch table from
//! formatter name to a plain function, the same shape the teacher's
//! instruction-decoding tables use — a `match`/lookup over a small closed
//! set rather than a trait-object plugin system, because the formatter set
//! is part of the language, not an extension point.

use std::collections::HashMap;

use crate::value::{Styling, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct FormatError {
    pub message: String,
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FormatError {}

pub type FormatResult = Result<Value, FormatError>;

type FormatterFn = fn(Value, &[String]) -> FormatResult;

pub struct FormatterRegistry {
    table: HashMap<&'static str, FormatterFn>,
}

impl FormatterRegistry {
    pub fn new() -> Self {
        let mut table: HashMap<&'static str, FormatterFn> = HashMap::new();
        table.insert("upper", f_upper);
        table.insert("lower", f_lower);
        table.insert("capitalize", f_capitalize);
        table.insert("trim", f_trim);
        table.insert("currency", f_currency);
        table.insert("number", f_number);
        table.insert("percent", f_percent);
        table.insert("round", f_round);
        table.insert("date", f_date);
        table.insert("dateTime", f_date_time);
        table.insert("fromNow", f_from_now);
        table.insert("join", f_join);
        table.insert("length", f_length);
        table.insert("sum", f_sum);
        table.insert("count", f_count);
        table.insert("avg", f_avg);
        table.insert("max", f_max);
        table.insert("min", f_min);
        table.insert("truncate", f_truncate);
        table.insert("default", f_default);
        table.insert("escape", f_escape);
        table.insert("bold", f_bold);
        table.insert("italic", f_italic);
        table.insert("underline", f_underline);
        table.insert("size", f_size);
        table.insert("color", f_color);
        Self { table }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn apply(&self, name: &str, value: Value, args: &[String]) -> FormatResult {
        match self.table.get(name) {
            Some(f) => f(value, args),
            None => Err(FormatError {
                message: format!("unknown formatter '{name}'"),
            }),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn f_upper(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Str(value.to_display_string().to_uppercase()))
}

fn f_lower(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Str(value.to_display_string().to_lowercase()))
}

fn f_capitalize(value: Value, _args: &[String]) -> FormatResult {
    let s = value.to_display_string();
    let mut chars = s.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    Ok(Value::Str(capitalized))
}

fn f_trim(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Str(value.to_display_string().trim().to_string()))
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "CNY" => Some("¥"),
        "INR" => Some("₹"),
        "CHF" => Some("CHF "),
        "CAD" => Some("CA$"),
        "AUD" => Some("A$"),
        _ => None,
    }
}

fn f_currency(value: Value, args: &[String]) -> FormatResult {
    let n = value.to_number();
    if n.is_nan() {
        return Err(FormatError {
            message: "currency formatter requires a numeric value".into(),
        });
    }
    let code = args.first().map(String::as_str).unwrap_or("USD");
    let raw = format!("{:.2}", n.abs());
    let (int_part, frac_part) = raw.split_once('.').expect("fixed 2-decimal format always has a point");
    let body = format!("{}.{}", group_thousands(int_part), frac_part);
    let sign = if n < 0.0 { "-" } else { "" };
    let rendered = match currency_symbol(code) {
        Some(sym) => format!("{sign}{sym}{body}"),
        None => format!("{sign}{} {body}", code.to_uppercase()),
    };
    Ok(Value::Str(rendered))
}

fn f_number(value: Value, args: &[String]) -> FormatResult {
    let n = value.to_number();
    if n.is_nan() {
        return Err(FormatError {
            message: "number formatter requires a numeric value".into(),
        });
    }
    let decimals: usize = args
        .first()
        .and_then(|a| a.parse().ok())
        .unwrap_or(0);
    let body = format!("{n:.decimals$}");
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body.as_str(), None),
    };
    let neg = int_part.starts_with('-');
    let int_part = int_part.trim_start_matches('-');
    let grouped = group_thousands(int_part);
    let mut out = String::new();
    if neg {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    Ok(Value::Str(out))
}

fn group_thousands(digits: &str) -> String {
    let bytes = digits.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i != 0 && (bytes.len() - i) % 3 == 0 {
            out.push(b',');
        }
        out.push(*b);
    }
    String::from_utf8(out).unwrap()
}

fn f_percent(value: Value, args: &[String]) -> FormatResult {
    let n = value.to_number();
    if n.is_nan() {
        return Err(FormatError {
            message: "percent formatter requires a numeric value".into(),
        });
    }
    let decimals: usize = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
    Ok(Value::Str(format!("{:.decimals$}%", n * 100.0)))
}

fn f_round(value: Value, args: &[String]) -> FormatResult {
    let n = value.to_number();
    if n.is_nan() {
        return Err(FormatError {
            message: "round formatter requires a numeric value".into(),
        });
    }
    let decimals: i32 = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
    let factor = 10f64.powi(decimals);
    Ok(Value::Number((n * factor).round() / factor))
}

fn translate_pattern(pattern: &str) -> String {
    pattern
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0).unwrap());
    }
    None
}

fn f_date(value: Value, args: &[String]) -> FormatResult {
    let s = value.to_display_string();
    let dt = parse_datetime(&s).ok_or_else(|| FormatError {
        message: format!("'{s}' is not a recognized date"),
    })?;
    let pattern = args.first().map(String::as_str).unwrap_or("YYYY-MM-DD");
    Ok(Value::Str(dt.format(&translate_pattern(pattern)).to_string()))
}

fn f_date_time(value: Value, args: &[String]) -> FormatResult {
    let s = value.to_display_string();
    let dt = parse_datetime(&s).ok_or_else(|| FormatError {
        message: format!("'{s}' is not a recognized date"),
    })?;
    let pattern = args
        .first()
        .map(String::as_str)
        .unwrap_or("YYYY-MM-DD HH:mm:ss");
    Ok(Value::Str(dt.format(&translate_pattern(pattern)).to_string()))
}

fn f_from_now(value: Value, _args: &[String]) -> FormatResult {
    let s = value.to_display_string();
    let dt = parse_datetime(&s).ok_or_else(|| FormatError {
        message: format!("'{s}' is not a recognized date"),
    })?;
    let now = Utc::now().naive_utc();
    let delta = now.signed_duration_since(dt);
    let secs = delta.num_seconds();
    let (amount, unit, future) = classify_duration(secs.abs());
    let phrase = if secs >= 0 {
        format!("{amount} {unit} ago")
    } else {
        let _ = future;
        format!("in {amount} {unit}")
    };
    Ok(Value::Str(phrase))
}

fn classify_duration(secs: i64) -> (i64, &'static str, bool) {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;
    if secs < MINUTE {
        (secs.max(1), "seconds", false)
    } else if secs < HOUR {
        (secs / MINUTE, plural(secs / MINUTE, "minute"), false)
    } else if secs < DAY {
        (secs / HOUR, plural(secs / HOUR, "hour"), false)
    } else if secs < MONTH {
        (secs / DAY, plural(secs / DAY, "day"), false)
    } else if secs < YEAR {
        (secs / MONTH, plural(secs / MONTH, "month"), false)
    } else {
        (secs / YEAR, plural(secs / YEAR, "year"), false)
    }
}

fn plural(n: i64, unit: &'static str) -> &'static str {
    match (n, unit) {
        (1, "minute") => "minute",
        (_, "minute") => "minutes",
        (1, "hour") => "hour",
        (_, "hour") => "hours",
        (1, "day") => "day",
        (_, "day") => "days",
        (1, "month") => "month",
        (_, "month") => "months",
        (1, "year") => "year",
        (_, "year") => "years",
        _ => unit,
    }
}

fn f_join(value: Value, args: &[String]) -> FormatResult {
    let sep = args.first().map(String::as_str).unwrap_or("");
    match value {
        Value::List(items) => Ok(Value::Str(
            items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(sep),
        )),
        other => Ok(Value::Str(other.to_display_string())),
    }
}

fn f_length(value: Value, _args: &[String]) -> FormatResult {
    let n = match &value {
        Value::List(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Record(rec) => rec.len(),
        _ => 0,
    };
    Ok(Value::Number(n as f64))
}

/// Coerces a list's elements to numbers, optionally reaching into each
/// element via `args`' first entry — a dotted `field` path (spec.md §4.E),
/// e.g. `${orders|sum:amount}` sums `item.amount` for each `item` in
/// `orders` rather than the (non-numeric) `Record` itself.
fn numeric_list(value: &Value, args: &[String]) -> Vec<f64> {
    let field = args.first().map(String::as_str);
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| match field {
                Some(path) => crate::scope::resolve_field_path(item.clone(), path).to_number(),
                None => item.to_number(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn f_sum(value: Value, args: &[String]) -> FormatResult {
    Ok(Value::Number(numeric_list(&value, args).iter().sum()))
}

fn f_count(value: Value, _args: &[String]) -> FormatResult {
    match &value {
        Value::List(items) => Ok(Value::Number(items.len() as f64)),
        _ => Ok(Value::Number(0.0)),
    }
}

fn f_avg(value: Value, args: &[String]) -> FormatResult {
    let nums = numeric_list(&value, args);
    if nums.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(nums.iter().sum::<f64>() / nums.len() as f64))
}

fn f_max(value: Value, args: &[String]) -> FormatResult {
    let nums = numeric_list(&value, args);
    Ok(Value::Number(nums.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

fn f_min(value: Value, args: &[String]) -> FormatResult {
    let nums = numeric_list(&value, args);
    Ok(Value::Number(nums.into_iter().fold(f64::INFINITY, f64::min)))
}

fn f_truncate(value: Value, args: &[String]) -> FormatResult {
    let s = value.to_display_string();
    let max_len: usize = args
        .first()
        .and_then(|a| a.parse().ok())
        .unwrap_or(s.chars().count());
    let ellipsis = args.get(1).map(String::as_str).unwrap_or("...");
    if s.chars().count() <= max_len {
        return Ok(Value::Str(s));
    }
    let truncated: String = s.chars().take(max_len).collect();
    Ok(Value::Str(format!("{truncated}{ellipsis}")))
}

fn f_default(value: Value, args: &[String]) -> FormatResult {
    let fallback = args.first().cloned().unwrap_or_default();
    if value.is_truthy() {
        Ok(value)
    } else {
        Ok(Value::Str(fallback))
    }
}

fn f_escape(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Str(dtx_xml::escape_xml(&value.to_display_string())))
}

fn f_bold(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Styled(Box::new(value), Styling::Bold))
}

fn f_italic(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Styled(Box::new(value), Styling::Italic))
}

fn f_underline(value: Value, _args: &[String]) -> FormatResult {
    Ok(Value::Styled(Box::new(value), Styling::Underline))
}

fn f_size(value: Value, args: &[String]) -> FormatResult {
    let pts: u32 = args
        .first()
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| FormatError {
            message: "size formatter requires a numeric point size argument".into(),
        })?;
    Ok(Value::Styled(Box::new(value), Styling::Size(pts)))
}

fn f_color(value: Value, args: &[String]) -> FormatResult {
    let hex = args.first().cloned().ok_or_else(|| FormatError {
        message: "color formatter requires a hex color argument".into(),
    })?;
    Ok(Value::Styled(Box::new(value), Styling::Color(hex)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_and_trim_compose() {
        let reg = FormatterRegistry::new();
        let v = reg
            .apply("trim", Value::Str("  hi  ".into()), &[])
            .unwrap();
        let v = reg.apply("upper", v, &[]).unwrap();
        assert_eq!(v, Value::Str("HI".into()));
    }

    #[test]
    fn currency_formats_with_symbol_and_grouping() {
        let reg = FormatterRegistry::new();
        let v = reg
            .apply("currency", Value::Number(1234.5), &["USD".into()])
            .unwrap();
        assert_eq!(v, Value::Str("$1,234.50".into()));
    }

    #[test]
    fn unknown_currency_code_falls_back_to_code_prefix() {
        let reg = FormatterRegistry::new();
        let v = reg
            .apply("currency", Value::Number(10.0), &["XYZ".into()])
            .unwrap();
        assert_eq!(v, Value::Str("XYZ 10.00".into()));
    }

    #[test]
    fn round_and_percent() {
        let reg = FormatterRegistry::new();
        assert_eq!(
            reg.apply("round", Value::Number(1.2345), &["2".into()]).unwrap(),
            Value::Number(1.23)
        );
        assert_eq!(
            reg.apply("percent", Value::Number(0.4567), &["1".into()])
                .unwrap(),
            Value::Str("45.7%".into())
        );
    }

    #[test]
    fn aggregate_formatters_over_lists() {
        let reg = FormatterRegistry::new();
        let list = Value::List(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(reg.apply("sum", list.clone(), &[]).unwrap(), Value::Number(6.0));
        assert_eq!(reg.apply("avg", list.clone(), &[]).unwrap(), Value::Number(2.0));
        assert_eq!(reg.apply("max", list.clone(), &[]).unwrap(), Value::Number(3.0));
        assert_eq!(reg.apply("min", list, &[]).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn aggregate_formatters_extract_a_field_path_from_records() {
        let reg = FormatterRegistry::new();
        let order = |amount: f64| {
            let mut rec = crate::value::Record::new();
            rec.insert("amount", Value::Number(amount));
            Value::Record(rec)
        };
        let orders = Value::List(vec![order(10.0), order(20.0), order(30.0)]);
        assert_eq!(
            reg.apply("sum", orders.clone(), &["amount".into()]).unwrap(),
            Value::Number(60.0)
        );
        assert_eq!(
            reg.apply("avg", orders, &["amount".into()]).unwrap(),
            Value::Number(20.0)
        );
    }

    #[test]
    fn date_formatting_translates_pattern_tokens() {
        let reg = FormatterRegistry::new();
        let v = reg
            .apply("date", Value::Str("2024-03-05T00:00:00Z".into()), &["YYYY/MM/DD".into()])
            .unwrap();
        assert_eq!(v, Value::Str("2024/03/05".into()));
    }

    #[test]
    fn unknown_formatter_is_an_error() {
        let reg = FormatterRegistry::new();
        assert!(reg.apply("frobnicate", Value::Null, &[]).is_err());
    }

    #[test]
    fn default_only_substitutes_on_falsy_values() {
        let reg = FormatterRegistry::new();
        assert_eq!(
            reg.apply("default", Value::Null, &["n/a".into()]).unwrap(),
            Value::Str("n/a".into())
        );
        assert_eq!(
            reg.apply("default", Value::Str("x".into()), &["n/a".into()])
                .unwrap(),
            Value::Str("x".into())
        );
    }

    #[test]
    fn styling_formatters_wrap_without_losing_value() {
        let reg = FormatterRegistry::new();
        let v = reg.apply("bold", Value::Str("hi".into()), &[]).unwrap();
        assert_eq!(v.strip_styling(), &Value::Str("hi".into()));
    }
}
