//! Field values and type-directed coercion
//!
//! External data (table entities, blob metadata strings, queue payloads)
//! arrives loosely typed. [`coerce`] converts it into the type a model
//! field declares and never fails: anything it cannot convert degrades to
//! the field's default. Malformed stored data therefore reconstructs into
//! a model with default values instead of aborting the read.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Date format used when a model declares none
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-time format used when a model declares none
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Declared type of a model field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// The field type this value carries, `None` for `Null`
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(FieldType::Text),
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Float(_) => Some(FieldType::Float),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Date(_) => Some(FieldType::Date),
            Value::DateTime(_) => Some(FieldType::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Render the value as a string, formatting dates with the given
    /// formats. Returns `None` for `Null` or an unusable format string.
    pub fn render(&self, date_format: &str, datetime_format: &str) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => format_checked(d.format(date_format)),
            Value::DateTime(dt) => format_checked(dt.format(datetime_format)),
        }
    }

    /// Convert a JSON value received from a payload
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Convert to JSON for a payload, dates rendered with the given formats
    pub fn to_json(&self, date_format: &str, datetime_format: &str) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(_) | Value::DateTime(_) => self
                .render(date_format, datetime_format)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format(DEFAULT_DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DEFAULT_DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed extraction of a field value
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_date()
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_datetime()
    }
}

/// Strings accepted as boolean true, compared case-insensitively
const TRUE_STRINGS: [&str; 4] = ["yes", "true", "t", "1"];

/// Convert `value` into `target`, falling back to `default` on any failure.
///
/// `format` is the strftime pattern for date targets, date-time targets and
/// for rendering a date value into text; `None` selects the ISO defaults.
/// Boolean targets only accept `yes`/`true`/`t`/`1` as true: every other
/// input, including an unrecognised string, coerces to `false` rather than
/// to the default.
pub fn coerce(value: &Value, target: FieldType, default: &Value, format: Option<&str>) -> Value {
    if value.field_type() == Some(target) {
        return value.clone();
    }

    let coerced = match target {
        FieldType::Date => match value {
            // a date-time carries a date
            Value::DateTime(dt) => Some(Value::Date(dt.date())),
            _ => {
                let format = format.unwrap_or(DEFAULT_DATE_FORMAT);
                value
                    .as_str()
                    .and_then(|s| NaiveDate::parse_from_str(s.trim(), format).ok())
                    .map(Value::Date)
            }
        },
        FieldType::DateTime => {
            let format = format.unwrap_or(DEFAULT_DATETIME_FORMAT);
            value
                .as_str()
                .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), format).ok())
                .map(Value::DateTime)
        }
        FieldType::Boolean => Some(Value::Boolean(boolean_from(value))),
        FieldType::Text => match value {
            Value::Date(_) => value.render(format.unwrap_or(DEFAULT_DATE_FORMAT), DEFAULT_DATETIME_FORMAT),
            Value::DateTime(_) => value.render(DEFAULT_DATE_FORMAT, format.unwrap_or(DEFAULT_DATETIME_FORMAT)),
            other => other.render(DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT),
        }
        .map(Value::Text),
        FieldType::Integer => match value {
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            Value::Float(f) => float_to_integer(*f),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
        .map(Value::Integer),
        FieldType::Float => match value {
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Integer(i) => Some(*i as f64),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
        .map(Value::Float),
    };

    coerced.unwrap_or_else(|| default.clone())
}

fn boolean_from(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Text(s) => {
            let lowered = s.to_lowercase();
            TRUE_STRINGS.contains(&lowered.as_str())
        }
        Value::Integer(i) => *i == 1,
        _ => false,
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn format_checked(item: impl fmt::Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", item).ok().map(|_| out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_type_is_returned_unchanged() {
        let value = Value::from("hello");
        assert_eq!(coerce(&value, FieldType::Text, &Value::from(""), None), value);

        let value = Value::from(42);
        assert_eq!(coerce(&value, FieldType::Integer, &Value::from(0), None), value);
    }

    #[test]
    fn test_boolean_coercion() {
        let default = Value::from(false);
        assert_eq!(coerce(&Value::from("yes"), FieldType::Boolean, &default, None), Value::from(true));
        assert_eq!(coerce(&Value::from("TRUE"), FieldType::Boolean, &default, None), Value::from(true));
        assert_eq!(coerce(&Value::from("t"), FieldType::Boolean, &default, None), Value::from(true));
        assert_eq!(coerce(&Value::from("1"), FieldType::Boolean, &default, None), Value::from(true));
        assert_eq!(coerce(&Value::from("no"), FieldType::Boolean, &default, None), Value::from(false));
        assert_eq!(coerce(&Value::from(1), FieldType::Boolean, &default, None), Value::from(true));

        // unrecognised input is false, not the default
        let default = Value::from(true);
        assert_eq!(coerce(&Value::from(false), FieldType::Boolean, &default, None), Value::from(false));
        assert_eq!(coerce(&Value::from("maybe"), FieldType::Boolean, &default, None), Value::from(false));
        assert_eq!(coerce(&Value::Null, FieldType::Boolean, &default, None), Value::from(false));
    }

    #[test]
    fn test_integer_coercion() {
        let default = Value::from(7);
        assert_eq!(coerce(&Value::from(" 12 "), FieldType::Integer, &default, None), Value::from(12));
        assert_eq!(coerce(&Value::from(3.9), FieldType::Integer, &default, None), Value::from(3));
        assert_eq!(coerce(&Value::from(true), FieldType::Integer, &default, None), Value::from(1));
        assert_eq!(coerce(&Value::from("1.5"), FieldType::Integer, &default, None), default);
        assert_eq!(coerce(&Value::from("abc"), FieldType::Integer, &default, None), default);
        assert_eq!(coerce(&Value::from(f64::NAN), FieldType::Integer, &default, None), default);
        assert_eq!(coerce(&Value::Null, FieldType::Integer, &default, None), default);
    }

    #[test]
    fn test_float_coercion() {
        let default = Value::from(0.5);
        assert_eq!(coerce(&Value::from("2.25"), FieldType::Float, &default, None), Value::from(2.25));
        assert_eq!(coerce(&Value::from(2), FieldType::Float, &default, None), Value::from(2.0));
        assert_eq!(coerce(&Value::from("x"), FieldType::Float, &default, None), default);
    }

    #[test]
    fn test_text_coercion() {
        let default = Value::from("");
        assert_eq!(coerce(&Value::from(5), FieldType::Text, &default, None), Value::from("5"));
        assert_eq!(coerce(&Value::from(true), FieldType::Text, &default, None), Value::from("true"));
        assert_eq!(
            coerce(&Value::from(date(2024, 3, 1)), FieldType::Text, &default, Some("%d.%m.%Y")),
            Value::from("01.03.2024")
        );
        assert_eq!(coerce(&Value::Null, FieldType::Text, &default, None), default);
    }

    #[test]
    fn test_date_coercion_with_format() {
        let default = Value::from(date(1900, 1, 1));
        assert_eq!(
            coerce(&Value::from("24.12.2023"), FieldType::Date, &default, Some("%d.%m.%Y")),
            Value::from(date(2023, 12, 24))
        );
        assert_eq!(
            coerce(&Value::from("2023-12-24"), FieldType::Date, &default, Some("%d.%m.%Y")),
            default
        );
        assert_eq!(
            coerce(&Value::from("2023-12-24"), FieldType::Date, &default, None),
            Value::from(date(2023, 12, 24))
        );
        assert_eq!(coerce(&Value::from(20231224), FieldType::Date, &default, None), default);

        let moment = date(2023, 12, 24).and_hms_opt(18, 30, 0).unwrap();
        assert_eq!(
            coerce(&Value::from(moment), FieldType::Date, &default, Some("%d.%m.%Y")),
            Value::from(date(2023, 12, 24))
        );
    }

    #[test]
    fn test_datetime_coercion_with_format() {
        let format = "%d.%m.%Y %H:%M:%S";
        let default = Value::from(date(1900, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        let expected = date(2021, 6, 30).and_hms_opt(13, 45, 10).unwrap();

        assert_eq!(
            coerce(&Value::from("30.06.2021 13:45:10"), FieldType::DateTime, &default, Some(format)),
            Value::from(expected)
        );
        assert_eq!(
            coerce(&Value::from("30.06.2021"), FieldType::DateTime, &default, Some(format)),
            default
        );
        assert_eq!(
            coerce(&Value::from(expected), FieldType::Text, &Value::from(""), Some(format)),
            Value::from("30.06.2021 13:45:10")
        );
    }

    #[test]
    fn test_invalid_format_string_degrades_to_default() {
        let default = Value::from("fallback");
        let value = Value::from(date(2024, 1, 1));
        assert_eq!(coerce(&value, FieldType::Text, &default, Some("%Q")), default);
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Value::from_json(&serde_json::json!(3)), Value::from(3));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::from(1.5));
        assert_eq!(Value::from_json(&serde_json::json!("x")), Value::from("x"));
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);

        let json = Value::from(date(2024, 2, 29)).to_json("%d.%m.%Y", DEFAULT_DATETIME_FORMAT);
        assert_eq!(json, serde_json::json!("29.02.2024"));
    }

    #[test]
    fn test_typed_extraction() {
        assert_eq!(String::from_value(&Value::from("a")), Some("a".to_string()));
        assert_eq!(i32::from_value(&Value::from(5)), Some(5));
        assert_eq!(i32::from_value(&Value::from(i64::MAX)), None);
        assert_eq!(bool::from_value(&Value::from("true")), None);
    }
}
