use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::value::{format_date, Value};

/// Placeholder written by the `redact` builtin
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

const MASK_CHAR: char = '*';
const MASK_KEEP_LAST: usize = 4;

/// Names accepted by [`ValueTransform::Builtin`]
pub const BUILTIN_NAMES: &[&str] = &[
    "epochMillis",
    "isoDate",
    "lowercase",
    "uppercase",
    "trim",
    "string",
    "redact",
    "mask",
];

/// Errors raised by a value transform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("{transform} cannot be applied to a {found} value")]
    Unsupported {
        transform: &'static str,
        found: &'static str,
    },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("unknown builtin transform: {0}")]
    UnknownBuiltin(String),

    #[error("{0}")]
    Custom(String),
}

impl TransformError {
    pub fn custom(message: impl fmt::Display) -> Self {
        TransformError::Custom(message.to_string())
    }
}

pub type TransformFn = dyn Fn(&Value) -> Result<Value, TransformError> + Send + Sync;
pub type BuiltinFn = fn(&Value) -> Result<Value, TransformError>;

/// A per-key function replacing the value stored under that key
#[derive(Clone)]
pub enum ValueTransform {
    Func(Arc<TransformFn>),
    /// Looked up in the builtin catalogue when the rule fires
    Builtin(String),
    Replace { pattern: Regex, with: String },
}

impl ValueTransform {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        ValueTransform::Func(Arc::new(f))
    }

    /// Wrap an infallible mapping
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        ValueTransform::func(move |value| Ok(f(value)))
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        ValueTransform::Builtin(name.into())
    }

    pub fn replace(pattern: Regex, with: impl Into<String>) -> Self {
        ValueTransform::Replace {
            pattern,
            with: with.into(),
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value, TransformError> {
        match self {
            ValueTransform::Func(f) => f(value),
            ValueTransform::Builtin(name) => {
                let f = builtin(name).ok_or_else(|| TransformError::UnknownBuiltin(name.clone()))?;
                f(value)
            }
            ValueTransform::Replace { pattern, with } => match value {
                Value::String(s) => Ok(Value::String(
                    pattern.replace_all(s, with.as_str()).into_owned(),
                )),
                other => Err(TransformError::Unsupported {
                    transform: "replace",
                    found: other.type_name(),
                }),
            },
        }
    }
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTransform::Func(_) => f.write_str("Func"),
            ValueTransform::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            ValueTransform::Replace { pattern, with } => f
                .debug_struct("Replace")
                .field("pattern", &pattern.as_str())
                .field("with", with)
                .finish(),
        }
    }
}

/// Resolve a builtin transform by name
pub fn builtin(name: &str) -> Option<BuiltinFn> {
    let f: BuiltinFn = match name {
        "epochMillis" => epoch_millis,
        "isoDate" => iso_date,
        "lowercase" => lowercase,
        "uppercase" => uppercase,
        "trim" => trim,
        "string" => stringify,
        "redact" => redact,
        "mask" => mask,
        _ => return None,
    };
    Some(f)
}

/// Milliseconds since the Unix epoch for a date or date string
pub fn epoch_millis(value: &Value) -> Result<Value, TransformError> {
    match value {
        Value::Date(date) => Ok(Value::from(date.timestamp_millis())),
        Value::String(s) => parse_date(s).map(|date| Value::from(date.timestamp_millis())),
        Value::Number(_) => Ok(value.clone()),
        other => Err(TransformError::Unsupported {
            transform: "epochMillis",
            found: other.type_name(),
        }),
    }
}

pub fn iso_date(value: &Value) -> Result<Value, TransformError> {
    let date = match value {
        Value::Date(date) => *date,
        Value::String(s) => parse_date(s)?,
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| TransformError::InvalidDate(n.to_string()))?,
        other => {
            return Err(TransformError::Unsupported {
                transform: "isoDate",
                found: other.type_name(),
            })
        }
    };
    Ok(Value::String(format_date(&date)))
}

/// Parse the date renderings commonly found in stored documents.
///
/// Accepts RFC 3339, RFC 2822, plain `YYYY-MM-DD` (midnight UTC) and the
/// `Tue Apr 29 2014 16:52:39 GMT+0000 (UTC)` form.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, TransformError> {
    let trimmed = input.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(date.with_timezone(&Utc));
    }

    let without_zone_name = trimmed.find(" (").map_or(trimmed, |idx| &trimmed[..idx]);
    if let Ok(date) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Ok(date.with_timezone(&Utc));
    }

    if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    Err(TransformError::InvalidDate(input.to_string()))
}

fn lowercase(value: &Value) -> Result<Value, TransformError> {
    with_string("lowercase", value, |s| s.to_lowercase())
}

fn uppercase(value: &Value) -> Result<Value, TransformError> {
    with_string("uppercase", value, |s| s.to_uppercase())
}

fn trim(value: &Value) -> Result<Value, TransformError> {
    with_string("trim", value, |s| s.trim().to_string())
}

fn stringify(value: &Value) -> Result<Value, TransformError> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Date(date) => format_date(date),
        other => {
            return Err(TransformError::Unsupported {
                transform: "string",
                found: other.type_name(),
            })
        }
    };
    Ok(Value::String(s))
}

fn redact(_value: &Value) -> Result<Value, TransformError> {
    Ok(Value::from(REDACTED_PLACEHOLDER))
}

/// Keep the last four characters, mask the rest
fn mask(value: &Value) -> Result<Value, TransformError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(TransformError::Unsupported {
                transform: "mask",
                found: other.type_name(),
            })
        }
    };

    let len = text.chars().count();
    let masked = if len <= MASK_KEEP_LAST {
        MASK_CHAR.to_string().repeat(len)
    } else {
        text.chars()
            .enumerate()
            .map(|(i, c)| if i < len - MASK_KEEP_LAST { MASK_CHAR } else { c })
            .collect()
    };
    Ok(Value::String(masked))
}

fn with_string(
    transform: &'static str,
    value: &Value,
    f: impl Fn(&str) -> String,
) -> Result<Value, TransformError> {
    match value {
        Value::String(s) => Ok(Value::String(f(s))),
        other => Err(TransformError::Unsupported {
            transform,
            found: other.type_name(),
        }),
    }
}
