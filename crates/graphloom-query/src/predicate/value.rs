//! Literal normalization.
//!
//! Wire values are checked against the attribute type and brought into a
//! canonical form before they become parameters: integers stay integers,
//! temporal strings are parsed and re-serialized, points become maps.

use crate::schema::{AttributeKind, AttributeType, ScalarKind, SchemaModel};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+W)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$")
        .expect("duration pattern is valid")
});

/// Normalize one element value of `kind`
pub fn normalize_scalar(model: &SchemaModel, kind: &AttributeKind, value: &Value) -> Result<Value, String> {
    match kind {
        AttributeKind::Enum(name) => {
            let text = value.as_str().ok_or_else(|| format!("expected a {} value", name))?;
            let known = model
                .enum_type(name)
                .is_some_and(|e| e.values.iter().any(|v| v == text));
            if known {
                Ok(Value::String(text.to_string()))
            } else {
                Err(format!("'{}' is not a value of {}", text, name))
            }
        }
        AttributeKind::Scalar(kind) => normalize_kind(*kind, value),
    }
}

/// Normalize a full attribute value, list or single
pub fn normalize(model: &SchemaModel, ty: &AttributeType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if ty.list {
        return normalize_list(model, &ty.kind, value);
    }
    normalize_scalar(model, &ty.kind, value)
}

/// Normalize every element of a list operand
pub fn normalize_list(model: &SchemaModel, kind: &AttributeKind, value: &Value) -> Result<Value, String> {
    let items = value.as_array().ok_or("expected a list")?;
    items
        .iter()
        .map(|item| normalize_scalar(model, kind, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn normalize_kind(kind: ScalarKind, value: &Value) -> Result<Value, String> {
    let text = || value.as_str().ok_or_else(|| format!("expected a {} string", kind.name()));
    match kind {
        ScalarKind::Id => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err("expected an ID".to_string()),
        },
        ScalarKind::String => text().map(|s| Value::String(s.to_string())),
        ScalarKind::Int => integer(value).map(Value::from),
        ScalarKind::BigInt => match value {
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{}' is not a BigInt", s)),
            other => integer(other).map(Value::from),
        },
        ScalarKind::Float => value
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "expected a number".to_string()),
        ScalarKind::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "expected a boolean".to_string()),
        ScalarKind::DateTime => {
            let s = text()?;
            DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .map_err(|e| format!("invalid DateTime '{}': {}", s, e))
        }
        ScalarKind::LocalDateTime => {
            let s = text()?;
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                .map_err(|e| format!("invalid LocalDateTime '{}': {}", s, e))
        }
        ScalarKind::Date => {
            let s = text()?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|e| format!("invalid Date '{}': {}", s, e))
        }
        ScalarKind::Time => {
            let s = text()?;
            DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", s))
                .map(|_| Value::String(s.to_string()))
                .map_err(|e| format!("invalid Time '{}': {}", s, e))
        }
        ScalarKind::LocalTime => {
            let s = text()?;
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))
                .map_err(|e| format!("invalid LocalTime '{}': {}", s, e))
        }
        ScalarKind::Duration => {
            let s = text()?;
            if s.len() > 1 && !s.ends_with('T') && DURATION_RE.is_match(s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(format!("invalid Duration '{}'", s))
            }
        }
        ScalarKind::Point => point(value, &["longitude", "latitude"], "height"),
        ScalarKind::CartesianPoint => point(value, &["x", "y"], "z"),
    }
}

fn integer(value: &Value) -> Result<i64, String> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err("expected an integer".to_string()),
    }
}

fn point(value: &Value, required: &[&str], optional: &str) -> Result<Value, String> {
    let map = value.as_object().ok_or("expected a point object")?;
    let mut out = Map::new();
    for key in required {
        let n = map
            .get(*key)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("point is missing numeric '{}'", key))?;
        out.insert(key.to_string(), Value::from(n));
    }
    if let Some(v) = map.get(optional) {
        let n = v
            .as_f64()
            .ok_or_else(|| format!("point '{}' must be numeric", optional))?;
        out.insert(optional.to_string(), Value::from(n));
    }
    for key in map.keys() {
        if !required.contains(&key.as_str()) && key != optional && key != "crs" && key != "srid" {
            return Err(format!("unexpected point field '{}'", key));
        }
    }
    Ok(Value::Object(out))
}

/// Wrap a parameter reference so the store sees its native type
pub fn wrap(kind: &AttributeKind, expr: &str) -> String {
    match kind {
        AttributeKind::Scalar(k) => match k.constructor() {
            Some(func) => format!("{}({})", func, expr),
            None => expr.to_string(),
        },
        AttributeKind::Enum(_) => expr.to_string(),
    }
}

/// Wrap every element of a list parameter; `item` is a fresh variable
pub fn wrap_list(kind: &AttributeKind, expr: &str, item: &str) -> String {
    match kind {
        AttributeKind::Scalar(k) => match k.constructor() {
            Some(func) => format!("[{} IN {} | {}({})]", item, expr, func, item),
            None => expr.to_string(),
        },
        AttributeKind::Enum(_) => expr.to_string(),
    }
}

/// True when list elements need per-item construction
pub fn needs_wrap(kind: &AttributeKind) -> bool {
    matches!(kind, AttributeKind::Scalar(k) if k.constructor().is_some())
}
