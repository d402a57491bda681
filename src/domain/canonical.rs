use crate::utils::error::{Result, StudyError};
use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Bidirectional mapping between an entity and its canonical field map.
///
/// The canonical form is the single source of truth for persistence: the
/// tabular writer derives its header from `to_canonical` and the reader
/// feeds decoded rows back through `from_canonical`. Dates render as
/// ISO-8601 strings, enums as their declared string value, absent fields
/// as `Value::Null`, and owned collections recurse through the same
/// contract.
pub trait Canonical: Sized {
    fn to_canonical(&self) -> Map<String, Value>;

    /// Rebuilds an entity from a canonical map. Optional fields fall back
    /// to documented defaults; a missing identity field is a
    /// `MalformedRecord` error.
    fn from_canonical(map: &Map<String, Value>) -> Result<Self>;
}

pub(crate) fn malformed(resource: &str, detail: impl Into<String>) -> StudyError {
    StudyError::MalformedRecord {
        resource: resource.to_string(),
        detail: detail.into(),
    }
}

// Numeric-looking ids (e.g. a student id of "1") come back from the cell
// decoder as numbers, so string extraction accepts both.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn require_string(resource: &str, map: &Map<String, Value>, key: &str) -> Result<String> {
    map.get(key)
        .and_then(text_of)
        .ok_or_else(|| malformed(resource, format!("required field '{key}' is missing")))
}

pub(crate) fn optional_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(text_of)
}

pub(crate) fn optional_date(
    resource: &str,
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<NaiveDate>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                malformed(
                    resource,
                    format!("field '{key}' is not an ISO-8601 date: '{raw}'"),
                )
            }),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' has unexpected type: {other}"),
        )),
    }
}

pub(crate) fn optional_f64(
    resource: &str,
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' is not a number: {other}"),
        )),
    }
}

/// Missing or null numeric fields default to 0.
pub(crate) fn optional_u32(resource: &str, map: &Map<String, Value>, key: &str) -> Result<u32> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| malformed(resource, format!("field '{key}' is not a whole number"))),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' is not a number: {other}"),
        )),
    }
}

pub(crate) fn optional_bool(resource: &str, map: &Map<String, Value>, key: &str) -> Result<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' is not a boolean: {other}"),
        )),
    }
}

/// Rebuilds an owned collection; an absent or null column means the
/// collection is empty.
pub(crate) fn nested_list<T: Canonical>(
    resource: &str,
    map: &Map<String, Value>,
    key: &str,
) -> Result<Vec<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(obj) => T::from_canonical(obj),
                other => Err(malformed(
                    resource,
                    format!("entry in '{key}' is not an object: {other}"),
                )),
            })
            .collect(),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' is not a list: {other}"),
        )),
    }
}

pub(crate) fn nested_object<T: Canonical>(
    resource: &str,
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => T::from_canonical(obj).map(Some),
        Some(other) => Err(malformed(
            resource,
            format!("field '{key}' is not an object: {other}"),
        )),
    }
}

pub(crate) fn date_value(date: &Option<NaiveDate>) -> Value {
    match date {
        Some(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}
