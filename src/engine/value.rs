//! Value helpers for JSON documents.
//!
//! Documents are plain `serde_json` objects. Dates use the extended-JSON
//! shape `{"$date": <epoch millis>}` so they survive snapshots and can be
//! told apart from ordinary objects when comparing or subtracting.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};

/// A stored document.
pub type Document = Map<String, Value>;

const DATE_KEY: &str = "$date";
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Type classes in comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeClass {
    Null,
    Number,
    String,
    Object,
    Array,
    Bool,
    Date,
}

pub fn type_class(value: &Value) -> TypeClass {
    match value {
        Value::Null => TypeClass::Null,
        Value::Number(_) => TypeClass::Number,
        Value::String(_) => TypeClass::String,
        Value::Array(_) => TypeClass::Array,
        Value::Bool(_) => TypeClass::Bool,
        Value::Object(_) if as_date_millis(value).is_some() => TypeClass::Date,
        Value::Object(_) => TypeClass::Object,
    }
}

pub fn date_value(moment: DateTime<Utc>) -> Value {
    let mut map = Map::new();
    map.insert(DATE_KEY.to_string(), Value::from(moment.timestamp_millis()));
    Value::Object(map)
}

pub fn as_date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(DATE_KEY).and_then(Value::as_i64),
        _ => None,
    }
}

pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    as_date_millis(value).and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

/// Numeric view of a value; dates and numeric-looking strings are not numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

/// Integral values become JSON integers, everything else a JSON float.
pub fn compact_number(number: f64) -> Value {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < MAX_SAFE_INTEGER {
        Value::from(number as i64)
    } else {
        float_value(number)
    }
}

pub fn float_value(number: f64) -> Value {
    Number::from_f64(number)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Parses the date layouts found in contract exports.
pub fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(moment.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// String form used by `$toString`. Returns `None` for values with no
/// string representation (objects, arrays).
pub fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(format_number(number)),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Object(_) => as_date(value).map(|moment| moment.to_rfc3339()),
        Value::Null | Value::Array(_) => None,
    }
}

fn format_number(number: &Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    if let Some(unsigned) = number.as_u64() {
        return unsigned.to_string();
    }
    let float = number.as_f64().unwrap_or_default();
    if float.fract() == 0.0 && float.abs() < MAX_SAFE_INTEGER {
        (float as i64).to_string()
    } else {
        float.to_string()
    }
}

/// Resolves a dotted path. Traversing an array collects the sub-field from
/// every element that has it.
pub fn lookup_path(document: &Document, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?.clone();
    for segment in segments {
        current = descend(&current, segment)?;
    }
    Some(current)
}

fn descend(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) if as_date_millis(value).is_none() => map.get(key).cloned(),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| descend(item, key)).collect(),
        )),
        _ => None,
    }
}

/// Total order across type classes: null < numbers < strings < objects
/// < arrays < booleans < dates.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let (left_class, right_class) = (type_class(left), type_class(right));
    if left_class != right_class {
        return left_class.cmp(&right_class);
    }
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(a), Value::Object(b)) if left_class == TypeClass::Date => {
            as_date_millis(left).cmp(&as_date_millis(right)).then(a.len().cmp(&b.len()))
        }
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .zip(b.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => Ordering::Equal,
    }
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    type_class(left) == type_class(right) && compare_values(left, right) == Ordering::Equal
}

/// Canonical grouping key: `1` and `1.0` land in the same group.
pub fn group_key(value: &Value) -> String {
    canonical(value).to_string()
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|_| number.is_f64())
            .map(compact_number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), canonical(item)))
                .collect(),
        ),
        _ => value.clone(),
    }
}
