use serde_json::{Map, Value};

use super::value::{
    as_date_millis, as_number, compact_number, date_value, float_value, lookup_path,
    parse_date_string, stringify, type_class, Document, TypeClass,
};
use crate::error::{AnalyticsError, Result};

/// Aggregation expression evaluated against a single document.
///
/// `evaluate` returns `Ok(None)` when the expression resolves to a missing
/// value, which projections use to omit the output field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Value),
    Substr {
        input: Box<Expr>,
        start: usize,
        length: usize,
    },
    ToString(Box<Expr>),
    Concat(Vec<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    ArrayElemAt(Box<Expr>, i64),
    DateFromString(Box<Expr>),
    IfNull(Box<Expr>, Box<Expr>),
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn null() -> Self {
        Self::Literal(Value::Null)
    }

    pub fn substr(input: Expr, start: usize, length: usize) -> Self {
        Self::Substr {
            input: Box::new(input),
            start,
            length,
        }
    }

    pub fn to_string(input: Expr) -> Self {
        Self::ToString(Box::new(input))
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    pub fn subtract(left: Expr, right: Expr) -> Self {
        Self::Subtract(Box::new(left), Box::new(right))
    }

    pub fn array_elem_at(input: Expr, index: i64) -> Self {
        Self::ArrayElemAt(Box::new(input), index)
    }

    pub fn date_from_string(input: Expr) -> Self {
        Self::DateFromString(Box::new(input))
    }

    pub fn if_null(input: Expr, replacement: Expr) -> Self {
        Self::IfNull(Box::new(input), Box::new(replacement))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, expr)| (name.into(), expr))
                .collect(),
        )
    }

    pub fn evaluate(&self, document: &Document) -> Result<Option<Value>> {
        match self {
            Expr::Field(path) => Ok(lookup_path(document, path)),
            Expr::Literal(value) => Ok(Some(value.clone())),
            Expr::Substr {
                input,
                start,
                length,
            } => {
                let text = input
                    .evaluate(document)?
                    .and_then(|value| stringify(&value))
                    .unwrap_or_default();
                let slice: String = text.chars().skip(*start).take(*length).collect();
                Ok(Some(Value::String(slice)))
            }
            Expr::ToString(input) => match input.evaluate(document)? {
                None | Some(Value::Null) => Ok(Some(Value::Null)),
                Some(value) => stringify(&value)
                    .map(|text| Some(Value::String(text)))
                    .ok_or_else(|| {
                        AnalyticsError::aggregation(format!("cannot convert {value} to string"))
                    }),
            },
            Expr::Concat(parts) => {
                let mut joined = String::new();
                for part in parts {
                    match part.evaluate(document)? {
                        None | Some(Value::Null) => return Ok(Some(Value::Null)),
                        Some(Value::String(text)) => joined.push_str(&text),
                        Some(other) => {
                            return Err(AnalyticsError::aggregation(format!(
                                "$concat only supports strings, got {other}"
                            )))
                        }
                    }
                }
                Ok(Some(Value::String(joined)))
            }
            Expr::Subtract(left, right) => {
                let left = left.evaluate(document)?.unwrap_or(Value::Null);
                let right = right.evaluate(document)?.unwrap_or(Value::Null);
                subtract(&left, &right).map(Some)
            }
            Expr::ArrayElemAt(input, index) => match input.evaluate(document)? {
                None | Some(Value::Null) => Ok(Some(Value::Null)),
                Some(Value::Array(items)) => {
                    let position = if *index < 0 {
                        items.len() as i64 + index
                    } else {
                        *index
                    };
                    Ok(usize::try_from(position)
                        .ok()
                        .and_then(|position| items.get(position).cloned()))
                }
                Some(other) => Err(AnalyticsError::aggregation(format!(
                    "$arrayElemAt expects an array, got {other}"
                ))),
            },
            Expr::DateFromString(input) => match input.evaluate(document)? {
                None | Some(Value::Null) => Ok(Some(Value::Null)),
                Some(Value::String(raw)) => parse_date_string(&raw)
                    .map(|moment| Some(date_value(moment)))
                    .ok_or_else(|| AnalyticsError::InvalidDate {
                        field: input.describe(),
                        value: raw,
                    }),
                Some(other) => Err(AnalyticsError::InvalidDate {
                    field: input.describe(),
                    value: other.to_string(),
                }),
            },
            Expr::IfNull(input, replacement) => match input.evaluate(document)? {
                None | Some(Value::Null) => replacement.evaluate(document),
                present => Ok(present),
            },
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (name, expr) in fields {
                    if let Some(value) = expr.evaluate(document)? {
                        map.insert(name.clone(), value);
                    }
                }
                Ok(Some(Value::Object(map)))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Expr::Field(path) => path.clone(),
            other => format!("{other:?}"),
        }
    }
}

fn subtract(left: &Value, right: &Value) -> Result<Value> {
    match (type_class(left), type_class(right)) {
        (TypeClass::Null, _) | (_, TypeClass::Null) => Ok(Value::Null),
        (TypeClass::Date, TypeClass::Date) => {
            let (a, b) = (as_date_millis(left), as_date_millis(right));
            Ok(a.zip(b).map(|(a, b)| Value::from(a - b)).unwrap_or(Value::Null))
        }
        (TypeClass::Date, TypeClass::Number) => {
            let millis = as_date_millis(left).unwrap_or_default();
            let offset = as_number(right).unwrap_or_default() as i64;
            Ok(Value::Object(
                [("$date".to_string(), Value::from(millis - offset))]
                    .into_iter()
                    .collect(),
            ))
        }
        (TypeClass::Number, TypeClass::Number) => match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => Ok(a
                .checked_sub(b)
                .map(Value::from)
                .unwrap_or_else(|| float_value(a as f64 - b as f64))),
            _ => {
                let a = as_number(left).unwrap_or_default();
                let b = as_number(right).unwrap_or_default();
                Ok(compact_or_float(a - b, left, right))
            }
        },
        _ => Err(AnalyticsError::aggregation(format!(
            "cannot subtract {right} from {left}"
        ))),
    }
}

fn compact_or_float(result: f64, left: &Value, right: &Value) -> Value {
    if left.is_f64() || right.is_f64() {
        float_value(result)
    } else {
        compact_number(result)
    }
}
