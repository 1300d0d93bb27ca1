use std::cmp::Ordering;

use serde_json::Value;

use super::value::{compare_values, lookup_path, type_class, values_equal, Document, TypeClass};

/// Query predicate used by `$match`-style stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Exists(String, bool),
}

impl Filter {
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Self::Exists(field.into(), present)
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(document)),
            Filter::Eq(field, expected) => equals(lookup_path(document, field).as_ref(), expected),
            Filter::Ne(field, expected) => !equals(lookup_path(document, field).as_ref(), expected),
            Filter::Gt(field, bound) => compares(document, field, bound, |o| o == Ordering::Greater),
            Filter::Gte(field, bound) => compares(document, field, bound, |o| o != Ordering::Less),
            Filter::Lt(field, bound) => compares(document, field, bound, |o| o == Ordering::Less),
            Filter::Lte(field, bound) => compares(document, field, bound, |o| o != Ordering::Greater),
            Filter::In(field, candidates) => {
                let actual = lookup_path(document, field);
                candidates
                    .iter()
                    .any(|candidate| equals(actual.as_ref(), candidate))
            }
            Filter::Exists(field, present) => lookup_path(document, field).is_some() == *present,
        }
    }
}

/// Equality with array membership; `null` also matches a missing field.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) if values_equal(value, expected) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, expected)),
        Some(_) => false,
    }
}

/// Range comparisons only match values of the same type class.
fn compares(document: &Document, field: &str, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |value: &Value| {
        type_class(value) == type_class(bound)
            && type_class(value) != TypeClass::Null
            && accept(compare_values(value, bound))
    };
    match lookup_path(document, field) {
        None => false,
        Some(Value::Array(items)) if type_class(bound) != TypeClass::Array => {
            items.iter().any(comparable)
        }
        Some(value) => comparable(&value),
    }
}
