//! In-process aggregation engine.
//!
//! Evaluates a [`Pipeline`] of match/project/group/sort/limit/lookup/bucket/count
//! stages over JSON documents with document-database semantics: missing
//! fields group and sort as null, averages skip non-numeric values, and
//! lookups join against other collections through a [`CollectionSource`].

pub mod expr;
pub mod filter;
pub mod stage;
pub mod value;

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

pub use expr::Expr;
pub use filter::Filter;
pub use stage::{Accumulator, Bucket, Lookup, Pipeline, Projection, SortOrder, Stage};
pub use value::Document;

use crate::error::{AnalyticsError, Result};
use value::{as_number, compare_values, compact_number, float_value, group_key, lookup_path, values_equal};

/// Read access to named collections for `$lookup`.
pub trait CollectionSource {
    fn documents(&self, collection: &str) -> &[Document];
}

impl CollectionSource for HashMap<String, Vec<Document>> {
    fn documents(&self, collection: &str) -> &[Document] {
        self.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Source with no collections; lookups yield empty arrays.
pub struct NoCollections;

impl CollectionSource for NoCollections {
    fn documents(&self, _collection: &str) -> &[Document] {
        &[]
    }
}

pub fn run_pipeline(
    pipeline: &Pipeline,
    input: Vec<Document>,
    source: &dyn CollectionSource,
) -> Result<Vec<Document>> {
    let mut documents = input;
    for stage in pipeline.stages() {
        let before = documents.len();
        documents = apply_stage(stage, documents, source)?;
        trace!(stage = stage_name(stage), before, after = documents.len(), "applied stage");
    }
    Ok(documents)
}

fn stage_name(stage: &Stage) -> &'static str {
    match stage {
        Stage::Match(_) => "$match",
        Stage::Project(_) => "$project",
        Stage::Group { .. } => "$group",
        Stage::Sort(_) => "$sort",
        Stage::Limit(_) => "$limit",
        Stage::Lookup(_) => "$lookup",
        Stage::Bucket(_) => "$bucket",
        Stage::Count(_) => "$count",
    }
}

fn apply_stage(
    stage: &Stage,
    documents: Vec<Document>,
    source: &dyn CollectionSource,
) -> Result<Vec<Document>> {
    match stage {
        Stage::Match(filter) => Ok(documents
            .into_iter()
            .filter(|document| filter.matches(document))
            .collect()),
        Stage::Project(fields) => documents
            .iter()
            .map(|document| project(document, fields))
            .collect(),
        Stage::Group { id, fields } => group(documents, id, fields),
        Stage::Sort(keys) => Ok(sort(documents, keys)),
        Stage::Limit(count) => Ok(documents.into_iter().take(*count).collect()),
        Stage::Lookup(lookup) => Ok(join(documents, lookup, source)),
        Stage::Bucket(bucket) => bucketize(documents, bucket),
        Stage::Count(field) => Ok(if documents.is_empty() {
            Vec::new()
        } else {
            let mut counted = Document::new();
            counted.insert(field.clone(), Value::from(documents.len() as u64));
            vec![counted]
        }),
    }
}

fn project(document: &Document, fields: &[(String, Projection)]) -> Result<Document> {
    let exclusion_only = fields
        .iter()
        .filter(|(name, _)| name != "_id")
        .all(|(_, projection)| *projection == Projection::Exclude)
        && fields.iter().any(|(name, _)| name != "_id");

    if exclusion_only {
        let mut projected = document.clone();
        for (name, _) in fields {
            projected.remove(name);
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    match fields.iter().find(|(name, _)| name == "_id") {
        Some((_, Projection::Exclude)) => {}
        Some((_, Projection::Computed(expr))) => {
            if let Some(value) = expr.evaluate(document)? {
                projected.insert("_id".to_string(), value);
            }
        }
        Some((_, Projection::Include)) | None => {
            if let Some(id) = document.get("_id") {
                projected.insert("_id".to_string(), id.clone());
            }
        }
    }

    for (name, projection) in fields.iter().filter(|(name, _)| name != "_id") {
        match projection {
            Projection::Include => {
                if let Some(value) = lookup_path(document, name) {
                    projected.insert(name.clone(), value);
                }
            }
            Projection::Computed(expr) => {
                if let Some(value) = expr.evaluate(document)? {
                    projected.insert(name.clone(), value);
                }
            }
            Projection::Exclude => {
                return Err(AnalyticsError::aggregation(format!(
                    "cannot exclude '{name}' in an inclusion projection"
                )))
            }
        }
    }
    Ok(projected)
}

enum AccumulatorState {
    Avg { total: f64, count: u64 },
    Sum { integer: i64, float: f64, integral: bool },
    First(Option<Value>),
}

impl AccumulatorState {
    fn new(accumulator: &Accumulator) -> Self {
        match accumulator {
            Accumulator::Avg(_) => Self::Avg { total: 0.0, count: 0 },
            Accumulator::Sum(_) => Self::Sum {
                integer: 0,
                float: 0.0,
                integral: true,
            },
            Accumulator::First(_) => Self::First(None),
        }
    }

    fn update(&mut self, accumulator: &Accumulator, document: &Document) -> Result<()> {
        match (self, accumulator) {
            (Self::Avg { total, count }, Accumulator::Avg(expr)) => {
                if let Some(number) = expr.evaluate(document)?.as_ref().and_then(as_number) {
                    *total += number;
                    *count += 1;
                }
            }
            (Self::Sum { integer, float, integral }, Accumulator::Sum(expr)) => {
                if let Some(value) = expr.evaluate(document)? {
                    match (value.as_i64(), as_number(&value)) {
                        (Some(whole), _) if *integral => match integer.checked_add(whole) {
                            Some(next) => *integer = next,
                            None => {
                                *integral = false;
                                *float = *integer as f64 + whole as f64;
                            }
                        },
                        (_, Some(number)) => {
                            if *integral {
                                *integral = false;
                                *float = *integer as f64;
                            }
                            *float += number;
                        }
                        _ => {}
                    }
                }
            }
            (Self::First(slot), Accumulator::First(expr)) => {
                if slot.is_none() {
                    *slot = Some(expr.evaluate(document)?.unwrap_or(Value::Null));
                }
            }
            _ => return Err(AnalyticsError::aggregation("accumulator state mismatch")),
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { total, count } => float_value(total / count as f64),
            Self::Sum { integer, integral: true, .. } => Value::from(integer),
            Self::Sum { float, .. } => float_value(float),
            Self::First(value) => value.unwrap_or(Value::Null),
        }
    }
}

struct GroupState {
    id: Value,
    states: Vec<AccumulatorState>,
}

fn accumulate(
    groups: &mut Vec<GroupState>,
    index: &mut HashMap<String, usize>,
    id: Value,
    fields: &[(String, Accumulator)],
    document: &Document,
) -> Result<()> {
    let key = group_key(&id);
    let position = match index.get(&key) {
        Some(position) => *position,
        None => {
            groups.push(GroupState {
                id,
                states: fields.iter().map(|(_, acc)| AccumulatorState::new(acc)).collect(),
            });
            index.insert(key, groups.len() - 1);
            groups.len() - 1
        }
    };
    let group = &mut groups[position];
    for (state, (_, accumulator)) in group.states.iter_mut().zip(fields) {
        state.update(accumulator, document)?;
    }
    Ok(())
}

fn emit(group: GroupState, fields: &[(String, Accumulator)]) -> Document {
    let mut output = Document::new();
    output.insert("_id".to_string(), group.id);
    for (state, (name, _)) in group.states.into_iter().zip(fields) {
        output.insert(name.clone(), state.finish());
    }
    output
}

/// Groups are emitted in first-seen order.
fn group(documents: Vec<Document>, id: &Expr, fields: &[(String, Accumulator)]) -> Result<Vec<Document>> {
    let mut groups: Vec<GroupState> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for document in &documents {
        let key = id.evaluate(document)?.unwrap_or(Value::Null);
        accumulate(&mut groups, &mut index, key, fields, document)?;
    }

    Ok(groups.into_iter().map(|group| emit(group, fields)).collect())
}

fn sort(mut documents: Vec<Document>, keys: &[(String, SortOrder)]) -> Vec<Document> {
    documents.sort_by(|left, right| {
        keys.iter()
            .map(|(field, order)| {
                let a = lookup_path(left, field).unwrap_or(Value::Null);
                let b = lookup_path(right, field).unwrap_or(Value::Null);
                let ordering = compare_values(&a, &b);
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    documents
}

fn join(documents: Vec<Document>, lookup: &Lookup, source: &dyn CollectionSource) -> Vec<Document> {
    let foreign = source.documents(&lookup.from);
    documents
        .into_iter()
        .map(|mut document| {
            let local = lookup_path(&document, &lookup.local_field).unwrap_or(Value::Null);
            let matched: Vec<Value> = foreign
                .iter()
                .filter(|candidate| {
                    let remote =
                        lookup_path(candidate, &lookup.foreign_field).unwrap_or(Value::Null);
                    match &local {
                        Value::Array(items) => items.iter().any(|item| values_equal(item, &remote)),
                        single => values_equal(single, &remote),
                    }
                })
                .map(|candidate| Value::Object(candidate.clone()))
                .collect();
            document.insert(lookup.as_field.clone(), Value::Array(matched));
            document
        })
        .collect()
}

fn bucketize(documents: Vec<Document>, bucket: &Bucket) -> Result<Vec<Document>> {
    if bucket.boundaries.len() < 2 {
        return Err(AnalyticsError::aggregation("$bucket needs at least two boundaries"));
    }
    if bucket.boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(AnalyticsError::aggregation("$bucket boundaries must be ascending"));
    }
    let fields: Vec<(String, Accumulator)> = if bucket.output.is_empty() {
        vec![("count".to_string(), Accumulator::count())]
    } else {
        bucket.output.clone()
    };

    let mut slots: Vec<Option<GroupState>> = bucket.boundaries[..bucket.boundaries.len() - 1]
        .iter()
        .map(|_| None)
        .collect();
    let mut overflow: Option<GroupState> = None;

    for document in &documents {
        let value = bucket.group_by.evaluate(document)?.unwrap_or(Value::Null);
        let slot = as_number(&value).and_then(|number| {
            bucket
                .boundaries
                .windows(2)
                .position(|pair| pair[0] <= number && number < pair[1])
        });
        let target = match slot {
            Some(position) => &mut slots[position],
            None => {
                let default = bucket.default.clone().ok_or_else(|| {
                    AnalyticsError::aggregation(format!(
                        "$bucket value {value} falls outside the boundaries and no default is set"
                    ))
                })?;
                if overflow.is_none() {
                    overflow = Some(GroupState {
                        id: default,
                        states: fields.iter().map(|(_, acc)| AccumulatorState::new(acc)).collect(),
                    });
                }
                &mut overflow
            }
        };
        let state = target.get_or_insert_with(|| GroupState {
            id: Value::Null,
            states: fields.iter().map(|(_, acc)| AccumulatorState::new(acc)).collect(),
        });
        for (acc_state, (_, accumulator)) in state.states.iter_mut().zip(&fields) {
            acc_state.update(accumulator, document)?;
        }
    }

    let mut output = Vec::new();
    for (position, slot) in slots.into_iter().enumerate() {
        if let Some(mut state) = slot {
            state.id = compact_number(bucket.boundaries[position]);
            output.push(emit(state, &fields));
        }
    }
    if let Some(state) = overflow {
        output.push(emit(state, &fields));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|value| value.as_object().cloned().unwrap())
            .collect()
    }

    fn contracts() -> Vec<Document> {
        docs(vec![
            json!({"_id": "a", "CPV_DIVISION": "45", "VALUE_EURO": 100, "ISO_COUNTRY_CODE": "PT"}),
            json!({"_id": "b", "CPV_DIVISION": "45", "VALUE_EURO": 300, "ISO_COUNTRY_CODE": "ES"}),
            json!({"_id": "c", "CPV_DIVISION": "50", "VALUE_EURO": 50, "ISO_COUNTRY_CODE": "PT"}),
            json!({"_id": "d", "CPV_DIVISION": "33", "VALUE_EURO": "n/a", "ISO_COUNTRY_CODE": "PT"}),
        ])
    }

    #[test]
    fn group_averages_and_counts_in_first_seen_order() {
        let pipeline = Pipeline::new().group(
            Expr::field("CPV_DIVISION"),
            [
                ("AVERAGE_VALUE", Accumulator::avg("VALUE_EURO")),
                ("COUNT", Accumulator::count()),
            ],
        );
        let output = run_pipeline(&pipeline, contracts(), &NoCollections).unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(output[0]["_id"], json!("45"));
        assert_eq!(output[0]["AVERAGE_VALUE"], json!(200.0));
        assert_eq!(output[0]["COUNT"], json!(2));
        assert_eq!(output[2]["_id"], json!("33"));
        assert_eq!(output[2]["AVERAGE_VALUE"], Value::Null);
    }

    #[test]
    fn sort_and_limit_pick_the_top_groups() {
        let pipeline = Pipeline::new()
            .group(Expr::field("CPV_DIVISION"), [("AVG", Accumulator::avg("VALUE_EURO"))])
            .sort_by("AVG", SortOrder::Descending)
            .limit(2);
        let output = run_pipeline(&pipeline, contracts(), &NoCollections).unwrap();

        let ids: Vec<&Value> = output.iter().map(|doc| &doc["_id"]).collect();
        assert_eq!(ids, vec![&json!("45"), &json!("50")]);
    }

    #[test]
    fn lookup_attaches_matching_reference_documents() {
        let mut collections = HashMap::new();
        collections.insert(
            "cpv".to_string(),
            docs(vec![
                json!({"cpv_division": "45", "cpv_division_description": "Construction work"}),
                json!({"cpv_division": "50", "cpv_division_description": "Repair services"}),
            ]),
        );
        let pipeline = Pipeline::new()
            .group(Expr::field("CPV_DIVISION"), [("COUNT", Accumulator::count())])
            .lookup("cpv", "_id", "cpv_division", "CPV")
            .project([
                ("_id", Projection::Exclude),
                ("cpv", Projection::Computed(Expr::array_elem_at(Expr::field("CPV"), 0))),
                ("count", Projection::Computed(Expr::field("COUNT"))),
            ])
            .project([
                ("cpv", Projection::Computed(Expr::field("cpv.cpv_division_description"))),
                ("count", Projection::Include),
            ]);
        let output = run_pipeline(&pipeline, contracts(), &collections).unwrap();

        assert_eq!(Value::Object(output[0].clone()), json!({"cpv": "Construction work", "count": 2}));
        // No reference row for division 33: the field is omitted.
        assert_eq!(Value::Object(output[2].clone()), json!({"count": 1}));
    }

    #[test]
    fn bucket_uses_half_open_ranges_and_default() {
        let input = docs(vec![
            json!({"VALUE_EURO": 0}),
            json!({"VALUE_EURO": 99_999.9}),
            json!({"VALUE_EURO": 100_000}),
            json!({"VALUE_EURO": 5_000_000}),
        ]);
        let pipeline = Pipeline::new().bucket(Bucket {
            group_by: Expr::field("VALUE_EURO"),
            boundaries: vec![0.0, 100_000.0, 200_000.0],
            default: Some(json!(200_000)),
            output: vec![("count".to_string(), Accumulator::count())],
        });
        let output = run_pipeline(&pipeline, input, &NoCollections).unwrap();

        let rows: Vec<Value> = output.into_iter().map(Value::Object).collect();
        assert_eq!(
            rows,
            vec![
                json!({"_id": 0, "count": 2}),
                json!({"_id": 100_000, "count": 1}),
                json!({"_id": 200_000, "count": 1}),
            ]
        );
    }

    #[test]
    fn bucket_without_default_rejects_outliers() {
        let pipeline = Pipeline::new().bucket(Bucket {
            group_by: Expr::field("VALUE_EURO"),
            boundaries: vec![0.0, 10.0],
            default: None,
            output: Vec::new(),
        });
        let result = run_pipeline(&pipeline, docs(vec![json!({"VALUE_EURO": 11})]), &NoCollections);
        assert!(matches!(result, Err(AnalyticsError::Aggregation { .. })));
    }

    #[test]
    fn count_emits_nothing_for_empty_input() {
        let pipeline = Pipeline::new()
            .filter(Filter::eq("ISO_COUNTRY_CODE", "FR"))
            .count("result");
        assert!(run_pipeline(&pipeline, contracts(), &NoCollections).unwrap().is_empty());

        let pipeline = Pipeline::new().count("result");
        let output = run_pipeline(&pipeline, contracts(), &NoCollections).unwrap();
        assert_eq!(output[0]["result"], json!(4));
    }

    #[test]
    fn sum_stays_integral_until_a_float_appears() {
        let input = docs(vec![json!({"v": 1}), json!({"v": 2}), json!({"v": "x"})]);
        let pipeline = Pipeline::new().group(Expr::null(), [("S", Accumulator::sum("v"))]);
        let output = run_pipeline(&pipeline, input.clone(), &NoCollections).unwrap();
        assert_eq!(output[0]["S"], json!(3));

        let mut mixed = input;
        mixed.push(json!({"v": 0.5}).as_object().cloned().unwrap());
        let output = run_pipeline(&pipeline, mixed, &NoCollections).unwrap();
        assert_eq!(output[0]["S"], json!(3.5));
    }
}
