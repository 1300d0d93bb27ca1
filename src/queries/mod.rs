//! Dashboard queries over the analytics collection.
//!
//! Every query takes a [`QueryFilter`] (year range plus country list) and
//! returns a typed result. Ranked lists are enriched with descriptions and
//! country names from the `cpv` and `iso_codes` reference collections.

mod business;
mod catalog;
mod country;
mod cpv;

pub use business::*;
pub use catalog::{AnalyticsQuery, QueryContext};
pub use country::*;
pub use cpv::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::constants::*;
use crate::engine::{Accumulator, Document, Expr, Filter, Pipeline, Projection};
use crate::error::{AnalyticsError, Result};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub min_year: i64,
    pub max_year: i64,
    pub countries: Vec<String>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for QueryFilter {
    fn from(config: &QueryConfig) -> Self {
        Self {
            min_year: config.min_year,
            max_year: config.max_year,
            countries: config.countries.clone(),
        }
    }
}

impl QueryFilter {
    pub fn new(min_year: i64, max_year: i64, countries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            min_year,
            max_year,
            countries: countries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn years(&self) -> Filter {
        Filter::and([
            Filter::gte(YEAR, self.min_year),
            Filter::lte(YEAR, self.max_year),
        ])
    }

    /// Year range and country membership, plus any extra conditions.
    pub fn matching(&self, extra: Vec<Filter>) -> Filter {
        let mut filters = vec![
            self.years(),
            Filter::is_in(ISO_COUNTRY_CODE, self.countries.clone()),
        ];
        filters.extend(extra);
        Filter::and(filters)
    }
}

/// Five averages over the groups of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxSummary {
    /// Mean of the per-group average `VALUE_EURO`.
    pub avg_value: Option<i64>,
    /// Mean number of contracts per group.
    pub avg_count: Option<i64>,
    /// Mean of the per-group average `NUMBER_OFFERS`.
    pub avg_offers: Option<i64>,
    pub avg_value_eu_funded: Option<i64>,
    pub avg_value_not_eu_funded: Option<i64>,
}

/// Contracts in the year range below the value ceiling.
pub async fn count_example(
    store: &dyn DocumentStore,
    filter: &QueryFilter,
    value_ceiling: f64,
) -> Result<Option<u64>> {
    let pipeline = Pipeline::new()
        .filter(Filter::and([filter.years(), Filter::lt(VALUE_EURO, value_ceiling)]))
        .count("result");
    let output = store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?;
    Ok(output.first().and_then(|row| row.get("result")).and_then(Value::as_u64))
}

pub(crate) async fn box_summary(
    store: &dyn DocumentStore,
    base: Filter,
    group_field: &str,
) -> Result<BoxSummary> {
    let eu_funded = Filter::eq(B_EU_FUNDS, EU_FUNDED);
    let not_eu_funded = Filter::eq(B_EU_FUNDS, NOT_EU_FUNDED);

    Ok(BoxSummary {
        avg_value: average_of_groups(store, &base, None, group_field, Accumulator::avg(VALUE_EURO)).await?,
        avg_count: average_of_groups(store, &base, None, group_field, Accumulator::count()).await?,
        avg_offers: average_of_groups(store, &base, None, group_field, Accumulator::avg(NUMBER_OFFERS)).await?,
        avg_value_eu_funded: average_of_groups(
            store,
            &base,
            Some(eu_funded),
            group_field,
            Accumulator::avg(VALUE_EURO),
        )
        .await?,
        avg_value_not_eu_funded: average_of_groups(
            store,
            &base,
            Some(not_eu_funded),
            group_field,
            Accumulator::avg(VALUE_EURO),
        )
        .await?,
    })
}

/// Groups by `group_field`, applies `per_group`, then averages across groups.
/// The result is truncated toward zero.
async fn average_of_groups(
    store: &dyn DocumentStore,
    base: &Filter,
    extra: Option<Filter>,
    group_field: &str,
    per_group: Accumulator,
) -> Result<Option<i64>> {
    let mut pipeline = Pipeline::new().filter(base.clone());
    if let Some(extra) = extra {
        pipeline = pipeline.filter(extra);
    }
    let pipeline = pipeline
        .group(Expr::field(group_field), [("PER_GROUP", per_group)])
        .group(Expr::null(), [("AVERAGE", Accumulator::avg("PER_GROUP"))]);

    let output = store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?;
    Ok(output
        .first()
        .and_then(|row| row.get("AVERAGE"))
        .and_then(Value::as_f64)
        .map(|average| average.trunc() as i64))
}

/// Appends the `cpv` lookup and flattens the description into `cpv`.
/// `carried` maps output names to the fields they are read from.
pub(crate) fn describe_cpv(pipeline: Pipeline, local_field: &str, carried: &[(&str, &str)]) -> Pipeline {
    describe(pipeline, CPV_COLLECTION, local_field, CPV_DIVISION_KEY, "cpv", CPV_DIVISION_DESCRIPTION, carried)
}

/// Appends the `iso_codes` lookup and flattens `country_field` into `country`.
pub(crate) fn describe_country(
    pipeline: Pipeline,
    country_field: &str,
    carried: &[(&str, &str)],
) -> Pipeline {
    describe(pipeline, ISO_CODES_COLLECTION, ID, ALPHA_2, "country", country_field, carried)
}

fn describe(
    pipeline: Pipeline,
    from: &str,
    local_field: &str,
    foreign_field: &str,
    output: &str,
    reference_field: &str,
    carried: &[(&str, &str)],
) -> Pipeline {
    let joined = "JOINED";
    let mut first = vec![
        (ID.to_string(), Projection::Exclude),
        (
            output.to_string(),
            Projection::Computed(Expr::array_elem_at(Expr::field(joined), 0)),
        ),
    ];
    first.extend(
        carried
            .iter()
            .map(|(name, source)| (name.to_string(), Projection::Computed(Expr::field(*source)))),
    );

    let mut second = vec![(
        output.to_string(),
        Projection::Computed(Expr::field(format!("{output}.{reference_field}"))),
    )];
    second.extend(carried.iter().map(|(name, _)| (name.to_string(), Projection::Include)));

    pipeline
        .lookup(from, local_field, foreign_field, joined)
        .project(first)
        .project(second)
}

pub(crate) fn decode<T: DeserializeOwned>(documents: Vec<Document>) -> Result<Vec<T>> {
    documents
        .into_iter()
        .map(|document| serde_json::from_value(Value::Object(document)).map_err(AnalyticsError::from))
        .collect()
}
