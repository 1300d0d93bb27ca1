use serde::{Deserialize, Serialize};

use super::{box_summary, decode, describe_country, BoxSummary, QueryFilter};
use crate::constants::*;
use crate::engine::{Accumulator, Expr, Filter, Pipeline, SortOrder};
use crate::error::Result;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryCount {
    /// Country name.
    pub country: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryAverage {
    pub country: Option<String>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySum {
    /// ISO alpha-3 code.
    pub country: Option<String>,
    pub sum: Option<f64>,
}

pub async fn country_box(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<BoxSummary> {
    box_summary(store, filter.matching(Vec::new()), ISO_COUNTRY_CODE).await
}

pub async fn country_treemap(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CountryCount>> {
    let pipeline = Pipeline::new()
        .filter(filter.matching(Vec::new()))
        .group(Expr::field(ISO_COUNTRY_CODE), [("COUNT", Accumulator::count())]);
    let pipeline = describe_country(pipeline, COUNTRY_NAME, &[("count", "COUNT")]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

async fn ranked_countries(
    store: &dyn DocumentStore,
    filter: &QueryFilter,
    order: SortOrder,
) -> Result<Vec<CountryAverage>> {
    let pipeline = Pipeline::new()
        .filter(filter.matching(Vec::new()))
        .group(Expr::field(ISO_COUNTRY_CODE), [("AVERAGE", Accumulator::avg(VALUE_EURO))])
        .sort_by("AVERAGE", order)
        .limit(TOP_N);
    let pipeline = describe_country(pipeline, COUNTRY_NAME, &[("avg", "AVERAGE")]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Countries with the highest average contract value.
pub async fn country_bar_1(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CountryAverage>> {
    ranked_countries(store, filter, SortOrder::Descending).await
}

/// Countries with the lowest average contract value.
pub async fn country_bar_2(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CountryAverage>> {
    ranked_countries(store, filter, SortOrder::Ascending).await
}

/// Total EU-funded contract value per country.
pub async fn country_map(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CountrySum>> {
    let pipeline = Pipeline::new()
        .filter(filter.matching(vec![Filter::eq(B_EU_FUNDS, EU_FUNDED)]))
        .group(Expr::field(ISO_COUNTRY_CODE), [("SUM", Accumulator::sum(VALUE_EURO))]);
    let pipeline = describe_country(pipeline, ALPHA_3, &[("sum", "SUM")]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}
