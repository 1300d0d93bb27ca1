use serde::{Deserialize, Serialize};

use super::{box_summary, decode, BoxSummary, QueryFilter};
use crate::constants::*;
use crate::engine::{Accumulator, Expr, Filter, Pipeline, Projection, SortOrder};
use crate::error::Result;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAverage {
    pub company: Option<String>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyCount {
    pub company: Option<String>,
    pub count: u64,
}

/// Biggest spender of one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyCountryLeader {
    /// ISO alpha-3 code.
    pub country: Option<String>,
    pub company: Option<String>,
    pub sum: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyPair {
    /// `"{CAE_NAME} with {WIN_NAME}"`
    pub companies: Option<String>,
    pub count: u64,
}

fn with_company(filter: &QueryFilter) -> Filter {
    filter.matching(vec![Filter::exists(CAE_NAME, true)])
}

fn company_projection(value: (&'static str, &'static str)) -> Vec<(&'static str, Projection)> {
    vec![
        (ID, Projection::Exclude),
        ("company", Projection::Computed(Expr::field(ID))),
        (value.0, Projection::Computed(Expr::field(value.1))),
    ]
}

pub async fn business_box(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<BoxSummary> {
    box_summary(store, with_company(filter), CAE_NAME).await
}

async fn ranked_companies(
    store: &dyn DocumentStore,
    filter: &QueryFilter,
    order: SortOrder,
) -> Result<Vec<CompanyAverage>> {
    let pipeline = Pipeline::new()
        .filter(with_company(filter))
        .group(Expr::field(CAE_NAME), [("AVERAGE", Accumulator::avg(VALUE_EURO))])
        .sort_by("AVERAGE", order)
        .limit(TOP_N)
        .project(company_projection(("avg", "AVERAGE")));
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Awarding entities with the highest average contract value.
pub async fn business_bar_1(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CompanyAverage>> {
    ranked_companies(store, filter, SortOrder::Descending).await
}

/// Awarding entities with the lowest average contract value.
pub async fn business_bar_2(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CompanyAverage>> {
    ranked_companies(store, filter, SortOrder::Ascending).await
}

/// Awarding entities with the most contracts.
pub async fn business_treemap(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CompanyCount>> {
    let pipeline = Pipeline::new()
        .filter(with_company(filter))
        .group(Expr::field(CAE_NAME), [("COUNT", Accumulator::count())])
        .sort_by("COUNT", SortOrder::Descending)
        .limit(TREEMAP_LIMIT)
        .project(company_projection(("count", "COUNT")));
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Per country, the awarding entity with the largest total contract value.
pub async fn business_map(
    store: &dyn DocumentStore,
    filter: &QueryFilter,
) -> Result<Vec<CompanyCountryLeader>> {
    let pipeline = Pipeline::new()
        .filter(with_company(filter))
        .group(
            Expr::object([
                (CAE_NAME, Expr::field(CAE_NAME)),
                ("COUNTRY", Expr::field(ISO_COUNTRY_CODE)),
            ]),
            [
                ("SUM", Accumulator::sum(VALUE_EURO)),
                (ADDRESS, Accumulator::first(ADDRESS)),
            ],
        )
        .sort_by("SUM", SortOrder::Descending)
        .group(
            Expr::field("_id.COUNTRY"),
            [
                ("VALUE", Accumulator::first("SUM")),
                ("COMPANY", Accumulator::first("_id.CAE_NAME")),
                (ADDRESS, Accumulator::first(ADDRESS)),
            ],
        )
        .lookup(ISO_CODES_COLLECTION, ID, ALPHA_2, "COUNTRY")
        .project([
            (ID, Projection::Exclude),
            ("country", Projection::Computed(Expr::array_elem_at(Expr::field("COUNTRY"), 0))),
            ("company", Projection::Computed(Expr::field("COMPANY"))),
            ("sum", Projection::Computed(Expr::field("VALUE"))),
            ("address", Projection::Computed(Expr::field(ADDRESS))),
        ])
        .project([
            ("country", Projection::Computed(Expr::field(format!("country.{ALPHA_3}")))),
            ("company", Projection::Include),
            ("sum", Projection::Include),
            ("address", Projection::Include),
        ]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Most frequent awarding-entity/winner pairs.
pub async fn business_connection(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CompanyPair>> {
    let pipeline = Pipeline::new()
        .filter(filter.matching(vec![
            Filter::exists(CAE_NAME, true),
            Filter::exists(WIN_NAME, true),
        ]))
        .group(Expr::field(PAIR), [("COUNT", Accumulator::count())])
        .sort_by("COUNT", SortOrder::Descending)
        .limit(TOP_N)
        .project([
            (ID, Projection::Exclude),
            ("companies", Projection::Computed(Expr::field(ID))),
            ("count", Projection::Computed(Expr::field("COUNT"))),
        ]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}
