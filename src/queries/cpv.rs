use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{box_summary, decode, describe_cpv, BoxSummary, QueryFilter};
use crate::constants::*;
use crate::engine::{Accumulator, Bucket, Expr, Filter, Pipeline, Projection, SortOrder};
use crate::error::Result;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpvCount {
    pub cpv: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpvAverage {
    pub cpv: Option<String>,
    pub avg: Option<f64>,
}

/// Highest-averaging division of one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpvCountryLeader {
    /// ISO alpha-3 code.
    pub country: Option<String>,
    pub cpv: Option<String>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Lower bound of the bucket; the overflow bucket uses the last boundary.
    pub bucket: i64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpvDifference {
    pub cpv: Option<String>,
    /// Average `DT_DISPATCH - DT_AWARD`, in milliseconds.
    pub time_difference: Option<f64>,
    /// Average `AWARD_VALUE_EURO - VALUE_EURO`.
    pub value_difference: Option<f64>,
}

fn with_cpv(filter: &QueryFilter, extra: Vec<Filter>) -> Filter {
    let mut conditions = vec![Filter::ne(CPV, Value::Null)];
    conditions.extend(extra);
    filter.matching(conditions)
}

pub async fn cpv_box(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<BoxSummary> {
    box_summary(store, with_cpv(filter, Vec::new()), CPV_DIVISION).await
}

pub async fn cpv_treemap(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvCount>> {
    let pipeline = Pipeline::new()
        .filter(with_cpv(filter, Vec::new()))
        .group(Expr::field(CPV_DIVISION), [("COUNT", Accumulator::count())]);
    let pipeline = describe_cpv(pipeline, ID, &[("count", "COUNT")]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

async fn ranked_by_average(
    store: &dyn DocumentStore,
    base: Filter,
    order: SortOrder,
) -> Result<Vec<CpvAverage>> {
    let pipeline = Pipeline::new()
        .filter(base)
        .group(Expr::field(CPV_DIVISION), [("AVERAGE_VALUE", Accumulator::avg(VALUE_EURO))])
        .sort_by("AVERAGE_VALUE", order)
        .limit(TOP_N);
    let pipeline = describe_cpv(pipeline, ID, &[("avg", "AVERAGE_VALUE")]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Top divisions by average value.
pub async fn cpv_bar_1(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvAverage>> {
    ranked_by_average(store, with_cpv(filter, Vec::new()), SortOrder::Descending).await
}

/// Bottom divisions by average value.
pub async fn cpv_bar_2(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvAverage>> {
    ranked_by_average(store, with_cpv(filter, Vec::new()), SortOrder::Ascending).await
}

/// Top divisions by average value among EU-funded contracts.
pub async fn cpv_bar_3(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvAverage>> {
    let base = with_cpv(filter, vec![Filter::eq(B_EU_FUNDS, EU_FUNDED)]);
    ranked_by_average(store, base, SortOrder::Descending).await
}

/// Top divisions by average value among contracts without EU funds.
pub async fn cpv_bar_4(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvAverage>> {
    let base = with_cpv(filter, vec![Filter::eq(B_EU_FUNDS, NOT_EU_FUNDED)]);
    ranked_by_average(store, base, SortOrder::Descending).await
}

pub async fn cpv_map(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvCountryLeader>> {
    let pipeline = Pipeline::new()
        .filter(with_cpv(filter, Vec::new()))
        .group(
            Expr::object([
                (CPV_DIVISION, Expr::field(CPV_DIVISION)),
                ("COUNTRY", Expr::field(ISO_COUNTRY_CODE)),
            ]),
            [("AVERAGE_VALUE", Accumulator::avg(VALUE_EURO))],
        )
        .sort_by("AVERAGE_VALUE", SortOrder::Descending)
        .group(
            Expr::field("_id.COUNTRY"),
            [
                ("VALUE", Accumulator::first("AVERAGE_VALUE")),
                ("CPV", Accumulator::first("_id.CPV_DIVISION")),
            ],
        )
        .lookup(ISO_CODES_COLLECTION, ID, ALPHA_2, "COUNTRY")
        .lookup(CPV_COLLECTION, "CPV", CPV_DIVISION_KEY, "CPV")
        .project([
            (ID, Projection::Exclude),
            ("country", Projection::Computed(Expr::array_elem_at(Expr::field("COUNTRY"), 0))),
            ("cpv", Projection::Computed(Expr::array_elem_at(Expr::field("CPV"), 0))),
            ("avg", Projection::Computed(Expr::field("VALUE"))),
        ])
        .project([
            ("country", Projection::Computed(Expr::field(format!("country.{ALPHA_3}")))),
            ("cpv", Projection::Computed(Expr::field(format!("cpv.{CPV_DIVISION_DESCRIPTION}")))),
            ("avg", Projection::Include),
        ]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Value histogram for one division: ten 100 000-wide buckets from zero
/// plus an overflow bucket.
pub async fn cpv_hist(
    store: &dyn DocumentStore,
    filter: &QueryFilter,
    division: &str,
) -> Result<Vec<HistogramBucket>> {
    let pipeline = Pipeline::new()
        .filter(filter.matching(vec![Filter::eq(CPV_DIVISION, division)]))
        .bucket(Bucket {
            group_by: Expr::field(VALUE_EURO),
            boundaries: histogram_boundaries(),
            default: Some(Value::from(HISTOGRAM_OVERFLOW_BUCKET)),
            output: vec![("count".to_string(), Accumulator::count())],
        })
        .project([
            (ID, Projection::Exclude),
            ("bucket", Projection::Computed(Expr::field(ID))),
            ("count", Projection::Include),
        ]);
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}

/// Divisions with the longest average award-to-dispatch time.
pub async fn cpv_bar_diff(store: &dyn DocumentStore, filter: &QueryFilter) -> Result<Vec<CpvDifference>> {
    let base = with_cpv(
        filter,
        vec![
            Filter::exists(AWARD_VALUE_EURO, true),
            Filter::ne(DT_DISPATCH, Value::Null),
            Filter::ne(DT_AWARD, Value::Null),
        ],
    );
    let pipeline = Pipeline::new()
        .filter(base)
        .project([
            (ID, Projection::Exclude),
            (CPV_DIVISION, Projection::Include),
            (
                "TIME_DIFFERENCE",
                Projection::Computed(Expr::subtract(Expr::field(DT_DISPATCH), Expr::field(DT_AWARD))),
            ),
            (
                "VALUE_DIFFERENCE",
                Projection::Computed(Expr::subtract(
                    Expr::field(AWARD_VALUE_EURO),
                    Expr::field(VALUE_EURO),
                )),
            ),
        ])
        .group(
            Expr::field(CPV_DIVISION),
            [
                ("AVG_TIME_DIFFERENCE", Accumulator::avg("TIME_DIFFERENCE")),
                ("AVG_VALUE_DIFFERENCE", Accumulator::avg("VALUE_DIFFERENCE")),
            ],
        )
        .sort_by("AVG_TIME_DIFFERENCE", SortOrder::Descending)
        .limit(TOP_N);
    let pipeline = describe_cpv(
        pipeline,
        ID,
        &[
            ("time_difference", "AVG_TIME_DIFFERENCE"),
            ("value_difference", "AVG_VALUE_DIFFERENCE"),
        ],
    );
    decode(store.aggregate(ANALYTICS_COLLECTION, &pipeline).await?)
}
