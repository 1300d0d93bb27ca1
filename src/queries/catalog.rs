use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::*;
use crate::constants::{DEFAULT_HISTOGRAM_DIVISION, DEFAULT_VALUE_CEILING};
use crate::error::{AnalyticsError, Result};
use crate::metrics::QueryMetrics;
use crate::store::DocumentStore;

/// Parameters shared by every catalog query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub filter: QueryFilter,
    /// Division used by the histogram query.
    pub cpv_division: String,
    /// Ceiling used by the count query.
    pub value_ceiling: f64,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self {
            filter: QueryFilter::default(),
            cpv_division: DEFAULT_HISTOGRAM_DIVISION.to_string(),
            value_ceiling: DEFAULT_VALUE_CEILING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsQuery {
    CountExample,
    CpvBox,
    CpvTreemap,
    CpvBar1,
    CpvBar2,
    CpvBar3,
    CpvBar4,
    CpvMap,
    CpvHist,
    CpvBarDiff,
    CountryBox,
    CountryTreemap,
    CountryBar1,
    CountryBar2,
    CountryMap,
    BusinessBox,
    BusinessBar1,
    BusinessBar2,
    BusinessTreemap,
    BusinessMap,
    BusinessConnection,
}

impl AnalyticsQuery {
    pub fn all() -> &'static [AnalyticsQuery] {
        use AnalyticsQuery::*;
        &[
            CountExample,
            CpvBox,
            CpvTreemap,
            CpvBar1,
            CpvBar2,
            CpvBar3,
            CpvBar4,
            CpvMap,
            CpvHist,
            CpvBarDiff,
            CountryBox,
            CountryTreemap,
            CountryBar1,
            CountryBar2,
            CountryMap,
            BusinessBox,
            BusinessBar1,
            BusinessBar2,
            BusinessTreemap,
            BusinessMap,
            BusinessConnection,
        ]
    }

    /// Short id, `ex0` through `ex20`.
    pub fn id(self) -> String {
        let position = Self::all().iter().position(|query| *query == self).unwrap_or_default();
        format!("ex{position}")
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CountExample => "count_example",
            Self::CpvBox => "cpv_box",
            Self::CpvTreemap => "cpv_treemap",
            Self::CpvBar1 => "cpv_bar_1",
            Self::CpvBar2 => "cpv_bar_2",
            Self::CpvBar3 => "cpv_bar_3",
            Self::CpvBar4 => "cpv_bar_4",
            Self::CpvMap => "cpv_map",
            Self::CpvHist => "cpv_hist",
            Self::CpvBarDiff => "cpv_bar_diff",
            Self::CountryBox => "country_box",
            Self::CountryTreemap => "country_treemap",
            Self::CountryBar1 => "country_bar_1",
            Self::CountryBar2 => "country_bar_2",
            Self::CountryMap => "country_map",
            Self::BusinessBox => "business_box",
            Self::BusinessBar1 => "business_bar_1",
            Self::BusinessBar2 => "business_bar_2",
            Self::BusinessTreemap => "business_treemap",
            Self::BusinessMap => "business_map",
            Self::BusinessConnection => "business_connection",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::CountExample => "Contracts in the year range below the value ceiling",
            Self::CpvBox => "Averages over CPV divisions: value, count, offers, EU funded, not EU funded",
            Self::CpvTreemap => "Contract count per CPV division",
            Self::CpvBar1 => "Top 5 CPV divisions by average value",
            Self::CpvBar2 => "Bottom 5 CPV divisions by average value",
            Self::CpvBar3 => "Top 5 CPV divisions by average value, EU funded",
            Self::CpvBar4 => "Top 5 CPV divisions by average value, not EU funded",
            Self::CpvMap => "Highest-averaging CPV division per country",
            Self::CpvHist => "Value histogram for one CPV division",
            Self::CpvBarDiff => "Top 5 CPV divisions by average dispatch delay, with value difference",
            Self::CountryBox => "Averages over countries: value, count, offers, EU funded, not EU funded",
            Self::CountryTreemap => "Contract count per country",
            Self::CountryBar1 => "Top 5 countries by average value",
            Self::CountryBar2 => "Bottom 5 countries by average value",
            Self::CountryMap => "EU-funded contract value per country",
            Self::BusinessBox => "Averages over awarding entities: value, count, offers, EU funded, not EU funded",
            Self::BusinessBar1 => "Top 5 awarding entities by average value",
            Self::BusinessBar2 => "Bottom 5 awarding entities by average value",
            Self::BusinessTreemap => "Top 15 awarding entities by contract count",
            Self::BusinessMap => "Awarding entity with the largest total value per country",
            Self::BusinessConnection => "Top 5 awarding entity and winner pairs",
        }
    }

    /// Accepts either the short id (`ex3`) or the name (`cpv_bar_1`).
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|query| query.name() == wanted || query.id() == wanted)
            .ok_or_else(|| AnalyticsError::UnknownQuery(name.to_string()))
    }

    #[instrument(skip_all, fields(query = self.name()))]
    pub async fn execute(self, store: &dyn DocumentStore, context: &QueryContext) -> Result<Value> {
        let started = Instant::now();
        match self.dispatch(store, context).await {
            Ok(value) => {
                let rows = value.as_array().map_or(1, Vec::len);
                QueryMetrics::record_success(self.name(), started.elapsed().as_secs_f64(), rows);
                debug!("{} returned {} rows", self.name(), rows);
                Ok(value)
            }
            Err(e) => {
                QueryMetrics::record_error(self.name());
                Err(e)
            }
        }
    }

    async fn dispatch(self, store: &dyn DocumentStore, context: &QueryContext) -> Result<Value> {
        let filter = &context.filter;
        match self {
            Self::CountExample => to_json(count_example(store, filter, context.value_ceiling).await?),
            Self::CpvBox => to_json(cpv_box(store, filter).await?),
            Self::CpvTreemap => to_json(cpv_treemap(store, filter).await?),
            Self::CpvBar1 => to_json(cpv_bar_1(store, filter).await?),
            Self::CpvBar2 => to_json(cpv_bar_2(store, filter).await?),
            Self::CpvBar3 => to_json(cpv_bar_3(store, filter).await?),
            Self::CpvBar4 => to_json(cpv_bar_4(store, filter).await?),
            Self::CpvMap => to_json(cpv_map(store, filter).await?),
            Self::CpvHist => to_json(cpv_hist(store, filter, &context.cpv_division).await?),
            Self::CpvBarDiff => to_json(cpv_bar_diff(store, filter).await?),
            Self::CountryBox => to_json(country_box(store, filter).await?),
            Self::CountryTreemap => to_json(country_treemap(store, filter).await?),
            Self::CountryBar1 => to_json(country_bar_1(store, filter).await?),
            Self::CountryBar2 => to_json(country_bar_2(store, filter).await?),
            Self::CountryMap => to_json(country_map(store, filter).await?),
            Self::BusinessBox => to_json(business_box(store, filter).await?),
            Self::BusinessBar1 => to_json(business_bar_1(store, filter).await?),
            Self::BusinessBar2 => to_json(business_bar_2(store, filter).await?),
            Self::BusinessTreemap => to_json(business_treemap(store, filter).await?),
            Self::BusinessMap => to_json(business_map(store, filter).await?),
            Self::BusinessConnection => to_json(business_connection(store, filter).await?),
        }
    }
}

impl fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

fn to_json<T: Serialize>(result: T) -> Result<Value> {
    Ok(serde_json::to_value(result)?)
}
