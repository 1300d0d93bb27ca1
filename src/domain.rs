//! Typed views of the stored documents.
//!
//! The ingestion chain works on raw [`Document`]s so unknown columns and
//! missing-vs-null survive untouched; these types are for callers that
//! build intake batches or read analytics records.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Document;
use crate::error::{AnalyticsError, Result};

/// A raw contract record as submitted to intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ContractRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_euro: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_value_euro: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_offers: Option<i64>,
    /// Numeric in the source exports, occasionally a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpv: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_country_code: Option<String>,
    #[serde(rename = "B_EU_FUNDS", skip_serializing_if = "Option::is_none")]
    pub b_eu_funds: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cae_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cae_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cae_town: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_name: Option<String>,
    #[serde(rename = "DT_DISPATCH", skip_serializing_if = "Option::is_none")]
    pub dt_dispatch: Option<String>,
    #[serde(rename = "DT_AWARD", skip_serializing_if = "Option::is_none")]
    pub dt_award: Option<String>,
}

impl ContractRecord {
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AnalyticsError::store(format!(
                "contract record serialized to non-object {other}"
            ))),
        }
    }
}

/// Extended-JSON date as persisted by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredDate {
    #[serde(rename = "$date")]
    pub millis: i64,
}

impl StoredDate {
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.millis).single()
    }
}

/// A published record in the analytics collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "VALUE_EURO", default)]
    pub value_euro: Option<f64>,
    #[serde(rename = "AWARD_VALUE_EURO", default)]
    pub award_value_euro: Option<f64>,
    #[serde(rename = "NUMBER_OFFERS", default)]
    pub number_offers: Option<f64>,
    #[serde(rename = "nCPV", default)]
    pub n_cpv: Option<Value>,
    #[serde(rename = "CPV", default)]
    pub cpv: Option<String>,
    #[serde(rename = "CPV_DIVISION")]
    pub cpv_division: String,
    #[serde(rename = "YEAR", default)]
    pub year: Option<i64>,
    #[serde(rename = "ISO_COUNTRY_CODE", default)]
    pub iso_country_code: Option<String>,
    #[serde(rename = "B_EU_FUNDS", default)]
    pub b_eu_funds: Option<String>,
    #[serde(rename = "CAE_NAME", default)]
    pub cae_name: Option<String>,
    #[serde(rename = "CAE_ADDRESS", default)]
    pub cae_address: Option<String>,
    #[serde(rename = "CAE_TOWN", default)]
    pub cae_town: Option<String>,
    #[serde(rename = "WIN_NAME", default)]
    pub win_name: Option<String>,
    #[serde(rename = "DT_DISPATCH", default)]
    pub dt_dispatch: Option<StoredDate>,
    #[serde(rename = "DT_AWARD", default)]
    pub dt_award: Option<StoredDate>,
    #[serde(rename = "ADDRESS", default)]
    pub address: Option<String>,
    #[serde(rename = "PAIR", default)]
    pub pair: Option<String>,
}

impl AnalyticsRecord {
    pub fn from_document(document: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document.clone()))?)
    }
}

/// Row of the `cpv` reference collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpvDivision {
    pub cpv_division: String,
    pub cpv_division_description: String,
}

/// Row of the `iso_codes` reference collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IsoCountry {
    pub name: String,
    #[serde(rename = "alpha-2")]
    pub alpha_2: String,
    #[serde(rename = "alpha-3")]
    pub alpha_3: String,
}
