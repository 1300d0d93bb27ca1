use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::batch::{PatchedBatch, StagedBatch};
use super::IngestStep;
use crate::constants::{CPV, CPV_LEADING_ZERO_THRESHOLD, ISO_COUNTRY_CODE, N_CPV, STAGING_COLLECTION};
use crate::engine::value::as_number;
use crate::engine::Document;
use crate::error::{AnalyticsError, Result};
use crate::store::DocumentStore;

/// Restores leading zeros on short CPV codes and rewrites legacy country
/// codes, touching only the batch that was just staged.
pub struct Patcher {
    legacy_country_codes: BTreeMap<String, String>,
}

impl Patcher {
    pub fn new(legacy_country_codes: BTreeMap<String, String>) -> Self {
        Self {
            legacy_country_codes,
        }
    }

    /// Returns `true` when the CPV was prefixed.
    pub fn restore_leading_zero(document: &mut Document) -> bool {
        let short = document
            .get(N_CPV)
            .and_then(as_number)
            .is_some_and(|code| code < CPV_LEADING_ZERO_THRESHOLD as f64);
        if !short {
            return false;
        }
        match document.get_mut(CPV) {
            Some(Value::String(code)) => {
                code.insert(0, '0');
                true
            }
            _ => false,
        }
    }

    /// Returns `true` when the country code was rewritten.
    pub fn remap_country(&self, document: &mut Document) -> bool {
        let replacement = document
            .get(ISO_COUNTRY_CODE)
            .and_then(Value::as_str)
            .and_then(|code| self.legacy_country_codes.get(code));
        match replacement {
            Some(current) => {
                let current = current.clone();
                document.insert(ISO_COUNTRY_CODE.to_string(), Value::String(current));
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IngestStep for Patcher {
    type Input = StagedBatch;
    type Output = PatchedBatch;

    #[instrument(skip_all, fields(records = batch.documents.len()))]
    async fn execute(&self, store: &dyn DocumentStore, batch: StagedBatch) -> Result<PatchedBatch> {
        let mut documents = batch.documents;
        let mut leading_zeros = 0;
        let mut remapped_countries = 0;

        for document in documents.iter_mut() {
            if Self::restore_leading_zero(document) {
                leading_zeros += 1;
            }
            if self.remap_country(document) {
                remapped_countries += 1;
            }
        }

        let replaced = store.replace_many(STAGING_COLLECTION, documents.clone()).await?;
        if replaced != documents.len() {
            return Err(AnalyticsError::store(format!(
                "expected to update {} staged records, updated {}",
                documents.len(),
                replaced
            )));
        }
        debug!(
            "Patched staged batch: {} leading zeros, {} countries remapped",
            leading_zeros, remapped_countries
        );

        Ok(PatchedBatch {
            documents,
            leading_zeros,
            remapped_countries,
        })
    }

    fn step_name(&self) -> &'static str {
        "patch"
    }
}
