//! Loads the lookup collections the queries join against.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::constants::{CPV_COLLECTION, ISO_CODES_COLLECTION};
use crate::domain::{CpvDivision, IsoCountry};
use crate::engine::Document;
use crate::error::{AnalyticsError, Result};
use crate::store::DocumentStore;

pub fn read_json_array<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn to_documents<T: Serialize>(rows: &[T]) -> Result<Vec<Document>> {
    rows.iter()
        .map(|row| match serde_json::to_value(row)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(AnalyticsError::store(format!("reference row is not an object: {other}"))),
        })
        .collect()
}

async fn replace_collection<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    rows: &[T],
) -> Result<usize> {
    let mut documents = to_documents(rows)?;
    store.drop_collection(collection).await?;
    let ids = store.insert_many(collection, &mut documents).await?;
    info!("Loaded {} rows into '{}'", ids.len(), collection);
    Ok(ids.len())
}

/// Replaces the `cpv` collection.
pub async fn load_cpv_divisions(store: &dyn DocumentStore, divisions: &[CpvDivision]) -> Result<usize> {
    replace_collection(store, CPV_COLLECTION, divisions).await
}

/// Replaces the `iso_codes` collection.
pub async fn load_iso_countries(store: &dyn DocumentStore, countries: &[IsoCountry]) -> Result<usize> {
    replace_collection(store, ISO_CODES_COLLECTION, countries).await
}
