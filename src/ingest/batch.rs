use serde::Serialize;

use crate::engine::Document;
use crate::store::DocumentId;

/// Records as written to the intake collection, with their assigned ids.
#[derive(Debug, Clone)]
pub struct IntakeBatch {
    pub ids: Vec<DocumentId>,
    pub documents: Vec<Document>,
}

/// Admitted records after projection, as stored in the staging collection.
#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub ids: Vec<DocumentId>,
    pub documents: Vec<Document>,
    pub rejected: usize,
}

/// Staged records after CPV and country fixes.
#[derive(Debug, Clone)]
pub struct PatchedBatch {
    pub documents: Vec<Document>,
    pub leading_zeros: usize,
    pub remapped_countries: usize,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub intake: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub leading_zeros: usize,
    pub remapped_countries: usize,
    /// `None` when nothing was admitted.
    pub analytics_ids: Option<Vec<DocumentId>>,
    pub duration_ms: u128,
}

impl IngestReport {
    pub fn published(&self) -> usize {
        self.analytics_ids.as_ref().map_or(0, Vec::len)
    }
}
