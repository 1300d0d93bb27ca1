//! Ingestion chain: intake → normalize → patch → publish.
//!
//! Each stage hands its batch to the next by value; nothing re-reads a
//! collection to find the records it just wrote.

mod batch;
mod normalize;
mod patch;
mod publish;

pub use batch::{IngestReport, IntakeBatch, PatchedBatch, StagedBatch};
pub use normalize::Normalizer;
pub use patch::Patcher;
pub use publish::Publisher;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, info_span, Instrument};

use crate::config::IngestConfig;
use crate::constants::INTAKE_COLLECTION;
use crate::domain::ContractRecord;
use crate::engine::Document;
use crate::error::Result;
use crate::reference::read_json_array;
use crate::metrics::IngestMetrics;
use crate::store::{DocumentId, DocumentStore};

/// One stage of the ingestion chain.
#[async_trait]
pub trait IngestStep: Send + Sync {
    type Input: Send + 'static;
    type Output: Send;

    async fn execute(&self, store: &dyn DocumentStore, input: Self::Input) -> Result<Self::Output>;

    fn step_name(&self) -> &'static str;
}

pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
    patcher: Patcher,
    publisher: Publisher,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, config: IngestConfig) -> Self {
        let patcher = Patcher::new(config.legacy_country_codes.clone());
        Self {
            store,
            normalizer: Normalizer::new(config),
            patcher,
            publisher: Publisher,
        }
    }

    /// Stores raw records and publishes the admitted ones. Returns the new
    /// analytics ids, or `None` when no record passed the filter.
    pub async fn insert_operation(&self, documents: Vec<Document>) -> Result<Option<Vec<DocumentId>>> {
        Ok(self.ingest(documents).await?.analytics_ids)
    }

    pub async fn insert_records(&self, records: &[ContractRecord]) -> Result<Option<Vec<DocumentId>>> {
        let documents = records
            .iter()
            .map(ContractRecord::to_document)
            .collect::<Result<Vec<_>>>()?;
        self.insert_operation(documents).await
    }

    /// Ingests a JSON array of contract records read from `path`.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<IngestReport> {
        let path = path.as_ref();
        let documents: Vec<Document> = read_json_array(path)?;
        self.ingest(documents)
            .instrument(info_span!("ingest_file", file = %path.display()))
            .await
    }

    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let span = info_span!("ingest", records = documents.len());
        let started = Instant::now();
        let result = self.run_chain(documents, started).instrument(span).await;
        if let Err(e) = &result {
            error!("Ingestion aborted: {}", e);
            IngestMetrics::record_failure();
        }
        result
    }

    async fn run_chain(&self, mut documents: Vec<Document>, started: Instant) -> Result<IngestReport> {
        let store = self.store.as_ref();
        let ids = store.insert_many(INTAKE_COLLECTION, &mut documents).await?;
        IngestMetrics::record_intake(ids.len());
        let mut report = IngestReport {
            intake: ids.len(),
            ..Default::default()
        };

        let intake = IntakeBatch { ids, documents };
        let Some(staged) = self.normalizer.execute(store, intake).await? else {
            report.rejected = report.intake;
            report.duration_ms = started.elapsed().as_millis();
            IngestMetrics::record_admitted(0, report.rejected);
            info!("{}: nothing admitted from {} records", self.normalizer.step_name(), report.intake);
            return Ok(report);
        };
        report.admitted = staged.ids.len();
        report.rejected = staged.rejected;
        IngestMetrics::record_admitted(report.admitted, report.rejected);

        let patched = self.patcher.execute(store, staged).await?;
        report.leading_zeros = patched.leading_zeros;
        report.remapped_countries = patched.remapped_countries;
        IngestMetrics::record_patched(report.leading_zeros, report.remapped_countries);

        let published = self.publisher.execute(store, patched).await?;
        report.duration_ms = started.elapsed().as_millis();
        IngestMetrics::record_published(published.len(), started.elapsed().as_secs_f64());
        info!(
            "Ingested {} records: {} admitted, {} rejected, {} published",
            report.intake,
            report.admitted,
            report.rejected,
            published.len()
        );
        report.analytics_ids = Some(published);
        Ok(report)
    }
}
