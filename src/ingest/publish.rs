use async_trait::async_trait;
use tracing::{debug, instrument};

use super::batch::PatchedBatch;
use super::IngestStep;
use crate::constants::{ANALYTICS_COLLECTION, CPV, CPV_DIVISION, ID};
use crate::engine::{Document, Expr};
use crate::error::Result;
use crate::store::{DocumentId, DocumentStore};

/// Appends patched records to the analytics collection with their CPV division.
pub struct Publisher;

impl Publisher {
    pub fn division_expr() -> Expr {
        Expr::substr(Expr::field(CPV), 0, 2)
    }

    pub fn to_analytics(mut document: Document) -> Result<Document> {
        document.remove(ID);
        if let Some(division) = Self::division_expr().evaluate(&document)? {
            document.insert(CPV_DIVISION.to_string(), division);
        }
        Ok(document)
    }
}

#[async_trait]
impl IngestStep for Publisher {
    type Input = PatchedBatch;
    type Output = Vec<DocumentId>;

    #[instrument(skip_all, fields(records = batch.documents.len()))]
    async fn execute(&self, store: &dyn DocumentStore, batch: PatchedBatch) -> Result<Vec<DocumentId>> {
        let mut documents = batch
            .documents
            .into_iter()
            .map(Self::to_analytics)
            .collect::<Result<Vec<_>>>()?;
        let ids = store.insert_many(ANALYTICS_COLLECTION, &mut documents).await?;
        debug!("Published {} records to '{}'", ids.len(), ANALYTICS_COLLECTION);
        Ok(ids)
    }

    fn step_name(&self) -> &'static str {
        "publish"
    }
}
