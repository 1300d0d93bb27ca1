use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::batch::{IntakeBatch, StagedBatch};
use super::IngestStep;
use crate::config::IngestConfig;
use crate::constants::*;
use crate::engine::{run_pipeline, Expr, Filter, NoCollections, Pipeline, Projection};
use crate::error::Result;
use crate::store::DocumentStore;

/// Admits intake records by year, value and country, reshapes them and
/// writes them to the staging collection.
pub struct Normalizer {
    config: IngestConfig,
}

impl Normalizer {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn admission_filter(&self) -> Filter {
        Filter::and([
            Filter::gte(YEAR, self.config.min_year),
            Filter::lte(YEAR, self.config.max_year),
            Filter::lt(VALUE_EURO, self.config.value_ceiling),
            Filter::is_in(ISO_COUNTRY_CODE, self.config.admitted_countries()),
        ])
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new()
            .filter(self.admission_filter())
            .project(staged_projection())
    }
}

fn blank_if_null(path: &str) -> Expr {
    Expr::if_null(Expr::to_string(Expr::field(path)), Expr::literal(""))
}

fn staged_projection() -> Vec<(&'static str, Projection)> {
    vec![
        (ID, Projection::Exclude),
        (VALUE_EURO, Projection::Include),
        (NUMBER_OFFERS, Projection::Include),
        (N_CPV, Projection::Computed(Expr::field(CPV))),
        (CPV, Projection::Computed(Expr::to_string(Expr::field(CPV)))),
        (ISO_COUNTRY_CODE, Projection::Include),
        (YEAR, Projection::Include),
        (AWARD_VALUE_EURO, Projection::Include),
        (DT_DISPATCH, Projection::Computed(Expr::date_from_string(Expr::field(DT_DISPATCH)))),
        (DT_AWARD, Projection::Computed(Expr::date_from_string(Expr::field(DT_AWARD)))),
        (B_EU_FUNDS, Projection::Include),
        (CAE_NAME, Projection::Include),
        (CAE_ADDRESS, Projection::Include),
        (CAE_TOWN, Projection::Include),
        (WIN_NAME, Projection::Include),
        (
            ADDRESS,
            Projection::Computed(Expr::concat([
                blank_if_null(CAE_ADDRESS),
                Expr::literal(" "),
                blank_if_null(CAE_TOWN),
            ])),
        ),
        (
            PAIR,
            Projection::Computed(Expr::concat([
                blank_if_null(CAE_NAME),
                Expr::literal(" with "),
                blank_if_null(WIN_NAME),
            ])),
        ),
    ]
}

#[async_trait]
impl IngestStep for Normalizer {
    type Input = IntakeBatch;
    type Output = Option<StagedBatch>;

    #[instrument(skip_all, fields(records = batch.documents.len()))]
    async fn execute(&self, store: &dyn DocumentStore, batch: IntakeBatch) -> Result<Option<StagedBatch>> {
        let intake = batch.documents.len();
        let mut documents = run_pipeline(&self.pipeline(), batch.documents, &NoCollections)?;
        let rejected = intake - documents.len();

        if documents.is_empty() {
            info!("Normalizer admitted no records ({} rejected)", rejected);
            return Ok(None);
        }

        let ids = store.insert_many(STAGING_COLLECTION, &mut documents).await?;
        debug!("Staged {} records, rejected {}", ids.len(), rejected);
        Ok(Some(StagedBatch {
            ids,
            documents,
            rejected,
        }))
    }

    fn step_name(&self) -> &'static str {
        "normalize"
    }
}
