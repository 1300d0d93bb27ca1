pub mod config;
pub mod constants;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod queries;
pub mod reference;
pub mod store;

pub use config::Config;
pub use error::{AnalyticsError, Result};
pub use ingest::{IngestReport, Ingestor};
pub use queries::{AnalyticsQuery, QueryContext, QueryFilter};
pub use store::{DocumentId, DocumentStore, InMemoryStore};
