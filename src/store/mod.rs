//! Document store abstraction.
//!
//! Collections are addressed by name and hold JSON documents keyed by
//! `_id`. Aggregations run through the in-process engine so every
//! store shares the same pipeline semantics.

mod in_memory;

pub use in_memory::InMemoryStore;

use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::ID;
use crate::engine::value::group_key;
use crate::engine::{Document, Pipeline};
use crate::error::Result;

/// The `_id` of a stored document. Store-assigned ids are UUID v4 strings;
/// ids supplied by the caller are kept as given and may be any non-array value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Value);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Value::String(Uuid::new_v4().to_string()))
    }

    /// `None` for arrays, which cannot identify a document.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(_) => None,
            other => Some(Self(other.clone())),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        self.0.as_str().and_then(|id| Uuid::parse_str(id).ok())
    }

    fn key(&self) -> String {
        group_key(&self.0)
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(Value::String(id.to_string()))
    }
}

impl PartialEq for DocumentId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DocumentId {}

impl Hash for DocumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(id) => f.write_str(id),
            other => write!(f, "{other}"),
        }
    }
}

/// Storage trait for contract collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends documents, assigning a fresh `_id` to each one that lacks it.
    /// The assigned ids are written back into `documents`.
    async fn insert_many(&self, collection: &str, documents: &mut [Document]) -> Result<Vec<DocumentId>>;

    /// Replaces stored documents that share an `_id` with the given ones.
    /// Returns how many were replaced.
    async fn replace_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize>;

    async fn find_by_ids(&self, collection: &str, ids: &[DocumentId]) -> Result<Vec<Document>>;

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Document>>;

    async fn count_documents(&self, collection: &str) -> Result<usize>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;
}

pub fn document_id(document: &Document) -> Option<DocumentId> {
    document.get(ID).and_then(DocumentId::from_value)
}
