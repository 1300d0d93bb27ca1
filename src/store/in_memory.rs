use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use super::{document_id, DocumentId, DocumentStore};
use crate::constants::ID;
use crate::engine::{run_pipeline, Document, Pipeline};
use crate::error::{AnalyticsError, Result};

type Collections = HashMap<String, Vec<Document>>;

/// In-memory document store, optionally persisted as a JSON snapshot.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<Collections>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| AnalyticsError::store("collection lock poisoned"))
    }

    /// Loads a snapshot written by [`InMemoryStore::save_snapshot`]. A
    /// missing file yields an empty store.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let collections: Collections = serde_json::from_str(&raw)?;
        let total: usize = collections.values().map(Vec::len).sum();
        info!(
            "Loaded snapshot {} ({} collections, {} documents)",
            path.display(),
            collections.len(),
            total
        );
        Ok(Self {
            collections: Arc::new(Mutex::new(collections)),
        })
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let ordered: BTreeMap<String, Vec<Document>> = self
            .lock()?
            .iter()
            .map(|(name, documents)| (name.clone(), documents.clone()))
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&ordered)?)?;
        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_many(&self, collection: &str, documents: &mut [Document]) -> Result<Vec<DocumentId>> {
        let mut collections = self.lock()?;
        let stored = collections.entry(collection.to_string()).or_default();
        let mut taken: HashSet<DocumentId> = stored.iter().filter_map(document_id).collect();

        let mut ids = Vec::with_capacity(documents.len());
        for document in documents.iter_mut() {
            let id = match document.get(ID) {
                None => DocumentId::generate(),
                Some(existing) => DocumentId::from_value(existing).ok_or_else(|| {
                    AnalyticsError::store(format!("invalid _id {existing} in '{collection}'"))
                })?,
            };
            if !taken.insert(id.clone()) {
                return Err(AnalyticsError::store(format!(
                    "duplicate _id {id} in '{collection}'"
                )));
            }
            document.insert(ID.to_string(), id.as_value().clone());
            ids.push(id);
        }
        stored.extend(documents.iter().cloned());

        debug!("Inserted {} documents into '{}'", ids.len(), collection);
        Ok(ids)
    }

    async fn replace_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        let mut collections = self.lock()?;
        let Some(stored) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut replacements: HashMap<DocumentId, Document> = HashMap::new();
        for document in documents {
            let id = document_id(&document)
                .ok_or_else(|| AnalyticsError::store("replacement document has no valid _id"))?;
            replacements.insert(id, document);
        }

        let mut replaced = 0;
        for slot in stored.iter_mut() {
            if let Some(replacement) = document_id(slot).and_then(|id| replacements.remove(&id)) {
                *slot = replacement;
                replaced += 1;
            }
        }
        debug!("Replaced {} documents in '{}'", replaced, collection);
        Ok(replaced)
    }

    async fn find_by_ids(&self, collection: &str, ids: &[DocumentId]) -> Result<Vec<Document>> {
        let wanted: HashSet<&DocumentId> = ids.iter().collect();
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|document| document_id(document).is_some_and(|id| wanted.contains(&id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let collections = self.lock()?;
        let input = collections.get(collection).cloned().unwrap_or_default();
        run_pipeline(pipeline, input, &*collections)
    }

    async fn count_documents(&self, collection: &str) -> Result<usize> {
        Ok(self.lock()?.get(collection).map_or(0, Vec::len))
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        if self.lock()?.remove(collection).is_some() {
            debug!("Dropped collection '{}'", collection);
        }
        Ok(())
    }
}
