//! # mm-db-memory
//!
//! In-process implementation of `DocumentStore`.
//! Batches are staged against a snapshot of the touched records and only
//! written back when every operation succeeds.

use async_trait::async_trait;
use mm_core::document::{apply_write, Document, Filter, WriteOp};
use mm_core::error::{StoreError, StoreResult};
use mm_core::traits::DocumentStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

type Collection = BTreeMap<String, Document>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    /// Emulates backends that cap `In` filter sizes
    membership_limit: Option<usize>,
    /// When set, every call fails as if the network were down
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_membership_limit(limit: usize) -> Self {
        Self {
            membership_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Simulates losing connectivity to the backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::backend(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "memory store is offline",
            )));
        }
        Ok(())
    }

    fn check_query(&self, filters: &[Filter]) -> StoreResult<()> {
        let Some(limit) = self.membership_limit else {
            return Ok(());
        };
        for filter in filters {
            if let Filter::In(field, values) = filter {
                if values.len() > limit {
                    return Err(StoreError::InvalidQuery(format!(
                        "'{field}' membership filter has {} values, limit is {limit}",
                        values.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_record(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_online()?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<(String, Document)>> {
        self.ensure_online()?;
        self.check_query(filters)?;
        let collections = self.collections.lock().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn commit_batch(&self, writes: Vec<WriteOp>) -> StoreResult<()> {
        self.ensure_online()?;
        let mut collections = self.collections.lock().await;

        // Later ops in the batch see the results of earlier ones.
        let mut staged: HashMap<(String, String), Document> = HashMap::new();
        for op in writes {
            let (collection, id) = op.target();
            let key = (collection.to_string(), id.to_string());
            let current = match staged.get(&key) {
                Some(doc) => Some(doc.clone()),
                None => collections
                    .get(collection)
                    .and_then(|c| c.get(id))
                    .cloned(),
            };
            let next = apply_write(current, op)?;
            staged.insert(key, next);
        }

        let count = staged.len();
        for ((collection, id), doc) in staged {
            collections.entry(collection).or_default().insert(id, doc);
        }
        tracing::trace!(records = count, "memory batch committed");
        Ok(())
    }

    fn membership_limit(&self) -> Option<usize> {
        self.membership_limit
    }
}
