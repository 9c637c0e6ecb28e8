//! In-process document store, used by tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentPath, DocumentStore, StoredDocument};
use crate::error::{Error, Result};

#[derive(Default)]
struct Inner {
    documents: Mutex<HashMap<DocumentPath, StoredDocument>>,
    offline: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// Thread-safe map of documents with call counters.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the connection to the backend.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of `merge`/`create`/`delete` calls served so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Store raw fields directly, bypassing the merge rules.
    pub fn insert_raw(&self, path: DocumentPath, fields: Map<String, Value>) {
        let now = Utc::now();
        if let Ok(mut documents) = self.inner.documents.lock() {
            documents.insert(
                path.clone(),
                StoredDocument {
                    path,
                    fields,
                    created_at: Some(now),
                    updated_at: Some(now),
                },
            );
        }
    }

    fn ensure_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("document store is offline".to_string()));
        }
        Ok(())
    }

    fn documents(&self) -> Result<std::sync::MutexGuard<'_, HashMap<DocumentPath, StoredDocument>>> {
        self.inner
            .documents
            .lock()
            .map_err(|_| Error::Remote("memory document store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<StoredDocument>> {
        self.ensure_online()?;
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents()?.get(path).cloned())
    }

    async fn merge(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()> {
        self.ensure_online()?;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let mut documents = self.documents()?;
        let document = documents
            .entry(path.clone())
            .or_insert_with(|| StoredDocument {
                path: path.clone(),
                fields: Map::new(),
                created_at: Some(now),
                updated_at: None,
            });
        document.fields.extend(fields);
        document.updated_at = Some(now);
        Ok(())
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> Result<String> {
        self.ensure_online()?;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let id = Uuid::now_v7().simple().to_string();
        let now = Utc::now();
        let path = DocumentPath::new(collection, id.clone());
        self.documents()?.insert(
            path.clone(),
            StoredDocument {
                path,
                fields,
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
        Ok(id)
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.ensure_online()?;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.documents()?.remove(path);
        Ok(())
    }
}
