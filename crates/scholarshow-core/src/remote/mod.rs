//! Remote state gateway and the document stores behind it.

mod gateway;
mod memory;
mod supabase;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::Result;

pub use gateway::{attachment_path, FileUpload, RemoteGateway};
pub use memory::MemoryDocumentStore;
pub use supabase::{SupabaseDocumentStore, SUPABASE_SCHEMA_SQL};

/// Collection holding one app state document per identity.
pub const APP_STATE_COLLECTION: &str = "app_state";
/// Collection holding shared items.
pub const SHARED_ITEMS_COLLECTION: &str = "shared_items";

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as returned by the store, with server-assigned timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: DocumentPath,
    pub fields: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Minimal document store the gateway is written against.
///
/// Implementations map transport failures to [`crate::Error::Unavailable`].
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch a document; `Ok(None)` when it does not exist.
    fn get(&self, path: &DocumentPath)
        -> impl Future<Output = Result<Option<StoredDocument>>> + Send;

    /// Upsert: create the document if absent, otherwise overwrite only the
    /// supplied top-level fields. The store stamps `updated_at` (and
    /// `created_at` on insert) from its own clock.
    fn merge(
        &self,
        path: &DocumentPath,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Insert a new document under a freshly generated id and return the id.
    fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, path: &DocumentPath) -> impl Future<Output = Result<()>> + Send;
}
