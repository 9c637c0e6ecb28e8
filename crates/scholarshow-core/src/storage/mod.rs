//! Object storage for note attachments.

mod r2;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

pub use r2::{R2Config, R2ObjectStore};

/// Binary object upload returning a publicly resolvable URL.
pub trait ObjectStore: Send + Sync + 'static {
    fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-process object store serving URLs under a fixed base.
#[derive(Clone)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::default(),
        }
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
        let path = path.trim().trim_matches('/');
        if path.is_empty() {
            return Err(Error::Invalid("Object path cannot be empty".to_string()));
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.map(ToOwned::to_owned),
                },
            );
        Ok(format!("{}/{path}", self.base_url))
    }
}

/// A store that may be unconfigured; uploads then fail as unavailable.
impl<T: ObjectStore> ObjectStore for Option<T> {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
        match self {
            Some(store) => store.put(path, bytes, content_type).await,
            None => Err(Error::Unavailable(
                "Attachment storage is not configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_keeps_bytes_and_returns_url() {
        let store = MemoryObjectStore::new("https://files.test/");
        let url = store
            .put("/attachments/u1/a.txt", b"hi".to_vec(), Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(url, "https://files.test/attachments/u1/a.txt");

        let object = store.object("attachments/u1/a.txt").unwrap();
        assert_eq!(object.bytes, b"hi");
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn memory_store_rejects_empty_path() {
        let store = MemoryObjectStore::new("https://files.test");
        assert!(matches!(
            store.put(" / ", Vec::new(), None).await,
            Err(Error::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_store_is_unavailable() {
        let store: Option<MemoryObjectStore> = None;
        assert!(matches!(
            store.put("a.txt", b"x".to_vec(), None).await,
            Err(Error::Unavailable(_))
        ));
    }
}
