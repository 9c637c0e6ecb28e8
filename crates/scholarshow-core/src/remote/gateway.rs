//! Remote state gateway.
//!
//! Every rule about remote data lives here, independent of the backend:
//! merge-upserts of the per-identity app state, ownership checks on shared
//! items, legacy content normalization, and attachment path building.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{DocumentPath, DocumentStore, APP_STATE_COLLECTION, SHARED_ITEMS_COLLECTION};
use crate::error::{Error, Result};
use crate::models::{Attachment, RemoteAppState, ShareContent, ShareId, ShareItem};
use crate::storage::ObjectStore;
use crate::util::{sanitize_file_name, unix_millis_now};

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Asynchronous access to remote app state, shared items and attachments.
pub struct RemoteGateway<D, O> {
    documents: Arc<D>,
    objects: Arc<O>,
}

impl<D, O> Clone for RemoteGateway<D, O> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            objects: Arc::clone(&self.objects),
        }
    }
}

impl<D: DocumentStore, O: ObjectStore> RemoteGateway<D, O> {
    pub fn new(documents: D, objects: O) -> Self {
        Self {
            documents: Arc::new(documents),
            objects: Arc::new(objects),
        }
    }

    /// The document store behind this gateway.
    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Load the app state document for `uid`; `Ok(None)` if never saved.
    pub async fn load_state(&self, uid: &str) -> Result<Option<RemoteAppState>> {
        let path = app_state_path(uid)?;
        let document = self.documents.get(&path).await?;
        Ok(document.map(|document| RemoteAppState::from_fields(&document.fields, document.updated_at)))
    }

    /// Merge-upsert the supplied fields into the app state document.
    ///
    /// A caller-supplied `updatedAt` is dropped; the backend stamps it.
    pub async fn save_state(&self, uid: &str, mut fields: Map<String, Value>) -> Result<()> {
        let path = app_state_path(uid)?;
        fields.remove("updatedAt");
        self.documents.merge(&path, fields).await?;
        tracing::debug!("Saved app state for {}", uid);
        Ok(())
    }

    /// Create a shared item owned by `owner_uid` and return its new ID.
    pub async fn create_share_item(
        &self,
        owner_uid: &str,
        content: &ShareContent,
    ) -> Result<ShareId> {
        let owner_uid = require_uid(owner_uid)?;
        let id = self
            .documents
            .create(
                SHARED_ITEMS_COLLECTION,
                ShareItem::creation_fields(owner_uid, content),
            )
            .await?;
        tracing::info!("Created shared {} {}", content.kind(), id);
        ShareId::parse(&id)
    }

    /// Fetch a shared item; `Ok(None)` when it does not exist or is empty.
    pub async fn get_share_item(&self, id: &ShareId) -> Result<Option<ShareItem>> {
        let document = self.documents.get(&share_path(id)).await?;
        Ok(document.and_then(|document| {
            ShareItem::from_fields(
                id.clone(),
                &document.fields,
                document.created_at,
                document.updated_at,
            )
        }))
    }

    /// Replace the content of a shared item owned by `owner_uid`.
    pub async fn update_share_item(
        &self,
        id: &ShareId,
        owner_uid: &str,
        content: &ShareContent,
    ) -> Result<()> {
        let path = share_path(id);
        let Some(document) = self.documents.get(&path).await? else {
            return Err(Error::NotFound(format!("shared item {id}")));
        };

        if let Some(owner) = ShareItem::owner_from_fields(&document.fields) {
            if owner != owner_uid {
                return Err(Error::PermissionDenied(
                    "You can only update shared items you own.".to_string(),
                ));
            }
        }

        let stored_kind = document.fields.get("type").and_then(Value::as_str);
        if stored_kind.is_some_and(|kind| kind != content.kind().as_str()) {
            return Err(Error::Invalid(format!(
                "Shared item {id} cannot change its type to {}",
                content.kind()
            )));
        }

        let mut fields = Map::new();
        fields.insert(
            "type".to_string(),
            Value::String(content.kind().as_str().to_string()),
        );
        fields.insert("content".to_string(), content.to_value());
        self.documents.merge(&path, fields).await?;
        tracing::debug!("Updated shared item {}", id);
        Ok(())
    }

    /// Delete a shared item owned by `owner_uid`. Missing items are a no-op.
    pub async fn remove_share_item(&self, id: &ShareId, owner_uid: &str) -> Result<()> {
        let path = share_path(id);
        let Some(document) = self.documents.get(&path).await? else {
            return Ok(());
        };

        if let Some(owner) = ShareItem::owner_from_fields(&document.fields) {
            if owner != owner_uid {
                return Err(Error::PermissionDenied(
                    "You can only unshare items you own.".to_string(),
                ));
            }
        }

        self.documents.delete(&path).await?;
        tracing::info!("Removed shared item {}", id);
        Ok(())
    }

    /// Upload a file under the identity's namespace.
    pub async fn upload_attachment(&self, uid: &str, file: FileUpload) -> Result<Attachment> {
        let uid = require_uid(uid)?;
        let path = attachment_path(uid, &file.name, unix_millis_now());
        let url = self
            .objects
            .put(&path, file.bytes, file.content_type.as_deref())
            .await?;

        let name = if file.name.trim().is_empty() {
            sanitize_file_name(&file.name)
        } else {
            file.name
        };
        Attachment::new(name, url, path)
    }
}

/// Storage path for an uploaded attachment.
pub fn attachment_path(uid: &str, file_name: &str, timestamp_millis: i64) -> String {
    format!(
        "attachments/{uid}/{timestamp_millis}-{}",
        sanitize_file_name(file_name)
    )
}

fn app_state_path(uid: &str) -> Result<DocumentPath> {
    Ok(DocumentPath::new(APP_STATE_COLLECTION, require_uid(uid)?))
}

fn share_path(id: &ShareId) -> DocumentPath {
    DocumentPath::new(SHARED_ITEMS_COLLECTION, id.as_str())
}

fn require_uid(uid: &str) -> Result<&str> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(Error::Invalid("A signed-in identity is required".to_string()));
    }
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::{AppState, CanvasImage, NoteContent};
    use crate::remote::MemoryDocumentStore;
    use crate::storage::MemoryObjectStore;

    type TestGateway = RemoteGateway<MemoryDocumentStore, MemoryObjectStore>;

    fn gateway() -> (TestGateway, MemoryDocumentStore) {
        let documents = MemoryDocumentStore::new();
        let gateway = RemoteGateway::new(
            documents.clone(),
            MemoryObjectStore::new("https://cdn.example.com"),
        );
        (gateway, documents)
    }

    fn note(text: &str) -> ShareContent {
        ShareContent::Note(NoteContent {
            text: text.to_string(),
            attachments: Vec::new(),
        })
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn load_state_without_document_is_none() {
        let (gateway, _) = gateway();
        assert_eq!(gateway.load_state("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_state_merges_fields_and_ignores_caller_timestamp() {
        let (gateway, documents) = gateway();
        let state = AppState {
            notes: "full".to_string(),
            note_attachments: Vec::new(),
            shared_note_id: None,
            shared_canvas_id: None,
            timer_default_seconds: 300,
            timer_remaining_seconds: 300,
            canvas_image: CanvasImage::empty(),
        };
        gateway.save_state("u1", state.to_fields()).await.unwrap();
        gateway
            .save_state(
                "u1",
                fields(json!({"notes": "partial", "updatedAt": "1999-01-01T00:00:00Z"})),
            )
            .await
            .unwrap();

        let stored = documents
            .get(&DocumentPath::new(APP_STATE_COLLECTION, "u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields["notes"], json!("partial"));
        assert_eq!(stored.fields["timerDefaultSeconds"], json!(300));
        assert!(!stored.fields.contains_key("updatedAt"));

        let loaded = gateway.load_state("u1").await.unwrap().unwrap();
        assert_eq!(loaded.notes.as_deref(), Some("partial"));
        assert!(loaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn load_state_reports_unavailable_backend() {
        let (gateway, documents) = gateway();
        documents.set_offline(true);
        assert!(matches!(
            gateway.load_state("u1").await,
            Err(Error::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn share_item_roundtrip() {
        let (gateway, _) = gateway();
        let id = gateway.create_share_item("u1", &note("hello")).await.unwrap();

        let item = gateway.get_share_item(&id).await.unwrap().unwrap();
        assert_eq!(item.owner_uid.as_deref(), Some("u1"));
        assert_eq!(item.content, note("hello"));
        assert!(item.created_at.is_some());
    }

    #[tokio::test]
    async fn update_by_non_owner_is_denied() {
        let (gateway, _) = gateway();
        let id = gateway.create_share_item("owner", &note("v1")).await.unwrap();

        let result = gateway.update_share_item(&id, "intruder", &note("v2")).await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));

        let result = gateway.remove_share_item(&id, "intruder").await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));
        assert!(gateway.get_share_item(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ownerless_items_accept_any_requester() {
        let (gateway, documents) = gateway();
        let id = ShareId::parse("legacy1").unwrap();
        documents.insert_raw(
            DocumentPath::new(SHARED_ITEMS_COLLECTION, "legacy1"),
            fields(json!({"note": "old text"})),
        );

        gateway
            .update_share_item(&id, "anyone", &note("new text"))
            .await
            .unwrap();
        let item = gateway.get_share_item(&id).await.unwrap().unwrap();
        assert_eq!(item.content, note("new text"));

        gateway.remove_share_item(&id, "someone-else").await.unwrap();
        assert!(gateway.get_share_item(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_owner_accepts_any_requester() {
        let (gateway, documents) = gateway();
        let id = ShareId::parse("blank-owner").unwrap();
        documents.insert_raw(
            DocumentPath::new(SHARED_ITEMS_COLLECTION, "blank-owner"),
            fields(json!({"ownerUid": "", "type": "note", "content": {"text": "v1"}})),
        );

        gateway
            .update_share_item(&id, "anyone", &note("v2"))
            .await
            .unwrap();
        let item = gateway.get_share_item(&id).await.unwrap().unwrap();
        assert_eq!(item.owner_uid, None);
        assert_eq!(item.content, note("v2"));

        gateway.remove_share_item(&id, "someone-else").await.unwrap();
        assert!(gateway.get_share_item(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_item_is_not_found_but_remove_is_noop() {
        let (gateway, _) = gateway();
        let id = ShareId::parse("missing").unwrap();

        assert!(matches!(
            gateway.update_share_item(&id, "u1", &note("x")).await,
            Err(Error::NotFound(_))
        ));
        gateway.remove_share_item(&id, "u1").await.unwrap();
    }

    #[tokio::test]
    async fn update_cannot_change_item_type() {
        let (gateway, _) = gateway();
        let id = gateway.create_share_item("u1", &note("x")).await.unwrap();
        let result = gateway
            .update_share_item(
                &id,
                "u1",
                &ShareContent::Canvas(CanvasImage::from_png_bytes(b"p")),
            )
            .await;
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[tokio::test]
    async fn upload_attachment_sanitizes_and_namespaces_path() {
        let (gateway, _) = gateway();
        let attachment = gateway
            .upload_attachment(
                "u1",
                FileUpload {
                    name: "Lab Report #2.pdf".to_string(),
                    bytes: b"%PDF".to_vec(),
                    content_type: Some("application/pdf".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(attachment.name, "Lab Report #2.pdf");
        assert!(attachment.path.starts_with("attachments/u1/"));
        assert!(attachment.path.ends_with("-Lab_Report__2.pdf"));
        assert_eq!(
            attachment.url,
            format!("https://cdn.example.com/{}", attachment.path)
        );
    }

    #[tokio::test]
    async fn remote_calls_require_identity() {
        let (gateway, _) = gateway();
        assert!(matches!(
            gateway.load_state(" ").await,
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            gateway.create_share_item("", &note("x")).await,
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn attachment_path_uses_timestamp_disambiguator() {
        assert_eq!(
            attachment_path("u1", "a b.png", 1_700_000_000_000),
            "attachments/u1/1700000000000-a_b.png"
        );
    }
}
