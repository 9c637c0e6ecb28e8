//! Shared content items

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::attachment::Attachment;
use super::canvas::CanvasImage;

/// Opaque identifier of a shared item. Holding it grants read access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(String);

impl ShareId {
    /// Generate a fresh, unique share ID (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Validate an externally supplied share ID.
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(Error::Invalid("Share link is missing an ID".to_string()));
        }
        if value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(Error::Invalid(format!("Malformed share ID: {value}")));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a shared item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Note,
    Canvas,
}

impl ShareKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Canvas => "canvas",
        }
    }
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Note text plus its attachments, as captured when shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl NoteContent {
    /// Normalize either the structured shape or the legacy bare string.
    ///
    /// Blank text with no attachments is no content at all.
    fn from_value(value: &Value) -> Option<Self> {
        let note = match value {
            Value::String(text) => Self {
                text: text.clone(),
                attachments: Vec::new(),
            },
            Value::Object(object) => Self {
                text: object
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                attachments: object
                    .get("attachments")
                    .and_then(Attachment::list_from_value)
                    .unwrap_or_default(),
            },
            _ => return None,
        };
        (!note.is_empty()).then_some(note)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

/// Content of a shared item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareContent {
    Note(NoteContent),
    Canvas(CanvasImage),
}

impl ShareContent {
    #[must_use]
    pub const fn kind(&self) -> ShareKind {
        match self {
            Self::Note(_) => ShareKind::Note,
            Self::Canvas(_) => ShareKind::Canvas,
        }
    }

    /// Document representation of the content value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Note(note) => json!({
                "text": note.text,
                "attachments": note.attachments,
            }),
            Self::Canvas(image) => Value::String(image.as_str().to_string()),
        }
    }
}

/// A standalone shared record, addressed by its [`ShareId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareItem {
    pub id: ShareId,
    /// `None` for items created before ownership was recorded.
    pub owner_uid: Option<String>,
    pub content: ShareContent,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShareItem {
    /// Fields written when a share item is created.
    #[must_use]
    pub fn creation_fields(owner_uid: &str, content: &ShareContent) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("ownerUid".to_string(), Value::String(owner_uid.to_string()));
        fields.insert(
            "type".to_string(),
            Value::String(content.kind().as_str().to_string()),
        );
        fields.insert("content".to_string(), content.to_value());
        fields
    }

    /// Stored owner, if one was recorded.
    #[must_use]
    pub fn owner_from_fields(fields: &Map<String, Value>) -> Option<String> {
        fields
            .get("ownerUid")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(str::to_string)
    }

    /// Decode a stored share document.
    ///
    /// Returns `None` when the item has no usable content. Legacy documents
    /// that kept a bare string under `note` (and no `type`) decode as notes.
    #[must_use]
    pub fn from_fields(
        id: ShareId,
        fields: &Map<String, Value>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let raw_content = fields
            .get("content")
            .or_else(|| fields.get("note"))
            .filter(|value| !value.is_null())?;

        let kind = match fields.get("type").and_then(Value::as_str) {
            Some("note") => ShareKind::Note,
            Some("canvas") => ShareKind::Canvas,
            Some(_) => return None,
            None if fields.contains_key("content")
                && raw_content
                    .as_str()
                    .is_some_and(|value| value.starts_with("data:image/")) =>
            {
                ShareKind::Canvas
            }
            None => ShareKind::Note,
        };

        let content = match kind {
            ShareKind::Note => ShareContent::Note(NoteContent::from_value(raw_content)?),
            ShareKind::Canvas => {
                let image = CanvasImage::from_data_url(raw_content.as_str()?);
                if image.is_empty() {
                    return None;
                }
                ShareContent::Canvas(image)
            }
        };

        Some(Self {
            id,
            owner_uid: Self::owner_from_fields(fields),
            content,
            created_at,
            updated_at,
        })
    }

    /// Whether `requester` may update or delete this item.
    #[must_use]
    pub fn is_mutable_by(&self, requester: &str) -> bool {
        self.owner_uid
            .as_deref()
            .map_or(true, |owner| owner == requester)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn share_id_parse_rejects_empty_and_paths() {
        assert!(matches!(ShareId::parse("  "), Err(Error::Invalid(_))));
        assert!(matches!(ShareId::parse("a/b"), Err(Error::Invalid(_))));
        assert_eq!(ShareId::parse(" abc123 ").unwrap().as_str(), "abc123");
    }

    #[test]
    fn generated_share_ids_are_unique() {
        assert_ne!(ShareId::generate(), ShareId::generate());
    }

    #[test]
    fn decodes_structured_note() {
        let item = ShareItem::from_fields(
            ShareId::parse("n1").unwrap(),
            &fields(json!({
                "ownerUid": "u1",
                "type": "note",
                "content": {
                    "text": "hello",
                    "attachments": [{"name": "a", "url": "https://x/a", "path": "p/a"}]
                }
            })),
            None,
            None,
        )
        .unwrap();

        assert_eq!(item.owner_uid.as_deref(), Some("u1"));
        let ShareContent::Note(note) = item.content else {
            panic!("expected note content");
        };
        assert_eq!(note.text, "hello");
        assert_eq!(note.attachments.len(), 1);
    }

    #[test]
    fn decodes_bare_string_note_content() {
        let item = ShareItem::from_fields(
            ShareId::parse("n2").unwrap(),
            &fields(json!({"type": "note", "content": "plain"})),
            None,
            None,
        )
        .unwrap();

        assert_eq!(
            item.content,
            ShareContent::Note(NoteContent {
                text: "plain".to_string(),
                attachments: Vec::new(),
            })
        );
        assert_eq!(item.owner_uid, None);
    }

    #[test]
    fn decodes_first_schema_note_field() {
        let item = ShareItem::from_fields(
            ShareId::parse("n3").unwrap(),
            &fields(json!({"ownerUid": "u9", "note": "from the old days"})),
            None,
            None,
        )
        .unwrap();

        assert_eq!(item.content.kind(), ShareKind::Note);
    }

    #[test]
    fn decodes_canvas_content() {
        let image = CanvasImage::from_png_bytes(b"png");
        let item = ShareItem::from_fields(
            ShareId::parse("c1").unwrap(),
            &ShareItem::creation_fields("u1", &ShareContent::Canvas(image.clone())),
            None,
            None,
        )
        .unwrap();

        assert_eq!(item.content, ShareContent::Canvas(image));
    }

    #[test]
    fn empty_or_unknown_content_is_not_an_item() {
        let id = ShareId::parse("x").unwrap();
        assert!(ShareItem::from_fields(id.clone(), &fields(json!({"ownerUid": "u"})), None, None)
            .is_none());
        assert!(ShareItem::from_fields(
            id.clone(),
            &fields(json!({"type": "canvas", "content": ""})),
            None,
            None
        )
        .is_none());
        assert!(ShareItem::from_fields(
            id.clone(),
            &fields(json!({"type": "note", "content": {"text": "  ", "attachments": []}})),
            None,
            None
        )
        .is_none());
        assert!(ShareItem::from_fields(id.clone(), &fields(json!({"note": ""})), None, None)
            .is_none());
        assert!(ShareItem::from_fields(
            id,
            &fields(json!({"type": "video", "content": "x"})),
            None,
            None
        )
        .is_none());
    }

    #[test]
    fn ownerless_items_are_mutable_by_anyone() {
        let item = ShareItem::from_fields(
            ShareId::parse("o").unwrap(),
            &fields(json!({"type": "note", "content": "x"})),
            None,
            None,
        )
        .unwrap();
        assert!(item.is_mutable_by("anyone"));
    }
}
