//! Attachment model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A file uploaded alongside the notes.
///
/// Immutable once created; removing it from the notes does not delete the
/// stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name (the original file name).
    pub name: String,
    /// Publicly resolvable URL of the stored object.
    pub url: String,
    /// Object storage path.
    pub path: String,
}

impl Attachment {
    /// Create a new attachment record.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let url = url.into().trim().to_string();
        let path = path.into().trim().to_string();

        if name.is_empty() {
            return Err(Error::Invalid("Attachment name cannot be empty".to_string()));
        }
        if url.is_empty() {
            return Err(Error::Invalid("Attachment url cannot be empty".to_string()));
        }
        if path.is_empty() {
            return Err(Error::Invalid("Attachment path cannot be empty".to_string()));
        }

        Ok(Self { name, url, path })
    }

    /// Decode one attachment from an untyped document value.
    ///
    /// Returns `None` unless `name`, `url` and `path` are all strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            name: field("name")?,
            url: field("url")?,
            path: field("path")?,
        })
    }

    /// Decode a list of attachments, skipping malformed entries.
    pub fn list_from_value(value: &Value) -> Option<Vec<Self>> {
        let entries = value.as_array()?;
        Some(entries.iter().filter_map(Self::from_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_attachment_new() {
        let attachment = Attachment::new(
            " slides.pdf ",
            "https://cdn.example.com/a/slides.pdf",
            "attachments/u1/1-slides.pdf",
        )
        .unwrap();

        assert_eq!(attachment.name, "slides.pdf");
        assert_eq!(attachment.path, "attachments/u1/1-slides.pdf");
    }

    #[test]
    fn test_attachment_validation() {
        assert!(Attachment::new("", "https://x", "p").is_err());
        assert!(Attachment::new("a", " ", "p").is_err());
        assert!(Attachment::new("a", "https://x", "").is_err());
    }

    #[test]
    fn list_from_value_skips_malformed_entries() {
        let value = json!([
            {"name": "a.png", "url": "https://x/a.png", "path": "attachments/u/a.png"},
            {"name": "missing-url", "path": "attachments/u/b.png"},
            "not-an-object",
            {"name": 3, "url": "https://x/c", "path": "c"}
        ]);

        let attachments = Attachment::list_from_value(&value).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name, "a.png");
    }

    #[test]
    fn list_from_value_rejects_non_arrays() {
        assert!(Attachment::list_from_value(&json!({"name": "a"})).is_none());
        assert!(Attachment::list_from_value(&json!(null)).is_none());
    }
}
