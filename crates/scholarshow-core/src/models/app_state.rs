//! Per-identity composite app state document

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::attachment::Attachment;
use super::canvas::CanvasImage;
use super::share::ShareId;

const FIELD_NOTES: &str = "notes";
const FIELD_NOTE_ATTACHMENTS: &str = "noteAttachments";
const FIELD_SHARED_NOTE_ID: &str = "sharedNoteId";
const FIELD_SHARED_CANVAS_ID: &str = "sharedCanvasId";
const FIELD_TIMER_DEFAULT: &str = "timerDefaultSeconds";
const FIELD_TIMER_REMAINING: &str = "timerRemainingSeconds";
const FIELD_CANVAS_IMAGE: &str = "canvasImage";

/// Full snapshot of the synchronized user state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub notes: String,
    pub note_attachments: Vec<Attachment>,
    pub shared_note_id: Option<ShareId>,
    pub shared_canvas_id: Option<ShareId>,
    pub timer_default_seconds: u32,
    pub timer_remaining_seconds: u32,
    pub canvas_image: CanvasImage,
}

impl AppState {
    /// Every field of the snapshot, keyed as stored remotely.
    ///
    /// `updatedAt` is omitted; the backend stamps it.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let share_id_value = |id: &Option<ShareId>| {
            id.as_ref()
                .map_or(Value::Null, |id| Value::String(id.as_str().to_string()))
        };

        let mut fields = Map::new();
        fields.insert(FIELD_NOTES.to_string(), Value::String(self.notes.clone()));
        fields.insert(
            FIELD_NOTE_ATTACHMENTS.to_string(),
            serde_json::to_value(&self.note_attachments).unwrap_or(Value::Array(Vec::new())),
        );
        fields.insert(
            FIELD_SHARED_NOTE_ID.to_string(),
            share_id_value(&self.shared_note_id),
        );
        fields.insert(
            FIELD_SHARED_CANVAS_ID.to_string(),
            share_id_value(&self.shared_canvas_id),
        );
        fields.insert(
            FIELD_TIMER_DEFAULT.to_string(),
            Value::from(self.timer_default_seconds),
        );
        fields.insert(
            FIELD_TIMER_REMAINING.to_string(),
            Value::from(self.timer_remaining_seconds),
        );
        fields.insert(
            FIELD_CANVAS_IMAGE.to_string(),
            Value::String(self.canvas_image.as_str().to_string()),
        );
        fields
    }
}

/// App state as read back from the backend.
///
/// Each field is `None` when it was absent or malformed. Share IDs use a
/// nested option: `Some(None)` means the document explicitly cleared it.
/// Timer values stay raw so the caller can validate them against local bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAppState {
    pub notes: Option<String>,
    pub note_attachments: Option<Vec<Attachment>>,
    pub shared_note_id: Option<Option<ShareId>>,
    pub shared_canvas_id: Option<Option<ShareId>>,
    pub timer_default_seconds: Option<f64>,
    pub timer_remaining_seconds: Option<f64>,
    pub canvas_image: Option<CanvasImage>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteAppState {
    /// Decode document fields one by one, ignoring anything ill-typed.
    #[must_use]
    pub fn from_fields(fields: &Map<String, Value>, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            notes: fields
                .get(FIELD_NOTES)
                .and_then(Value::as_str)
                .map(str::to_string),
            note_attachments: fields
                .get(FIELD_NOTE_ATTACHMENTS)
                .and_then(Attachment::list_from_value),
            shared_note_id: fields.get(FIELD_SHARED_NOTE_ID).and_then(decode_share_id),
            shared_canvas_id: fields.get(FIELD_SHARED_CANVAS_ID).and_then(decode_share_id),
            timer_default_seconds: fields.get(FIELD_TIMER_DEFAULT).and_then(Value::as_f64),
            timer_remaining_seconds: fields.get(FIELD_TIMER_REMAINING).and_then(Value::as_f64),
            canvas_image: fields
                .get(FIELD_CANVAS_IMAGE)
                .and_then(Value::as_str)
                .map(CanvasImage::from_data_url),
            updated_at,
        }
    }
}

fn decode_share_id(value: &Value) -> Option<Option<ShareId>> {
    match value {
        Value::Null => Some(None),
        Value::String(raw) if raw.trim().is_empty() => Some(None),
        Value::String(raw) => ShareId::parse(raw).ok().map(Some),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample_state() -> AppState {
        AppState {
            notes: "photosynthesis".to_string(),
            note_attachments: vec![Attachment::new("a.png", "https://x/a", "p/a").unwrap()],
            shared_note_id: Some(ShareId::parse("share-1").unwrap()),
            shared_canvas_id: None,
            timer_default_seconds: 600,
            timer_remaining_seconds: 120,
            canvas_image: CanvasImage::from_png_bytes(b"img"),
        }
    }

    #[test]
    fn to_fields_writes_every_field_but_updated_at() {
        let fields = sample_state().to_fields();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields["sharedCanvasId"], Value::Null);
        assert_eq!(fields["timerRemainingSeconds"], json!(120));
        assert!(!fields.contains_key("updatedAt"));
    }

    #[test]
    fn from_fields_reads_what_to_fields_writes() {
        let state = sample_state();
        let remote = RemoteAppState::from_fields(&state.to_fields(), None);

        assert_eq!(remote.notes.as_deref(), Some("photosynthesis"));
        assert_eq!(remote.note_attachments, Some(state.note_attachments));
        assert_eq!(remote.shared_note_id, Some(state.shared_note_id));
        assert_eq!(remote.shared_canvas_id, Some(None));
        assert_eq!(remote.timer_default_seconds, Some(600.0));
    }

    #[test]
    fn from_fields_ignores_malformed_values() {
        let fields = json!({
            "notes": 42,
            "noteAttachments": "nope",
            "sharedNoteId": {"id": "x"},
            "timerDefaultSeconds": "900",
            "canvasImage": false
        });
        let remote = RemoteAppState::from_fields(fields.as_object().unwrap(), None);
        assert_eq!(remote, RemoteAppState::default());
    }
}
