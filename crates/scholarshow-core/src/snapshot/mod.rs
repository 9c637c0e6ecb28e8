//! Local snapshot store
//!
//! Durable key-value persistence for the values the toolkit keeps on the
//! device: notes text, attachment list, timer configuration and the canvas
//! raster. Writes are synchronous. Reads never fail: a missing or undecodable
//! value comes back as `None`.

mod migrations;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Attachment, CanvasImage, ShareId, ShareKind, TimerState};

/// Key holding the notes text.
pub const KEY_NOTES: &str = "scholarshow.notes";
/// Key holding the JSON-serialized attachment list.
pub const KEY_NOTE_ATTACHMENTS: &str = "scholarshow.noteAttachments";
/// Key holding the JSON-serialized timer configuration.
pub const KEY_TIMER: &str = "scholarshow.timer";
/// Key holding the canvas raster as a data URL.
pub const KEY_CANVAS: &str = "scholarshow.canvas";
/// Key holding the active note share ID.
pub const KEY_SHARED_NOTE_ID: &str = "scholarshow.sharedNoteId";
/// Key holding the active canvas share ID.
pub const KEY_SHARED_CANVAS_ID: &str = "scholarshow.sharedCanvasId";

/// Timer values that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTimer {
    pub default_seconds: u32,
    pub remaining_seconds: u32,
}

impl From<TimerState> for StoredTimer {
    fn from(state: TimerState) -> Self {
        Self {
            default_seconds: state.default_seconds,
            remaining_seconds: state.remaining_seconds,
        }
    }
}

/// `SQLite`-backed snapshot store.
pub struct LocalSnapshotStore {
    conn: Mutex<Connection>,
}

impl LocalSnapshotStore {
    /// Open the store at `path`, creating the file and schema when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        if let Err(error) =
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")
        {
            tracing::warn!("Snapshot store pragmas were not applied: {}", error);
        }
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist `value` under `key`, replacing any previous value.
    pub fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, crate::util::unix_millis_now()],
        )?;
        Ok(())
    }

    /// Last value saved under `key`, if any.
    pub fn load(&self, key: &str) -> Option<String> {
        let result = self.lock().and_then(|conn| {
            conn.query_row(
                "SELECT value FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Error::from)
        });

        match result {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("Failed to read local snapshot '{}': {}", key, error);
                None
            }
        }
    }

    /// Remove the value stored under `key`.
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn save_notes(&self, notes: &str) -> Result<()> {
        self.save(KEY_NOTES, notes)
    }

    pub fn load_notes(&self) -> Option<String> {
        self.load(KEY_NOTES)
    }

    pub fn save_attachments(&self, attachments: &[Attachment]) -> Result<()> {
        self.save(KEY_NOTE_ATTACHMENTS, &serde_json::to_string(attachments)?)
    }

    pub fn load_attachments(&self) -> Option<Vec<Attachment>> {
        self.load_json(KEY_NOTE_ATTACHMENTS)
    }

    pub fn save_timer(&self, timer: StoredTimer) -> Result<()> {
        self.save(KEY_TIMER, &serde_json::to_string(&timer)?)
    }

    pub fn load_timer(&self) -> Option<StoredTimer> {
        self.load_json(KEY_TIMER)
    }

    pub fn save_canvas(&self, image: &CanvasImage) -> Result<()> {
        self.save(KEY_CANVAS, image.as_str())
    }

    pub fn load_canvas(&self) -> Option<CanvasImage> {
        self.load(KEY_CANVAS).map(CanvasImage::from_data_url)
    }

    /// Remember (or forget, with `None`) the active share of `kind`.
    pub fn save_share_id(&self, kind: ShareKind, id: Option<&ShareId>) -> Result<()> {
        match id {
            Some(id) => self.save(share_key(kind), id.as_str()),
            None => self.remove(share_key(kind)),
        }
    }

    pub fn load_share_id(&self, kind: ShareKind) -> Option<ShareId> {
        let raw = self.load(share_key(kind))?;
        ShareId::parse(&raw)
            .map_err(|error| tracing::warn!("Ignoring stored share ID '{}': {}", raw, error))
            .ok()
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.load(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Ignoring corrupted local snapshot '{}': {}", key, error);
                None
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("Local snapshot store lock poisoned".to_string()))
    }
}

const fn share_key(kind: ShareKind) -> &'static str {
    match kind {
        ShareKind::Note => KEY_SHARED_NOTE_ID,
        ShareKind::Canvas => KEY_SHARED_CANVAS_ID,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn load_missing_key_is_none() {
        let store = LocalSnapshotStore::open_in_memory().unwrap();
        assert_eq!(store.load_notes(), None);
        assert_eq!(store.load_attachments(), None);
        assert_eq!(store.load_canvas(), None);
    }

    #[test]
    fn on_disk_store_uses_write_ahead_log() {
        let dir = tempdir().unwrap();
        let store = LocalSnapshotStore::open(dir.path().join("snapshots.db")).unwrap();
        let conn = store.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn snapshot_values_are_returned_byte_identical() {
        let store = LocalSnapshotStore::open_in_memory().unwrap();
        let notes = "Chapter 3\n  • mitochondria — powerhouse\n\ttabs kept";
        let attachments = vec![
            Attachment::new("a b.png", "https://cdn/x", "attachments/u/1-a_b.png").unwrap(),
            Attachment::new("c.pdf", "https://cdn/y", "attachments/u/2-c.pdf").unwrap(),
        ];
        let canvas = CanvasImage::from_png_bytes(&[0, 1, 2, 3, 254, 255]);

        store.save_notes(notes).unwrap();
        store.save_attachments(&attachments).unwrap();
        store.save_canvas(&canvas).unwrap();

        assert_eq!(store.load_notes().as_deref(), Some(notes));
        assert_eq!(store.load_attachments(), Some(attachments));
        assert_eq!(store.load_canvas(), Some(canvas));
    }

    #[test]
    fn corrupted_json_degrades_to_empty() {
        let store = LocalSnapshotStore::open_in_memory().unwrap();
        store.save(KEY_NOTE_ATTACHMENTS, "[{\"name\": ").unwrap();
        store.save(KEY_TIMER, "not json").unwrap();

        assert_eq!(store.load_attachments(), None);
        assert_eq!(store.load_timer(), None);
    }

    #[test]
    fn save_overwrites_previous_value() {
        let store = LocalSnapshotStore::open_in_memory().unwrap();
        store.save_notes("first").unwrap();
        store.save_notes("second").unwrap();
        assert_eq!(store.load_notes().as_deref(), Some("second"));

        store.remove(KEY_NOTES).unwrap();
        assert_eq!(store.load_notes(), None);
    }

    #[test]
    fn share_ids_are_saved_and_cleared() {
        let store = LocalSnapshotStore::open_in_memory().unwrap();
        let id = ShareId::parse("abc123").unwrap();

        store.save_share_id(ShareKind::Note, Some(&id)).unwrap();
        assert_eq!(store.load_share_id(ShareKind::Note), Some(id));
        assert_eq!(store.load_share_id(ShareKind::Canvas), None);

        store.save_share_id(ShareKind::Note, None).unwrap();
        assert_eq!(store.load_share_id(ShareKind::Note), None);

        store.save(KEY_SHARED_CANVAS_ID, "bad id").unwrap();
        assert_eq!(store.load_share_id(ShareKind::Canvas), None);
    }

    #[test]
    fn values_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("snapshots.db");

        {
            let store = LocalSnapshotStore::open(&path).unwrap();
            store.save_notes("persisted").unwrap();
            store
                .save_timer(StoredTimer {
                    default_seconds: 900,
                    remaining_seconds: 300,
                })
                .unwrap();
        }

        let store = LocalSnapshotStore::open(&path).unwrap();
        assert_eq!(store.load_notes().as_deref(), Some("persisted"));
        assert_eq!(
            store.load_timer(),
            Some(StoredTimer {
                default_seconds: 900,
                remaining_seconds: 300,
            })
        );
    }
}
