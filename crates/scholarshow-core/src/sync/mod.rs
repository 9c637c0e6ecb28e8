//! State synchronization between the local snapshot and the remote document.
//!
//! Pushes are best-effort one-shot dispatches: each is spawned, never
//! retried, and reports failure only through the [`StatusLine`]. Overlapping
//! pushes may race; the last write to reach the backend wins.

mod debounce;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{
    clamp_timer_seconds, AppState, CanvasImage, RemoteAppState, ShareContent, ShareId,
    MAX_TIMER_SECONDS,
};
use crate::remote::{DocumentStore, RemoteGateway};
use crate::storage::ObjectStore;

pub use debounce::{Debouncer, DEBOUNCE_QUIET_PERIOD};

/// Most recent transient status message for the user.
#[derive(Clone, Default)]
pub struct StatusLine(Arc<Mutex<Option<String>>>);

impl StatusLine {
    pub fn set(&self, message: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    /// Record the user-facing text for a failed operation.
    pub fn report(&self, error: &Error) {
        self.set(error.status_text());
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Outcome of a dispatched push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed,
    /// The push failed; carries the status text that was reported.
    Failed(String),
    Cancelled,
}

/// Handle to a fire-and-forget push.
///
/// Dropping the handle detaches the push; awaiting [`SyncDispatch::outcome`]
/// observes it without changing its best-effort, no-retry contract.
#[must_use = "drop the dispatch to detach it, or await `outcome`"]
pub struct SyncDispatch {
    handle: JoinHandle<SyncOutcome>,
}

impl SyncDispatch {
    fn spawn<F>(label: &'static str, status: StatusLine, push: F) -> Self
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            match push.await {
                Ok(()) => {
                    tracing::debug!("Sync push '{}' completed", label);
                    SyncOutcome::Pushed
                }
                Err(error) => {
                    tracing::warn!("Sync push '{}' failed: {}", label, error);
                    status.report(&error);
                    SyncOutcome::Failed(error.status_text())
                }
            }
        });
        Self { handle }
    }

    pub async fn outcome(self) -> SyncOutcome {
        self.handle.await.unwrap_or(SyncOutcome::Cancelled)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Loads remote state and dispatches pushes through a [`RemoteGateway`].
pub struct StateSynchronizer<D, O> {
    gateway: RemoteGateway<D, O>,
    status: StatusLine,
}

impl<D: DocumentStore, O: ObjectStore> StateSynchronizer<D, O> {
    pub const fn new(gateway: RemoteGateway<D, O>, status: StatusLine) -> Self {
        Self { gateway, status }
    }

    pub const fn gateway(&self) -> &RemoteGateway<D, O> {
        &self.gateway
    }

    pub async fn pull(&self, uid: &str) -> Result<Option<RemoteAppState>> {
        self.gateway.load_state(uid).await
    }

    /// Push the entire snapshot as a merge-upsert.
    pub fn push_state(&self, uid: &str, state: &AppState) -> SyncDispatch {
        let gateway = self.gateway.clone();
        let uid = uid.to_string();
        let fields = state.to_fields();
        SyncDispatch::spawn("app_state", self.status.clone(), async move {
            gateway.save_state(&uid, fields).await
        })
    }

    /// Push new content to an active share.
    pub fn push_share(&self, uid: &str, id: &ShareId, content: ShareContent) -> SyncDispatch {
        let gateway = self.gateway.clone();
        let uid = uid.to_string();
        let id = id.clone();
        SyncDispatch::spawn("shared_item", self.status.clone(), async move {
            gateway.update_share_item(&id, &uid, &content).await
        })
    }
}

/// Overlay a remote document onto local state.
///
/// Present, well-typed remote fields win; absent or malformed ones leave the
/// local value alone. Timer values are re-validated and clamped so that
/// `1 <= default <= MAX_TIMER_SECONDS` and `remaining <= default`.
pub fn apply_remote_state(local: &mut AppState, remote: RemoteAppState) {
    if let Some(notes) = remote.notes {
        local.notes = notes;
    }
    if let Some(attachments) = remote.note_attachments {
        local.note_attachments = attachments;
    }
    if let Some(id) = remote.shared_note_id {
        local.shared_note_id = id;
    }
    if let Some(id) = remote.shared_canvas_id {
        local.shared_canvas_id = id;
    }

    if let Some(default_seconds) = remote
        .timer_default_seconds
        .and_then(|value| clamp_timer_seconds(value, 1, MAX_TIMER_SECONDS))
    {
        local.timer_default_seconds = default_seconds;
    }
    local.timer_remaining_seconds = remote
        .timer_remaining_seconds
        .and_then(|value| clamp_timer_seconds(value, 0, local.timer_default_seconds))
        .unwrap_or_else(|| local.timer_remaining_seconds.min(local.timer_default_seconds));

    if let Some(image) = remote.canvas_image {
        local.canvas_image = image;
    }
}

/// Empty local state with the default timer.
pub fn blank_state() -> AppState {
    let timer = crate::models::TimerState::default();
    AppState {
        notes: String::new(),
        note_attachments: Vec::new(),
        shared_note_id: None,
        shared_canvas_id: None,
        timer_default_seconds: timer.default_seconds,
        timer_remaining_seconds: timer.remaining_seconds,
        canvas_image: CanvasImage::empty(),
    }
}
