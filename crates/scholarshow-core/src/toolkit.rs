//! Application facade.
//!
//! Every user action persists locally first and then, when signed in,
//! dispatches a best-effort push of the whole snapshot. Edits to content
//! with an active share also push the share: note text through the
//! debouncer, everything else immediately.

use std::sync::{Arc, Mutex, PoisonError};

use crate::auth::IdentityProvider;
use crate::error::{Error, Result};
use crate::models::{
    AppState, Attachment, CanvasImage, NoteContent, ShareContent, ShareId, ShareKind, TimerState,
};
use crate::remote::{DocumentStore, FileUpload, RemoteGateway};
use crate::session::{IdentityTransition, SessionController};
use crate::share::{share_link, ShareResolver};
use crate::snapshot::{LocalSnapshotStore, StoredTimer};
use crate::storage::ObjectStore;
use crate::sync::{SyncDispatch, SyncOutcome};

/// A share that is active for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveShare {
    pub id: ShareId,
    pub link: String,
    /// `false` when an existing share was reused.
    pub created: bool,
}

pub struct Toolkit<D, O, P> {
    controller: Arc<SessionController<D, O, P>>,
    share_base_url: Option<String>,
    dispatches: Mutex<Vec<SyncDispatch>>,
}

impl<D, O, P> Toolkit<D, O, P>
where
    D: DocumentStore,
    O: ObjectStore,
    P: IdentityProvider,
{
    pub fn new(controller: SessionController<D, O, P>, share_base_url: Option<String>) -> Self {
        Self {
            controller: Arc::new(controller),
            share_base_url,
            dispatches: Mutex::new(Vec::new()),
        }
    }

    /// Toolkit wired to remote services through `provider` and `gateway`.
    pub fn connected(
        snapshots: LocalSnapshotStore,
        provider: Arc<P>,
        gateway: RemoteGateway<D, O>,
        share_base_url: Option<String>,
    ) -> Self {
        Self::new(
            SessionController::new(Arc::new(snapshots), provider, gateway),
            share_base_url,
        )
    }

    /// Toolkit that only persists locally.
    pub fn offline(snapshots: LocalSnapshotStore) -> Self {
        Self::new(SessionController::local_only(Arc::new(snapshots)), None)
    }

    pub const fn controller(&self) -> &Arc<SessionController<D, O, P>> {
        &self.controller
    }

    pub fn state(&self) -> AppState {
        self.controller.state()
    }

    /// Take the latest transient status message.
    pub fn take_status(&self) -> Option<String> {
        self.controller.status().take()
    }

    /// Resume the provider's persisted session and apply its cloud state.
    pub async fn restore_session(&self) -> IdentityTransition {
        if let Some(provider) = self.controller.provider() {
            if let Err(error) = provider.restore().await {
                tracing::warn!("Could not restore sign-in session: {}", error);
                self.controller.status().set(error.to_string());
            }
        }
        self.controller.refresh_identity().await
    }

    // Notes

    pub fn set_notes(&self, text: &str) -> Result<()> {
        let ((), state) = self.controller.update(|state| state.notes = text.to_string());
        self.controller.snapshots().save_notes(&state.notes)?;
        self.push_state(&state);
        self.push_note_share_debounced(&state);
        Ok(())
    }

    pub fn append_notes(&self, text: &str) -> Result<()> {
        let mut notes = self.state().notes;
        if !notes.is_empty() && !notes.ends_with('\n') {
            notes.push('\n');
        }
        notes.push_str(text);
        self.set_notes(&notes)
    }

    /// Upload `file` and add it to the note's attachments.
    pub async fn attach(&self, file: FileUpload) -> Result<Attachment> {
        let (uid, gateway) = self.require_remote("upload attachments")?;
        let attachment = gateway.upload_attachment(&uid, file).await?;

        let ((), state) = self
            .controller
            .update(|state| state.note_attachments.push(attachment.clone()));
        self.controller
            .snapshots()
            .save_attachments(&state.note_attachments)?;
        self.push_state(&state);
        self.push_share_now(&state, ShareKind::Note);
        Ok(attachment)
    }

    /// Remove the attachment at `index`. The uploaded object is left in place.
    pub fn detach(&self, index: usize) -> Result<Attachment> {
        let (removed, state) = self.controller.update(|state| {
            (index < state.note_attachments.len()).then(|| state.note_attachments.remove(index))
        });
        let removed = removed
            .ok_or_else(|| Error::NotFound(format!("attachment #{}", index + 1)))?;
        self.controller
            .snapshots()
            .save_attachments(&state.note_attachments)?;
        self.push_state(&state);
        self.push_share_now(&state, ShareKind::Note);
        Ok(removed)
    }

    // Timer

    pub fn timer(&self) -> TimerState {
        self.controller.countdown().snapshot()
    }

    pub fn apply_timer_inputs(&self, minutes: &str, seconds: &str) -> Result<TimerState> {
        let timer = self.controller.countdown().apply_from_inputs(minutes, seconds)?;
        self.record_timer()?;
        Ok(timer)
    }

    pub fn start_timer(&self) -> bool {
        self.controller.countdown().start()
    }

    pub fn pause_timer(&self) -> Result<TimerState> {
        self.controller.countdown().pause();
        self.record_timer()
    }

    pub fn reset_timer(&self) -> Result<TimerState> {
        self.controller.countdown().reset();
        self.record_timer()
    }

    /// Persist and push the countdown's current values.
    pub fn record_timer(&self) -> Result<TimerState> {
        let timer = self.timer();
        let ((), state) = self.controller.update(|state| {
            state.timer_default_seconds = timer.default_seconds;
            state.timer_remaining_seconds = timer.remaining_seconds;
        });
        self.controller.snapshots().save_timer(StoredTimer::from(timer))?;
        self.push_state(&state);
        Ok(timer)
    }

    // Canvas

    pub fn save_canvas(&self, image: CanvasImage) -> Result<()> {
        let ((), state) = self.controller.update(|state| state.canvas_image = image);
        self.controller.snapshots().save_canvas(&state.canvas_image)?;
        self.push_state(&state);
        self.push_share_now(&state, ShareKind::Canvas);
        Ok(())
    }

    pub fn clear_canvas(&self) -> Result<()> {
        self.save_canvas(CanvasImage::empty())
    }

    // Sharing

    /// Share the current note or canvas, reusing an active share.
    pub async fn share(&self, kind: ShareKind) -> Result<ActiveShare> {
        let (uid, gateway) = self.require_remote("share")?;
        let state = self.state();
        let content = share_content(&state, kind);
        match &content {
            ShareContent::Canvas(image) if image.is_empty() => {
                return Err(Error::Invalid("Draw something before sharing.".to_string()));
            }
            ShareContent::Note(note) if note.is_empty() => {
                return Err(Error::Invalid("Write something before sharing.".to_string()));
            }
            _ => {}
        }

        if let Some(id) = share_id(&state, kind).cloned() {
            self.track(
                self.controller
                    .synchronizer()
                    .map(|sync| sync.push_share(&uid, &id, content)),
            );
            return Ok(ActiveShare {
                link: self.link_for(&id)?,
                id,
                created: false,
            });
        }

        let id = gateway.create_share_item(&uid, &content).await?;
        let ((), state) = self.controller.update(|state| match kind {
            ShareKind::Note => state.shared_note_id = Some(id.clone()),
            ShareKind::Canvas => state.shared_canvas_id = Some(id.clone()),
        });
        self.controller.snapshots().save_share_id(kind, Some(&id))?;
        self.push_state(&state);

        Ok(ActiveShare {
            link: self.link_for(&id)?,
            id,
            created: true,
        })
    }

    /// Delete the active share of `kind`. Returns the removed ID, if any.
    pub async fn unshare(&self, kind: ShareKind) -> Result<Option<ShareId>> {
        let Some(id) = share_id(&self.state(), kind).cloned() else {
            return Ok(None);
        };
        let (uid, gateway) = self.require_remote("unshare")?;
        if kind == ShareKind::Note {
            self.controller.debouncer().cancel();
        }
        gateway.remove_share_item(&id, &uid).await?;

        let ((), state) = self.controller.update(|state| match kind {
            ShareKind::Note => state.shared_note_id = None,
            ShareKind::Canvas => state.shared_canvas_id = None,
        });
        self.controller.snapshots().save_share_id(kind, None)?;
        self.push_state(&state);
        Ok(Some(id))
    }

    pub fn link_for(&self, id: &ShareId) -> Result<String> {
        share_link(self.share_base_url.as_deref(), id)
    }

    /// Fresh resolver for opening share links.
    pub fn resolver(&self) -> ShareResolver<D, O> {
        ShareResolver::new(self.controller.gateway().cloned())
    }

    // Sync

    /// Pull and apply the cloud document now.
    pub async fn pull(&self) -> Result<bool> {
        self.controller.pull().await
    }

    /// Push the full snapshot and wait for the outcome.
    pub async fn push(&self) -> Result<()> {
        let (uid, _) = self.require_remote("sync")?;
        let Some(sync) = self.controller.synchronizer() else {
            return Err(Error::Unavailable("Cloud sync is not configured".to_string()));
        };
        match sync.push_state(&uid, &self.state()).outcome().await {
            SyncOutcome::Pushed => Ok(()),
            SyncOutcome::Failed(message) => Err(Error::Remote(message)),
            SyncOutcome::Cancelled => Err(Error::Remote("Sync push was cancelled".to_string())),
        }
    }

    /// Wait for debounced and dispatched pushes to finish.
    pub async fn flush(&self) {
        self.controller.debouncer().flush().await;
        let dispatches = std::mem::take(
            &mut *self.dispatches.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for dispatch in dispatches {
            let _ = dispatch.outcome().await;
        }
    }

    fn push_state(&self, state: &AppState) {
        let Some(uid) = self.controller.remote_uid() else {
            return;
        };
        self.track(
            self.controller
                .synchronizer()
                .map(|sync| sync.push_state(&uid, state)),
        );
    }

    fn push_share_now(&self, state: &AppState, kind: ShareKind) {
        let (Some(uid), Some(id)) = (self.controller.remote_uid(), share_id(state, kind)) else {
            return;
        };
        if kind == ShareKind::Note {
            // This push already carries the latest text.
            self.controller.debouncer().cancel();
        }
        let content = share_content(state, kind);
        self.track(
            self.controller
                .synchronizer()
                .map(|sync| sync.push_share(&uid, id, content)),
        );
    }

    /// Schedule a note share update that sends the note as it stands when the
    /// quiet period ends.
    fn push_note_share_debounced(&self, state: &AppState) {
        if self.controller.remote_uid().is_none() || state.shared_note_id.is_none() {
            return;
        }
        let Some(gateway) = self.controller.gateway().cloned() else {
            return;
        };
        let controller = Arc::clone(&self.controller);
        self.controller.debouncer().schedule(async move {
            let state = controller.state();
            let (Some(uid), Some(id)) = (controller.remote_uid(), state.shared_note_id.clone())
            else {
                return;
            };
            let content = share_content(&state, ShareKind::Note);
            if let Err(error) = gateway.update_share_item(&id, &uid, &content).await {
                tracing::warn!("Debounced share update for {} failed: {}", id, error);
                controller.status().report(&error);
            }
        });
    }

    fn track(&self, dispatch: Option<SyncDispatch>) {
        let Some(dispatch) = dispatch else {
            return;
        };
        let mut dispatches = self.dispatches.lock().unwrap_or_else(PoisonError::into_inner);
        dispatches.retain(|pending| !pending.is_finished());
        dispatches.push(dispatch);
    }

    fn require_remote(&self, action: &str) -> Result<(String, RemoteGateway<D, O>)> {
        let Some(gateway) = self.controller.gateway() else {
            return Err(Error::Unavailable(format!(
                "Cloud services are not configured; cannot {action}"
            )));
        };
        let Some(uid) = self.controller.remote_uid() else {
            return Err(Error::PermissionDenied(format!("Please sign in to {action}.")));
        };
        Ok((uid, gateway.clone()))
    }
}

fn share_id(state: &AppState, kind: ShareKind) -> Option<&ShareId> {
    match kind {
        ShareKind::Note => state.shared_note_id.as_ref(),
        ShareKind::Canvas => state.shared_canvas_id.as_ref(),
    }
}

/// Snapshot of the current source content for a share.
fn share_content(state: &AppState, kind: ShareKind) -> ShareContent {
    match kind {
        ShareKind::Note => ShareContent::Note(NoteContent {
            text: state.notes.clone(),
            attachments: state.note_attachments.clone(),
        }),
        ShareKind::Canvas => ShareContent::Canvas(state.canvas_image.clone()),
    }
}
