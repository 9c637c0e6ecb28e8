//! Session controller.
//!
//! Owns the application state for the running session (current identity,
//! synchronized app state, countdown, debounced share pushes) and reacts to
//! identity changes: signing in loads the identity's cloud document and
//! applies it locally; signing out leaves local-only persistence running.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthUser, IdentityProvider};
use crate::error::{Error, Result};
use crate::models::{AppState, ShareKind, TimerState};
use crate::remote::{DocumentStore, RemoteGateway};
use crate::snapshot::{LocalSnapshotStore, StoredTimer};
use crate::storage::ObjectStore;
use crate::sync::{apply_remote_state, blank_state, Debouncer, StateSynchronizer, StatusLine};
use crate::timer::Countdown;

/// What handling an identity notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityTransition {
    /// Same identity as before; nothing to do.
    Unchanged,
    SignedOut,
    /// Signed in; `applied` tells whether a cloud document was applied.
    SignedIn { applied: bool },
    /// Another identity change arrived while loading; the result was dropped.
    Superseded,
}

struct Session {
    identity: Option<AuthUser>,
    state: AppState,
    generation: u64,
}

struct Remote<D, O, P> {
    provider: Arc<P>,
    synchronizer: StateSynchronizer<D, O>,
}

pub struct SessionController<D, O, P> {
    snapshots: Arc<LocalSnapshotStore>,
    remote: Option<Remote<D, O, P>>,
    session: Mutex<Session>,
    identity_rx: Mutex<Option<watch::Receiver<Option<AuthUser>>>>,
    countdown: Countdown,
    debouncer: Debouncer,
    status: StatusLine,
}

impl<D, O, P> SessionController<D, O, P>
where
    D: DocumentStore,
    O: ObjectStore,
    P: IdentityProvider,
{
    /// Controller with remote services. Subscribes to `provider` once.
    pub fn new(
        snapshots: Arc<LocalSnapshotStore>,
        provider: Arc<P>,
        gateway: RemoteGateway<D, O>,
    ) -> Self {
        let status = StatusLine::default();
        let identity_rx = provider.subscribe();
        let remote = Remote {
            provider,
            synchronizer: StateSynchronizer::new(gateway, status.clone()),
        };
        Self::build(snapshots, Some(remote), Some(identity_rx), status)
    }

    /// Controller for a session without remote services.
    pub fn local_only(snapshots: Arc<LocalSnapshotStore>) -> Self {
        Self::build(snapshots, None, None, StatusLine::default())
    }

    fn build(
        snapshots: Arc<LocalSnapshotStore>,
        remote: Option<Remote<D, O, P>>,
        identity_rx: Option<watch::Receiver<Option<AuthUser>>>,
        status: StatusLine,
    ) -> Self {
        let state = load_local_state(&snapshots);
        let countdown = Countdown::new(TimerState::stopped(
            state.timer_default_seconds,
            state.timer_remaining_seconds,
        ));
        Self {
            snapshots,
            remote,
            session: Mutex::new(Session {
                identity: None,
                state,
                generation: 0,
            }),
            identity_rx: Mutex::new(identity_rx),
            countdown,
            debouncer: Debouncer::default(),
            status,
        }
    }

    /// Follow identity changes in a background task.
    ///
    /// Only one binding may exist per controller.
    pub fn bind(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let receiver = self
            .identity_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            return Err(Error::Invalid(
                "Identity changes are already bound (or remote services are off)".to_string(),
            ));
        };

        let controller: Weak<Self> = Arc::downgrade(self);
        Ok(tokio::spawn(async move {
            loop {
                let user = receiver.borrow_and_update().clone();
                let Some(this) = controller.upgrade() else {
                    break;
                };
                this.handle_identity(user).await;
                drop(this);

                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }))
    }

    /// Re-read the provider's current identity and handle it now.
    pub async fn refresh_identity(&self) -> IdentityTransition {
        let user = self
            .remote
            .as_ref()
            .and_then(|remote| remote.provider.current_user());
        self.handle_identity(user).await
    }

    /// Apply an identity change.
    ///
    /// A new identity cancels pending debounced pushes of the previous one
    /// and re-runs the load-and-apply sequence for itself.
    pub async fn handle_identity(&self, user: Option<AuthUser>) -> IdentityTransition {
        let generation = {
            let mut session = self.lock_session();
            let current = session.identity.as_ref().map(|user| user.id.as_str());
            if current == user.as_ref().map(|user| user.id.as_str()) {
                return IdentityTransition::Unchanged;
            }
            session.identity.clone_from(&user);
            session.generation += 1;
            session.generation
        };
        self.debouncer.cancel();

        let Some(user) = user else {
            tracing::info!("Signed out; continuing with local storage only");
            return IdentityTransition::SignedOut;
        };
        let Some(remote) = &self.remote else {
            return IdentityTransition::SignedIn { applied: false };
        };

        tracing::info!("Loading cloud state for {}", user.label());
        match self.load_and_apply(remote, &user.id, generation).await {
            Ok(transition) => transition,
            Err(error) => {
                tracing::warn!("Failed to load cloud state for {}: {}", user.id, error);
                self.status.report(&error);
                IdentityTransition::SignedIn { applied: false }
            }
        }
    }

    /// Pull and apply the signed-in identity's cloud document.
    pub async fn pull(&self) -> Result<bool> {
        let (uid, generation) = {
            let session = self.lock_session();
            let uid = session.identity.as_ref().map(|user| user.id.clone());
            (uid, session.generation)
        };
        let (Some(uid), Some(remote)) = (uid, &self.remote) else {
            return Err(Error::Unavailable("Sign in to sync with the cloud".to_string()));
        };
        let transition = self.load_and_apply(remote, &uid, generation).await?;
        Ok(transition == IdentityTransition::SignedIn { applied: true })
    }

    async fn load_and_apply(
        &self,
        remote: &Remote<D, O, P>,
        uid: &str,
        generation: u64,
    ) -> Result<IdentityTransition> {
        let Some(remote_state) = remote.synchronizer.pull(uid).await? else {
            tracing::debug!("No cloud state stored for {} yet", uid);
            return Ok(IdentityTransition::SignedIn { applied: false });
        };

        let state = {
            let mut session = self.lock_session();
            if session.generation != generation {
                tracing::debug!("Dropping cloud state for {}: identity changed", uid);
                return Ok(IdentityTransition::Superseded);
            }
            apply_remote_state(&mut session.state, remote_state);
            session.state.clone()
        };

        self.countdown
            .load(state.timer_default_seconds, state.timer_remaining_seconds);
        self.persist_all(&state);
        Ok(IdentityTransition::SignedIn { applied: true })
    }

    pub fn identity(&self) -> Option<AuthUser> {
        self.lock_session().identity.clone()
    }

    /// Signed-in identity ID when remote operations are enabled.
    pub fn remote_uid(&self) -> Option<String> {
        self.remote.as_ref()?;
        self.identity().map(|user| user.id)
    }

    pub fn state(&self) -> AppState {
        self.lock_session().state.clone()
    }

    /// Mutate the app state and return the updated snapshot.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut AppState) -> R) -> (R, AppState) {
        let mut session = self.lock_session();
        let result = mutate(&mut session.state);
        (result, session.state.clone())
    }

    pub fn synchronizer(&self) -> Option<&StateSynchronizer<D, O>> {
        self.remote.as_ref().map(|remote| &remote.synchronizer)
    }

    pub fn gateway(&self) -> Option<&RemoteGateway<D, O>> {
        self.synchronizer().map(StateSynchronizer::gateway)
    }

    pub fn provider(&self) -> Option<&Arc<P>> {
        self.remote.as_ref().map(|remote| &remote.provider)
    }

    pub const fn snapshots(&self) -> &Arc<LocalSnapshotStore> {
        &self.snapshots
    }

    pub const fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub const fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub const fn status(&self) -> &StatusLine {
        &self.status
    }

    /// Write every locally persisted value; failures are logged.
    pub fn persist_all(&self, state: &AppState) {
        let snapshots = &self.snapshots;
        let results = [
            snapshots.save_notes(&state.notes),
            snapshots.save_attachments(&state.note_attachments),
            snapshots.save_timer(StoredTimer {
                default_seconds: state.timer_default_seconds,
                remaining_seconds: state.timer_remaining_seconds,
            }),
            snapshots.save_canvas(&state.canvas_image),
            snapshots.save_share_id(ShareKind::Note, state.shared_note_id.as_ref()),
            snapshots.save_share_id(ShareKind::Canvas, state.shared_canvas_id.as_ref()),
        ];
        for error in results.into_iter().filter_map(std::result::Result::err) {
            tracing::warn!("Failed to persist local snapshot: {}", error);
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rebuild app state from the local snapshot store.
pub fn load_local_state(snapshots: &LocalSnapshotStore) -> AppState {
    let mut state = blank_state();
    if let Some(notes) = snapshots.load_notes() {
        state.notes = notes;
    }
    if let Some(attachments) = snapshots.load_attachments() {
        state.note_attachments = attachments;
    }
    if let Some(timer) = snapshots.load_timer() {
        let timer = TimerState::stopped(timer.default_seconds, timer.remaining_seconds);
        state.timer_default_seconds = timer.default_seconds;
        state.timer_remaining_seconds = timer.remaining_seconds;
    }
    if let Some(canvas) = snapshots.load_canvas() {
        state.canvas_image = canvas;
    }
    state.shared_note_id = snapshots.load_share_id(ShareKind::Note);
    state.shared_canvas_id = snapshots.load_share_id(ShareKind::Canvas);
    state
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::auth::MemoryIdentityProvider;
    use crate::remote::{DocumentPath, MemoryDocumentStore, APP_STATE_COLLECTION};
    use crate::storage::MemoryObjectStore;

    type TestController =
        SessionController<MemoryDocumentStore, MemoryObjectStore, MemoryIdentityProvider>;

    struct Harness {
        controller: Arc<TestController>,
        provider: Arc<MemoryIdentityProvider>,
        documents: MemoryDocumentStore,
    }

    fn harness() -> Harness {
        let snapshots = Arc::new(LocalSnapshotStore::open_in_memory().unwrap());
        let provider = Arc::new(MemoryIdentityProvider::new());
        let documents = MemoryDocumentStore::new();
        let gateway = RemoteGateway::new(documents.clone(), MemoryObjectStore::new("https://f"));
        let controller = Arc::new(SessionController::new(
            snapshots,
            Arc::clone(&provider),
            gateway,
        ));
        Harness {
            controller,
            provider,
            documents,
        }
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: None,
        }
    }

    fn seed_cloud(documents: &MemoryDocumentStore, uid: &str, value: serde_json::Value) {
        documents.insert_raw(
            DocumentPath::new(APP_STATE_COLLECTION, uid),
            value.as_object().cloned().unwrap(),
        );
    }

    #[tokio::test]
    async fn sign_in_applies_cloud_state_and_persists_it() {
        let h = harness();
        seed_cloud(
            &h.documents,
            "u1",
            json!({"notes": "cloud notes", "timerDefaultSeconds": 300, "timerRemainingSeconds": 900}),
        );

        let transition = h.controller.handle_identity(Some(user("u1"))).await;
        assert_eq!(transition, IdentityTransition::SignedIn { applied: true });

        let state = h.controller.state();
        assert_eq!(state.notes, "cloud notes");
        assert_eq!(state.timer_remaining_seconds, 300);
        assert_eq!(h.controller.countdown().snapshot().remaining_seconds, 300);
        assert_eq!(
            h.controller.snapshots().load_notes().as_deref(),
            Some("cloud notes")
        );
    }

    #[tokio::test]
    async fn same_identity_is_not_reloaded() {
        let h = harness();
        h.controller.handle_identity(Some(user("u1"))).await;
        let reads = h.documents.read_count();

        assert_eq!(
            h.controller.handle_identity(Some(user("u1"))).await,
            IdentityTransition::Unchanged
        );
        assert_eq!(h.documents.read_count(), reads);
    }

    #[tokio::test]
    async fn switching_identity_reruns_load_and_apply() {
        let h = harness();
        seed_cloud(&h.documents, "u1", json!({"notes": "first"}));
        seed_cloud(&h.documents, "u2", json!({"notes": "second"}));

        h.controller.handle_identity(Some(user("u1"))).await;
        assert_eq!(h.controller.state().notes, "first");

        let transition = h.controller.handle_identity(Some(user("u2"))).await;
        assert_eq!(transition, IdentityTransition::SignedIn { applied: true });
        assert_eq!(h.controller.state().notes, "second");
        assert_eq!(h.controller.remote_uid().as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn unavailable_cloud_keeps_local_state_and_reports_status() {
        let h = harness();
        h.controller.update(|state| state.notes = "local".to_string());
        h.documents.set_offline(true);

        let transition = h.controller.handle_identity(Some(user("u1"))).await;
        assert_eq!(transition, IdentityTransition::SignedIn { applied: false });
        assert_eq!(h.controller.state().notes, "local");
        assert_eq!(
            h.controller.status().take().as_deref(),
            Some("Cloud sync unavailable. Changes saved locally.")
        );
    }

    #[tokio::test]
    async fn sign_out_disables_remote_operations() {
        let h = harness();
        h.controller.handle_identity(Some(user("u1"))).await;
        assert_eq!(
            h.controller.handle_identity(None).await,
            IdentityTransition::SignedOut
        );
        assert_eq!(h.controller.remote_uid(), None);
        assert!(matches!(h.controller.pull().await, Err(Error::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn identity_change_cancels_pending_debounced_push() {
        let h = harness();
        h.controller.handle_identity(Some(user("u1"))).await;
        h.controller.debouncer().schedule(async {});
        assert!(h.controller.debouncer().is_pending());

        h.controller.handle_identity(Some(user("u2"))).await;
        assert!(!h.controller.debouncer().is_pending());
    }

    #[tokio::test]
    async fn bind_follows_provider_changes_once() {
        let h = harness();
        seed_cloud(&h.documents, "u1", json!({"notes": "bound"}));
        let task = h.controller.bind().unwrap();
        assert!(h.controller.bind().is_err());

        h.provider.set_user(Some(user("u1")));
        for _ in 0..50 {
            if h.controller.state().notes == "bound" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.controller.state().notes, "bound");
        task.abort();
    }

    #[tokio::test]
    async fn local_state_is_restored_from_snapshots() {
        let snapshots = Arc::new(LocalSnapshotStore::open_in_memory().unwrap());
        snapshots.save_notes("saved").unwrap();
        snapshots
            .save_timer(StoredTimer {
                default_seconds: 60,
                remaining_seconds: 600,
            })
            .unwrap();

        let controller: TestController = SessionController::local_only(snapshots);
        let state = controller.state();
        assert_eq!(state.notes, "saved");
        assert_eq!(state.timer_default_seconds, 60);
        assert_eq!(state.timer_remaining_seconds, 60);
        assert_eq!(
            controller.refresh_identity().await,
            IdentityTransition::Unchanged
        );
    }
}
