//! In-process identity provider and session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use super::{
    validate_credentials, AuthError, AuthResult, AuthSession, AuthUser, IdentityProvider,
    SessionPersistence, SignUpOutcome,
};

/// Session persistence that lives only as long as the process.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

struct Account {
    password: String,
    user: AuthUser,
}

/// Email/password accounts held in memory.
///
/// Federated sign-in accepts any non-empty token and derives a stable
/// identity from it.
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    user_tx: watch::Sender<Option<AuthUser>>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            user_tx,
        }
    }

    /// Register an account with a fixed identity ID.
    pub fn add_account(&self, email: &str, password: &str, uid: &str) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.trim().to_lowercase(),
                Account {
                    password: password.to_string(),
                    user: AuthUser {
                        id: uid.to_string(),
                        email: Some(email.trim().to_string()),
                    },
                },
            );
    }

    /// Force the signed-in identity, publishing the change.
    pub fn set_user(&self, user: Option<AuthUser>) {
        self.user_tx.send_replace(user);
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.user_tx.subscribe()
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.user_tx.borrow().clone()
    }

    async fn restore(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self.current_user())
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;
        let key = email.trim().to_lowercase();
        let user = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&key) {
                return Err(AuthError::Api("User already registered".to_string()));
            }
            let user = AuthUser {
                id: Uuid::now_v7().to_string(),
                email: Some(email.trim().to_string()),
            };
            accounts.insert(
                key,
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );
            user
        };
        self.set_user(Some(user.clone()));
        Ok(SignUpOutcome::SignedIn(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        validate_credentials(email, password)?;
        let user = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            match accounts.get(&email.trim().to_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(AuthError::Api("Invalid login credentials".to_string())),
            }
        };
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> AuthResult<AuthUser> {
        let id_token = id_token.trim();
        if provider.trim().is_empty() || id_token.is_empty() {
            return Err(AuthError::Api("ID token is required".to_string()));
        }
        let user = AuthUser {
            id: format!("{}:{id_token}", provider.trim()),
            email: None,
        };
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.set_user(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_publishes_identity_changes() {
        let provider = MemoryIdentityProvider::new();
        provider.add_account("a@b.c", "pw", "u1");
        let mut changes = provider.subscribe();

        let user = provider.sign_in("A@B.C", "pw").await.unwrap();
        assert_eq!(user.id, "u1");
        assert!(changes.has_changed().unwrap());
        assert_eq!(
            changes.borrow_and_update().as_ref().map(|u| u.id.clone()),
            Some("u1".to_string())
        );

        provider.sign_out().await.unwrap();
        assert!(changes.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn wrong_password_surfaces_provider_message() {
        let provider = MemoryIdentityProvider::new();
        provider.add_account("a@b.c", "pw", "u1");
        let error = provider.sign_in("a@b.c", "nope").await.unwrap_err();
        assert_eq!(error.to_string(), "Invalid login credentials");
        assert!(provider.current_user().is_none());
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let provider = MemoryIdentityProvider::new();
        let outcome = provider.sign_up("new@b.c", "pw").await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
        assert!(provider.sign_up("new@b.c", "pw").await.is_err());
    }

    #[test]
    fn session_store_roundtrip() {
        let store = MemorySessionStore::default();
        assert!(store.load_session().unwrap().is_none());
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 0,
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
            },
        };
        store.save_session(&session).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session));
        store.clear_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
    }
}
