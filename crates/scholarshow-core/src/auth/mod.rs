//! Identity provider integration.
//!
//! The session controller only sees the [`IdentityProvider`] trait and its
//! single change channel. Supabase is the production backend; the memory
//! provider backs tests and offline runs.

mod memory;
mod supabase;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use memory::{MemoryIdentityProvider, MemorySessionStore};
pub use supabase::{
    normalize_auth_url, resolve_optional_supabase_config, SupabaseAuthClient,
    SupabaseIdentityProvider,
};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

impl AuthUser {
    /// Email when known, otherwise the identity ID.
    pub fn label(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthUser),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Bearer token of the signed-in user, shared with the document store.
#[derive(Clone, Default)]
pub struct AccessTokenCell(Arc<RwLock<Option<String>>>);

impl AccessTokenCell {
    pub fn get(&self) -> Option<String> {
        self.0.read().ok().and_then(|token| token.clone())
    }

    pub fn set(&self, token: Option<String>) {
        if let Ok(mut slot) = self.0.write() {
            *slot = token;
        }
    }
}

impl fmt::Debug for AccessTokenCell {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.get().is_some() { "[REDACTED]" } else { "None" };
        formatter.debug_tuple("AccessTokenCell").field(&state).finish()
    }
}

/// Opaque authentication capability.
///
/// Every change of the signed-in identity is published on the channel
/// returned by [`IdentityProvider::subscribe`]; credential failures carry
/// the provider's own message.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Change notifications for the signed-in identity.
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Resume a persisted session, refreshing it when expired.
    fn restore(&self) -> impl Future<Output = AuthResult<Option<AuthUser>>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<SignUpOutcome>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<AuthUser>> + Send;

    /// Federated sign-in with an ID token issued by `provider` (e.g. `google`).
    fn sign_in_with_id_token(
        &self,
        provider: &str,
        id_token: &str,
    ) -> impl Future<Output = AuthResult<AuthUser>> + Send;

    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(session.is_expired());
    }

    #[test]
    fn access_token_cell_is_shared_between_clones() {
        let cell = AccessTokenCell::default();
        let other = cell.clone();
        cell.set(Some("token".to_string()));
        assert_eq!(other.get().as_deref(), Some("token"));
        assert_eq!(format!("{other:?}"), "AccessTokenCell(\"[REDACTED]\")");

        other.set(None);
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn validate_credentials_requires_both_fields() {
        assert!(validate_credentials("", "pw").is_err());
        assert!(validate_credentials("a@b.c", " ").is_err());
        assert!(validate_credentials("a@b.c", "pw").is_ok());
    }

    #[test]
    fn user_label_prefers_email() {
        let user = AuthUser {
            id: "u1".to_string(),
            email: Some("a@b.c".to_string()),
        };
        assert_eq!(user.label(), "a@b.c");
        let user = AuthUser {
            id: "u1".to_string(),
            email: None,
        };
        assert_eq!(user.label(), "u1");
    }
}
