//! Supabase auth client and the identity provider built on it.

use std::sync::{Mutex, PoisonError};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::watch;

use super::{
    unix_timestamp_now, validate_credentials, AccessTokenCell, AuthError, AuthResult,
    AuthSession, AuthUser, IdentityProvider, SessionPersistence, SignUpOutcome,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Register an account. `Ok(None)` means email confirmation is pending.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<AuthSession>> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let session = self.send_auth_request(request).await?.into_session()?;
        if let Some(session) = &session {
            self.store.save_session(session)?;
        }
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        self.token_grant("password", &payload, "Sign-in").await
    }

    /// Exchange an ID token from an external provider for a session.
    pub async fn sign_in_with_id_token(
        &self,
        provider: &str,
        id_token: &str,
    ) -> AuthResult<AuthSession> {
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(AuthError::Api("Identity provider is required".to_string()));
        }
        if id_token.trim().is_empty() {
            return Err(AuthError::Api("ID token is required".to_string()));
        }

        let payload = serde_json::json!({
            "provider": provider,
            "id_token": id_token.trim(),
        });
        self.token_grant("id_token", &payload, "Federated sign-in").await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        self.token_grant("refresh_token", &payload, "Refresh").await
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }

    /// Drop the persisted session without contacting the server.
    pub fn forget_session(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        payload: &serde_json::Value,
        action: &str,
    ) -> AuthResult<AuthSession> {
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", grant_type)])
                .json(payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api(format!("{action} response did not include an active session"))
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }
}

/// [`IdentityProvider`] backed by Supabase auth.
///
/// The access token of the active session is written into the shared
/// [`AccessTokenCell`] so the document store authenticates as the user.
pub struct SupabaseIdentityProvider<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    access_token: AccessTokenCell,
    session: Mutex<Option<AuthSession>>,
    user_tx: watch::Sender<Option<AuthUser>>,
}

impl<S: SessionPersistence> SupabaseIdentityProvider<S> {
    pub fn new(client: SupabaseAuthClient<S>, access_token: AccessTokenCell) -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            client,
            access_token,
            session: Mutex::new(None),
            user_tx,
        }
    }

    fn activate(&self, session: AuthSession) -> AuthUser {
        let user = session.user.clone();
        self.access_token.set(Some(session.access_token.clone()));
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        tracing::info!("Signed in as {}", user.label());
        self.user_tx.send_replace(Some(user.clone()));
        user
    }

    fn deactivate(&self) -> Option<AuthSession> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.access_token.set(None);
        self.user_tx.send_replace(None);
        session
    }
}

impl<S: SessionPersistence> IdentityProvider for SupabaseIdentityProvider<S> {
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.user_tx.subscribe()
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.user_tx.borrow().clone()
    }

    async fn restore(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self
            .client
            .restore_session()
            .await?
            .map(|session| self.activate(session)))
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        Ok(match self.client.sign_up(email, password).await? {
            Some(session) => SignUpOutcome::SignedIn(self.activate(session)),
            None => SignUpOutcome::ConfirmationRequired,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let session = self.client.sign_in(email, password).await?;
        Ok(self.activate(session))
    }

    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> AuthResult<AuthUser> {
        let session = self.client.sign_in_with_id_token(provider, id_token).await?;
        Ok(self.activate(session))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let session = self.deactivate();
        let Some(session) = session.or(self.client.store.load_session()?) else {
            return Ok(());
        };

        if let Err(error) = self.client.sign_out(&session.access_token).await {
            tracing::warn!("Remote sign-out failed, clearing local session: {}", error);
            self.client.forget_session()?;
        }
        tracing::info!("Signed out");
        Ok(())
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

/// Both values present → configured; both absent → local-only; otherwise an error.
pub fn resolve_optional_supabase_config(
    url: Option<String>,
    anon_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    let url = normalize_text_option(url);
    let anon_key = normalize_text_option(anon_key);

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|s| s.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|s| s.refresh_token.clone()));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|s| s.expires_at))
            .or_else(|| {
                self.expires_in
                    .or_else(|| nested.as_ref().and_then(|s| s.expires_in))
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            });
        let user = self
            .user
            .or_else(|| nested.and_then(|s| s.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: normalize_text_option(value.email),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn partial_supabase_config_is_rejected() {
        assert!(matches!(
            resolve_optional_supabase_config(Some("https://x.supabase.co".to_string()), None),
            Err(AuthError::NotConfigured)
        ));
        assert!(resolve_optional_supabase_config(None, Some(" ".to_string()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn response_without_session_fields_means_confirmation_required() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{"user": {"id": "user", "email": "user@example.com"}}"#,
        )
        .unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn nested_session_fields_are_accepted() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{"session": {"access_token": "a", "refresh_token": "r", "expires_in": 3600,
                "user": {"id": "u1", "email": ""}}}"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.email, None);
        assert!(!session.is_expired());
    }

    #[test]
    fn parse_api_error_prefers_message_fields() {
        assert_eq!(
            parse_api_error(
                StatusCode::BAD_REQUEST,
                r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#
            ),
            "Invalid login credentials (400)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[tokio::test]
    async fn id_token_sign_in_validates_input_before_request() {
        let client = SupabaseAuthClient::new(
            "https://demo.supabase.co",
            "anon",
            MemorySessionStore::default(),
        )
        .unwrap();
        assert!(matches!(
            client.sign_in_with_id_token("google", " ").await,
            Err(AuthError::Api(_))
        ));
        assert!(matches!(
            client.sign_in_with_id_token("", "token").await,
            Err(AuthError::Api(_))
        ));
    }

    #[tokio::test]
    async fn restore_activates_persisted_session() {
        let store = MemorySessionStore::default();
        store
            .save_session(&AuthSession {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: unix_timestamp_now() + 3600,
                user: AuthUser {
                    id: "u1".to_string(),
                    email: None,
                },
            })
            .unwrap();
        let tokens = AccessTokenCell::default();
        let provider = SupabaseIdentityProvider::new(
            SupabaseAuthClient::new("https://demo.supabase.co", "anon", store).unwrap(),
            tokens.clone(),
        );
        let changes = provider.subscribe();

        let user = provider.restore().await.unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(tokens.get().as_deref(), Some("access"));
        assert_eq!(changes.borrow().as_ref().map(|u| u.id.as_str()), Some("u1"));
    }
}
