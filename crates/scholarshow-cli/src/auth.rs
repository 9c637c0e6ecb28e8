//! Supabase session persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use scholarshow_core::auth::{
    AccessTokenCell, AuthError, AuthResult, AuthSession, SessionPersistence, SupabaseAuthClient,
    SupabaseIdentityProvider,
};
use scholarshow_core::config::SupabaseSettings;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "scholarshow-cli";

/// One keychain entry per CLI profile.
#[derive(Clone)]
pub struct KeyringSessionStore {
    username: String,
}

impl KeyringSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub type CliIdentityProvider = SupabaseIdentityProvider<KeyringSessionStore>;

/// Identity provider for `profile_name`, sharing its token with `access_token`.
pub fn identity_provider_for_profile(
    profile_name: &str,
    settings: &SupabaseSettings,
    access_token: AccessTokenCell,
) -> AuthResult<CliIdentityProvider> {
    let client = SupabaseAuthClient::new(
        &settings.url,
        settings.anon_key.clone(),
        KeyringSessionStore::new(profile_name),
    )?;
    Ok(SupabaseIdentityProvider::new(client, access_token))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use scholarshow_core::auth::AuthUser;

    use super::*;

    fn session(token: &str) -> AuthSession {
        AuthSession {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "user".to_string(),
                email: Some("student@example.com".to_string()),
            },
        }
    }

    #[test]
    fn sessions_are_kept_per_profile() {
        let school = KeyringSessionStore::new("auth-test-school");
        let home = KeyringSessionStore::new("auth-test-home");
        school.save_session(&session("school-token")).unwrap();

        assert_eq!(school.load_session().unwrap(), Some(session("school-token")));
        assert_eq!(home.load_session().unwrap(), None);

        school.clear_session().unwrap();
        assert_eq!(school.load_session().unwrap(), None);
        school.clear_session().unwrap();
    }

    #[test]
    fn provider_rejects_non_http_url() {
        let settings = SupabaseSettings {
            url: "project.supabase.co".to_string(),
            anon_key: "anon".to_string(),
        };
        assert!(
            identity_provider_for_profile("auth-test-bad", &settings, AccessTokenCell::default())
                .is_err()
        );
    }
}
