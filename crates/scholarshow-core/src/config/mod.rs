//! Client configuration.
//!
//! Values come from a profile file and are then overridden by the
//! environment. Everything here is safe to ship except the optional R2
//! credentials, which only belong in a local profile or `.env`.

use serde::{Deserialize, Serialize};

use crate::auth::resolve_optional_supabase_config;
use crate::error::{Error, Result};
use crate::storage::R2Config;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_SHARE_BASE_URL: &str = "SCHOLARSHOW_SHARE_BASE_URL";

/// Supabase project settings once both values are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    /// Origin and path that share links are built on.
    #[serde(default)]
    pub share_base_url: Option<String>,
    #[serde(default)]
    pub r2: Option<R2Config>,
}

impl ClientConfig {
    /// Overlay environment values on top of this configuration.
    #[must_use]
    pub fn with_env_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, current: Option<String>| {
            normalize_text_option(lookup(key)).or(current)
        };
        Self {
            supabase_url: pick(ENV_SUPABASE_URL, self.supabase_url),
            supabase_anon_key: pick(ENV_SUPABASE_ANON_KEY, self.supabase_anon_key),
            share_base_url: pick(ENV_SHARE_BASE_URL, self.share_base_url),
            r2: self.r2,
        }
    }

    /// Trim values, drop empties and validate URLs.
    pub fn normalized(self) -> Result<Self> {
        let supabase_url = normalize_url(self.supabase_url, "supabase_url")?;
        let share_base_url = normalize_url(self.share_base_url, "share_base_url")?;
        let r2 = self.r2.map(R2Config::validated).transpose()?;

        Ok(Self {
            supabase_url,
            supabase_anon_key: normalize_text_option(self.supabase_anon_key),
            share_base_url,
            r2,
        })
    }

    /// Supabase settings, `None` when remote services are not configured.
    pub fn supabase(&self) -> Result<Option<SupabaseSettings>> {
        resolve_optional_supabase_config(self.supabase_url.clone(), self.supabase_anon_key.clone())
            .map(|pair| pair.map(|(url, anon_key)| SupabaseSettings { url, anon_key }))
            .map_err(|_| {
                Error::Invalid(
                    "supabase_url and supabase_anon_key must be set together".to_string(),
                )
            })
    }
}

fn normalize_url(value: Option<String>, field: &str) -> Result<Option<String>> {
    let Some(value) = normalize_text_option(value) else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(Error::Invalid(format!(
            "{field} must include http:// or https://"
        )));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn env_values_override_file_values() {
        let file = ClientConfig {
            supabase_url: Some("https://file.supabase.co".to_string()),
            supabase_anon_key: Some("file-key".to_string()),
            share_base_url: None,
            r2: None,
        };
        let env = HashMap::from([
            (ENV_SUPABASE_URL, "https://env.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "  "),
            (ENV_SHARE_BASE_URL, "https://toolkit.example.com/"),
        ]);

        let config = file.with_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.supabase_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(config.supabase_anon_key.as_deref(), Some("file-key"));
        assert_eq!(
            config.share_base_url.as_deref(),
            Some("https://toolkit.example.com/")
        );
    }

    #[test]
    fn normalized_rejects_non_http_urls() {
        let config = ClientConfig {
            share_base_url: Some("toolkit.example.com".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(config.normalized(), Err(Error::Invalid(_))));
    }

    #[test]
    fn supabase_requires_both_values() {
        let partial = ClientConfig {
            supabase_url: Some("https://x.supabase.co".to_string()),
            ..ClientConfig::default()
        };
        assert!(partial.supabase().is_err());
        assert_eq!(ClientConfig::default().supabase().unwrap(), None);

        let full = ClientConfig {
            supabase_url: Some("https://x.supabase.co".to_string()),
            supabase_anon_key: Some("anon".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(
            full.supabase().unwrap(),
            Some(SupabaseSettings {
                url: "https://x.supabase.co".to_string(),
                anon_key: "anon".to_string(),
            })
        );
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = serde_json::from_str::<ClientConfig>(r#"{"turso_url": "x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
