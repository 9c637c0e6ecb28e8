//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scholarshow_core::config::ClientConfig;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV: &str = "SCHOLARSHOW_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ClientConfig>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("scholarshow").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config
            .normalized()
            .map_err(|error| format!("Invalid config at {}: {}", path.display(), error))
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let normalized = self.clone().normalized()?;
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `SCHOLARSHOW_PROFILE`, then the active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(PROFILE_ENV).ok())
    }

    pub fn resolve_profile_name_with(
        &self,
        explicit: Option<&str>,
        env_profile: Option<String>,
    ) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(env_profile.as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&ClientConfig> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut ClientConfig {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalized(self) -> Result<Self, String> {
        let profiles = self
            .profiles
            .into_iter()
            .map(|(name, profile)| {
                profile
                    .normalized()
                    .map(|profile| (name, profile))
                    .map_err(|error| error.to_string())
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            version: self.version,
            active_profile: normalize_profile_name(self.active_profile.as_deref()),
            profiles,
        })
    }
}
