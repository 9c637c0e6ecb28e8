use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use scholarshow_core::auth::AccessTokenCell;
use scholarshow_core::config::ClientConfig;
use scholarshow_core::remote::{RemoteGateway, SupabaseDocumentStore};
use scholarshow_core::snapshot::LocalSnapshotStore;
use scholarshow_core::storage::{R2Config, R2ObjectStore};
use scholarshow_core::Toolkit;

use crate::auth::{identity_provider_for_profile, CliIdentityProvider};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub type CliToolkit = Toolkit<SupabaseDocumentStore, Option<R2ObjectStore>, CliIdentityProvider>;

/// Everything a toolkit command needs.
pub struct App {
    pub profile_name: String,
    pub toolkit: CliToolkit,
}

impl App {
    pub fn require_remote(&self) -> Result<&CliIdentityProvider, CliError> {
        self.toolkit
            .controller()
            .provider()
            .map(Arc::as_ref)
            .ok_or(CliError::RemoteNotConfigured)
    }

    /// Wait for background pushes and surface the last status message.
    pub async fn finish(&self) {
        self.toolkit.flush().await;
        if let Some(status) = self.toolkit.take_status() {
            eprintln!("{status}");
        }
    }
}

pub async fn open_app(profile: Option<&str>, db_path: Option<PathBuf>) -> Result<App, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(profile);
    let config = effective_config(&profiles, &profile_name, |key| env::var(key).ok())?;

    let db_path = resolve_db_path(db_path)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let snapshots = LocalSnapshotStore::open(&db_path)?;

    let toolkit = if let Some(settings) = config.supabase()? {
        let access_token = AccessTokenCell::default();
        let documents =
            SupabaseDocumentStore::new(&settings.url, settings.anon_key.clone(), access_token.clone())?;
        let objects = config.r2.map(R2ObjectStore::new);
        let provider = identity_provider_for_profile(&profile_name, &settings, access_token)?;
        tracing::debug!("Cloud services enabled via profile '{}'", profile_name);
        Toolkit::connected(
            snapshots,
            Arc::new(provider),
            RemoteGateway::new(documents, objects),
            config.share_base_url,
        )
    } else {
        tracing::debug!("No cloud configuration for profile '{}'", profile_name);
        Toolkit::offline(snapshots)
    };
    toolkit.restore_session().await;

    Ok(App {
        profile_name,
        toolkit,
    })
}

/// Profile values overlaid with the environment.
pub fn effective_config(
    profiles: &CliProfilesConfig,
    profile_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, CliError> {
    let file = profiles.profile(profile_name).cloned().unwrap_or_default();
    let mut config = file.with_env_overrides(&lookup).normalized()?;
    if let Some(r2) = R2Config::from_lookup(&lookup)? {
        config.r2 = Some(r2);
    }
    Ok(config)
}

pub fn resolve_text(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_notes_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait".
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_notes_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("scholarshow-notes-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("SCHOLARSHOW_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("scholarshow").join("snapshots.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Guess a MIME type from a file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    })
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
}

/// Shorten `text` to `max_chars`, marking the cut with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
