use std::io;

use scholarshow_core::auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] scholarshow_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("The canvas is empty")]
    EmptyCanvas,
    #[error("{0} is not a PNG image")]
    NotPng(String),
    #[error("Attachment numbers start at 1")]
    InvalidAttachmentNumber,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Share(String),
    #[error("Cloud services are not configured. Run `scholarshow config init --supabase-url <url> --supabase-anon-key <key>`.")]
    RemoteNotConfigured,
}
