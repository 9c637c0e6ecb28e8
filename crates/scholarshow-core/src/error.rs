//! Error types for scholarshow-core

use thiserror::Error;

/// Result type alias using scholarshow-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scholarshow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote services are unreachable or not configured
    #[error("Cloud services are unavailable: {0}")]
    Unavailable(String),

    /// Target entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requester does not own the target entity
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed identifier or out-of-range input
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Local snapshot database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote document store rejected a request
    #[error("Remote error: {0}")]
    Remote(String),
}

impl Error {
    /// Short, user-facing status text for a failed remote operation.
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::Unavailable(_) => "Cloud sync unavailable. Changes saved locally.".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::PermissionDenied(message) | Self::Invalid(message) => message.clone(),
            other => format!("Sync failed: {}", crate::util::compact_text(&other.to_string())),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Remote(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_for_unavailable_mentions_local_save() {
        let error = Error::Unavailable("offline".to_string());
        assert!(error.status_text().contains("saved locally"));
    }

    #[test]
    fn status_text_passes_permission_message_through() {
        let error = Error::PermissionDenied("You can only unshare notes you own.".to_string());
        assert_eq!(error.status_text(), "You can only unshare notes you own.");
    }
}
