//! Share links and their resolution into viewable content.
//!
//! A share link is `<base>#share/<id>`. Links written by older clients use
//! `#shared/<id>` and are still accepted.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};
use crate::models::{ShareId, ShareItem};
use crate::remote::{DocumentStore, RemoteGateway};
use crate::storage::ObjectStore;

const SHARE_PREFIX: &str = "share/";
const LEGACY_SHARE_PREFIX: &str = "shared/";

/// Why a navigation did not end in displayable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareFailure {
    /// Remote services are not available in this session.
    Unavailable,
    /// The fragment carried no usable ID.
    Invalid(String),
    /// The item does not exist or was unshared.
    Gone,
    /// The fetch itself failed.
    LoadFailed(String),
}

impl fmt::Display for ShareFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("Sharing is unavailable right now."),
            Self::Invalid(message) => write!(f, "Invalid share link: {message}"),
            Self::Gone => f.write_str("This shared item does not exist or was unshared."),
            Self::LoadFailed(message) => write!(f, "Could not load shared item: {message}"),
        }
    }
}

/// Resolver state for the current navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareView {
    Idle,
    Loading(ShareId),
    Displaying(ShareItem),
    Error(ShareFailure),
}

/// Extract the share ID from a fragment or full link.
///
/// Returns `None` when the input does not address shared content at all and
/// `Some(Err(_))` when it does but the ID is missing or malformed.
pub fn parse_share_fragment(input: &str) -> Option<Result<ShareId>> {
    let input = input.trim();
    let fragment = match Url::parse(input) {
        Ok(url) => url.fragment()?.to_string(),
        Err(_) => input.trim_start_matches('#').to_string(),
    };

    let raw_id = fragment
        .strip_prefix(SHARE_PREFIX)
        .or_else(|| fragment.strip_prefix(LEGACY_SHARE_PREFIX))?;
    Some(ShareId::parse(raw_id))
}

/// Build the navigable link for a share.
///
/// Without a base URL only the fragment is returned.
pub fn share_link(base_url: Option<&str>, id: &ShareId) -> Result<String> {
    let fragment = format!("{SHARE_PREFIX}{id}");
    let Some(base_url) = base_url else {
        return Ok(format!("#{fragment}"));
    };

    let mut url = Url::parse(base_url.trim())
        .map_err(|error| Error::Invalid(format!("Invalid share base URL '{base_url}': {error}")))?;
    url.set_fragment(Some(&fragment));
    Ok(url.into())
}

/// Maps share fragments to content items, independent of sign-in.
pub struct ShareResolver<D, O> {
    gateway: Option<RemoteGateway<D, O>>,
    view: ShareView,
}

impl<D: DocumentStore, O: ObjectStore> ShareResolver<D, O> {
    /// `gateway` is `None` when remote services are not configured.
    pub const fn new(gateway: Option<RemoteGateway<D, O>>) -> Self {
        Self {
            gateway,
            view: ShareView::Idle,
        }
    }

    pub const fn view(&self) -> &ShareView {
        &self.view
    }

    /// Resolve a new fragment, discarding whatever the previous one showed.
    pub async fn navigate(&mut self, fragment: &str) -> &ShareView {
        self.view = ShareView::Idle;
        let Some(parsed) = parse_share_fragment(fragment) else {
            return &self.view;
        };

        let Some(gateway) = &self.gateway else {
            self.view = ShareView::Error(ShareFailure::Unavailable);
            return &self.view;
        };

        let id = match parsed {
            Ok(id) => id,
            Err(error) => {
                self.view = ShareView::Error(ShareFailure::Invalid(error.status_text()));
                return &self.view;
            }
        };

        self.view = ShareView::Loading(id.clone());
        tracing::debug!("Resolving shared item {}", id);
        self.view = match gateway.get_share_item(&id).await {
            Ok(Some(item)) => ShareView::Displaying(item),
            Ok(None) => ShareView::Error(ShareFailure::Gone),
            Err(error) => {
                tracing::warn!("Failed to load shared item {}: {}", id, error);
                ShareView::Error(ShareFailure::LoadFailed(error.status_text()))
            }
        };
        &self.view
    }
}
