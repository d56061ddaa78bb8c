//! Error types shared across the routing and caching layers.

use thiserror::Error;

use crate::route::ContentType;

/// Errors from the fetch-with-cache pipeline.
///
/// Clonable so a single failed fetch can be observed by every caller sharing
/// the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// The server answered with a non-success status and no cached copy existed.
  #[error("HTTP {status} for {url}")]
  Http { status: u16, url: String },

  /// The network request itself failed and no cached copy existed.
  #[error("network error for {url}: {reason}")]
  Network { url: String, reason: String },

  /// Offline with no cached copy to fall back on.
  #[error("offline and no cached copy for {url}")]
  Offline { url: String },
}

/// Errors surfaced by router navigation and content loading.
#[derive(Debug, Error)]
pub enum RouteError {
  #[error("phase '{phase}' not found in {content_type}")]
  PhaseNotFound {
    content_type: ContentType,
    phase: String,
  },

  #[error("subsection '{subsection}' not found in {content_type}/{phase}")]
  SubsectionNotFound {
    content_type: ContentType,
    phase: String,
    subsection: String,
  },

  #[error("unsupported language '{0}'")]
  UnsupportedLanguage(String),

  /// Content fetched fine but did not have the expected shape.
  #[error("malformed content: {0}")]
  Content(String),

  #[error(transparent)]
  Fetch(#[from] FetchError),
}
