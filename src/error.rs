use thiserror::Error;

use crate::dom::SelectorError;

/// Errors that abort a feed run.
///
/// Per-item OGP failures never show up here; they are absorbed by
/// [`crate::ogp::fetch_ogp`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed URL has no hostname: {0}")]
    MissingHostname(String),

    #[error("Media not found for hostname '{hostname}'")]
    MediaNotFound { hostname: String },

    /// The feed server answered with a non-success status.
    #[error("Error fetching RSS feed: {0}")]
    FeedStatus(String),

    #[error("Error fetching RSS feed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
