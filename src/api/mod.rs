//! Read-only access to the Novera REST API.

mod client;
mod models;

pub use client::NoveraClient;
pub use models::{BookmarkStatus, Chapter, Novel, NovelId, UserNovelStatus, parse_timestamp};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Everything the reader needs from the backend.
///
/// Implemented by [`NoveraClient`] over HTTP and by in-memory fakes in tests.
pub trait NovelSource: Send + Sync {
    fn list_novels(&self) -> Result<Vec<Novel>, ApiError>;

    fn get_novel(&self, novel_id: NovelId) -> Result<Novel, ApiError>;

    /// Full, ordered chapter list of a novel.
    fn list_chapters(&self, novel_id: NovelId) -> Result<Vec<Chapter>, ApiError>;

    fn user_statuses(&self, token: &str) -> Result<Vec<UserNovelStatus>, ApiError>;
}
