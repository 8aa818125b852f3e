//! Port to the headless content API. The HTTP client in `infra::content`
//! implements it; tests substitute in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::posts::{PageLocator, PostDetail, PostPage, PostRef};

/// Which chronological neighbor of a post to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborDirection {
    /// The most recently published post strictly before the anchor.
    Before,
    /// The earliest published post strictly after the anchor.
    After,
}

#[async_trait]
pub trait ContentApi: Send + Sync {
    /// First page of the feed, newest posts first.
    async fn first_page(&self, page_size: u32) -> Result<PostPage, ApiError>;

    /// Dereference a next-page locator returned by an earlier call.
    async fn next_page(&self, locator: &PageLocator) -> Result<PostPage, ApiError>;

    /// Full post document, or `None` when the id is unknown upstream.
    async fn post(&self, id: &str) -> Result<Option<PostDetail>, ApiError>;

    /// Chronological neighbor relative to a publication instant.
    async fn neighbor(
        &self,
        published_at: OffsetDateTime,
        direction: NeighborDirection,
    ) -> Result<Option<PostRef>, ApiError>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("content api request failed: {0}")]
    Transport(String),
    #[error("content api returned status {status} for `{path}`")]
    Status { status: u16, path: String },
    #[error("content api response could not be decoded: {0}")]
    Decode(String),
    #[error("page locator does not belong to the configured content api: `{0}`")]
    ForeignLocator(String),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}
