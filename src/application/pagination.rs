//! Feed cursor: the content API's next-page locator wrapped in an opaque
//! base64url token so it can travel through query strings.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::posts::PageLocator;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeedCursorPayload {
    next_page: String,
}

/// Cursor pointing at the next page of the post feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    next_page: PageLocator,
}

impl FeedCursor {
    pub fn new(locator: &PageLocator) -> Self {
        Self {
            next_page: locator.clone(),
        }
    }

    pub fn locator(&self) -> &PageLocator {
        &self.next_page
    }

    pub fn encode(&self) -> String {
        let payload = FeedCursorPayload {
            next_page: self.next_page.as_str().to_string(),
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing feed cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: FeedCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        if payload.next_page.is_empty() {
            return Err(PaginationError::InvalidCursor(
                "empty page locator".to_string(),
            ));
        }
        Ok(Self {
            next_page: PageLocator::new(payload.next_page),
        })
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
