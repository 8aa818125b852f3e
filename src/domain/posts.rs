//! Post records as fetched from the content API, plus the pure helpers
//! (reading time, display dates) the views are built from.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::richtext::{self, RichTextNode};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:zero] [month repr:short] [year]");

/// Words per minute assumed by the reading-time estimate.
pub const READING_WORDS_PER_MINUTE: usize = 200;

/// Opaque next-page locator minted by the content API. Only the API client
/// interprets it; everyone else passes it along or drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocator(String);

impl PageLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub published_at: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// One page of feed results as returned by a single API call.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPage {
    pub next_page: Option<PageLocator>,
    pub results: Vec<PostSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub id: String,
    pub published_at: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
}

/// Minimal reference used for prev/next navigation links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostNeighbors {
    pub previous: Option<PostRef>,
    pub next: Option<PostRef>,
}

impl ContentBlock {
    /// Words in the block body. Headings do not count.
    pub fn word_count(&self) -> usize {
        richtext::word_count(&self.body)
    }
}

/// Whole minutes to read the given blocks, rounded up. Empty content is 0.
pub fn reading_time_minutes(content: &[ContentBlock]) -> usize {
    let words: usize = content.iter().map(ContentBlock::word_count).sum();
    words.div_ceil(READING_WORDS_PER_MINUTE)
}

pub fn format_human_date(date: OffsetDateTime) -> String {
    date.format(HUMAN_DATE_FORMAT).expect("valid calendar date")
}
