//! JSON documents as the content API serves them, plus their conversions
//! into domain types. Conversion is strict: malformed dates or unknown
//! rich-text nodes fail the whole document.

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::content::ApiError;
use crate::domain::posts::{ContentBlock, PageLocator, PostDetail, PostPage, PostSummary};
use crate::domain::richtext::RichTextNode;

#[derive(Debug, Deserialize)]
pub struct PageDocument {
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub results: Vec<SummaryDocument>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryDocument {
    pub id: String,
    #[serde(default)]
    pub published_at: Option<String>,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct PostDocument {
    pub id: String,
    #[serde(default)]
    pub published_at: Option<String>,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub content: Vec<BlockDocument>,
}

#[derive(Debug, Deserialize)]
pub struct BlockDocument {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub body: Vec<RichTextNode>,
}

fn parse_published_at(raw: Option<String>) -> Result<Option<OffsetDateTime>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    OffsetDateTime::parse(&raw, &Rfc3339)
        .map(Some)
        .map_err(|err| ApiError::decode(format!("invalid published_at `{raw}`: {err}")))
}

impl TryFrom<SummaryDocument> for PostSummary {
    type Error = ApiError;

    fn try_from(document: SummaryDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            published_at: parse_published_at(document.published_at)?,
            id: document.id,
            title: document.title,
            subtitle: document.subtitle,
            author: document.author,
        })
    }
}

impl TryFrom<PageDocument> for PostPage {
    type Error = ApiError;

    fn try_from(document: PageDocument) -> Result<Self, Self::Error> {
        let results = document
            .results
            .into_iter()
            .map(PostSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            next_page: document
                .next_page
                .filter(|locator| !locator.is_empty())
                .map(PageLocator::new),
            results,
        })
    }
}

impl TryFrom<PostDocument> for PostDetail {
    type Error = ApiError;

    fn try_from(document: PostDocument) -> Result<Self, Self::Error> {
        let content = document
            .content
            .into_iter()
            .map(|block| ContentBlock {
                heading: block.heading,
                body: block.body,
            })
            .collect();

        Ok(Self {
            published_at: parse_published_at(document.published_at)?,
            id: document.id,
            title: document.title,
            subtitle: document.subtitle,
            author: document.author,
            banner_url: document.banner_url,
            content,
        })
    }
}
