use std::sync::Arc;

use thiserror::Error;

use crate::application::content::{ApiError, ContentApi, NeighborDirection};
use crate::application::pagination::{FeedCursor, PaginationError};
use crate::application::render;
use crate::domain::posts::{self, PageLocator, PostDetail, PostNeighbors, PostPage, PostSummary};
use crate::presentation::views::{
    NeighborLink, PageContext, PostBodySection, PostCard, PostDetailContext,
};

/// Outcome of a [`PostFeed::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A further page was fetched; this many posts were appended.
    Appended(usize),
    /// The feed had no next page, so nothing was fetched.
    Exhausted,
}

/// A monotonically growing list of post summaries, fed page by page from the
/// content API.
///
/// A failed fetch leaves the feed exactly as it was, so the same step can be
/// retried later.
#[derive(Debug, Clone)]
pub struct PostFeed {
    posts: Vec<PostSummary>,
    next_page: Option<PageLocator>,
}

impl PostFeed {
    pub fn from_page(page: PostPage) -> Self {
        Self {
            posts: page.results,
            next_page: page.next_page,
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    pub async fn load_more(&mut self, api: &dyn ContentApi) -> Result<LoadOutcome, ApiError> {
        let Some(locator) = self.next_page.as_ref() else {
            return Ok(LoadOutcome::Exhausted);
        };

        let page = api.next_page(locator).await?;
        let appended = page.results.len();
        self.posts.extend(page.results);
        self.next_page = page.next_page;
        Ok(LoadOutcome::Appended(appended))
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

#[derive(Clone)]
pub struct FeedService {
    api: Arc<dyn ContentApi>,
    page_size: u32,
}

impl FeedService {
    pub fn new(api: Arc<dyn ContentApi>, page_size: u32) -> Self {
        Self { api, page_size }
    }

    pub async fn front_page(&self) -> Result<PostPage, FeedError> {
        Ok(self.api.first_page(self.page_size).await?)
    }

    pub async fn page_after(&self, cursor: &str) -> Result<PostPage, FeedError> {
        let cursor = FeedCursor::decode(cursor)?;
        Ok(self.api.next_page(cursor.locator()).await?)
    }

    pub fn page_context(&self, page: &PostPage) -> PageContext {
        let cards: Vec<PostCard> = page.results.iter().map(summary_to_card).collect();
        let post_count = cards.len();
        PageContext {
            posts: cards,
            post_count,
            has_results: post_count > 0,
            next_cursor: page
                .next_page
                .as_ref()
                .map(|locator| FeedCursor::new(locator).encode()),
        }
    }

    pub async fn post_detail(&self, id: &str) -> Result<Option<PostDetailContext>, FeedError> {
        let Some(post) = self.api.post(id).await? else {
            return Ok(None);
        };

        let neighbors = self.load_neighbors(&post).await?;
        Ok(Some(build_post_context(post, neighbors)))
    }

    async fn load_neighbors(&self, post: &PostDetail) -> Result<PostNeighbors, FeedError> {
        let Some(published_at) = post.published_at else {
            return Ok(PostNeighbors::default());
        };

        let previous = self
            .api
            .neighbor(published_at, NeighborDirection::Before)
            .await?;
        let next = self
            .api
            .neighbor(published_at, NeighborDirection::After)
            .await?;
        Ok(PostNeighbors { previous, next })
    }
}

fn summary_to_card(summary: &PostSummary) -> PostCard {
    PostCard {
        id: summary.id.clone(),
        title: summary.title.clone(),
        subtitle: summary.subtitle.clone(),
        author: summary.author.clone(),
        published_label: summary.published_at.map(posts::format_human_date),
    }
}

fn build_post_context(post: PostDetail, neighbors: PostNeighbors) -> PostDetailContext {
    let reading_minutes = posts::reading_time_minutes(&post.content);
    let published_label = post.published_at.map(posts::format_human_date);

    let body = post
        .content
        .iter()
        .map(|block| PostBodySection {
            heading: block.heading.clone(),
            body_html: render::render_document(&block.body),
        })
        .collect();

    PostDetailContext {
        id: post.id,
        title: post.title,
        subtitle: post.subtitle,
        author: post.author,
        banner_url: post.banner_url,
        published_label,
        reading_minutes,
        body,
        previous: neighbors.previous.map(NeighborLink::from_ref),
        next: neighbors.next.map(NeighborLink::from_ref),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::posts::PostRef;
    use crate::domain::richtext::{RichTextNode, TextSpan};

    #[derive(Default)]
    struct ScriptedApi {
        next_pages: Mutex<VecDeque<Result<PostPage, ApiError>>>,
        next_calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn push(&self, step: Result<PostPage, ApiError>) {
            self.next_pages.lock().unwrap().push_back(step);
        }
    }

    #[async_trait]
    impl ContentApi for ScriptedApi {
        async fn first_page(&self, _page_size: u32) -> Result<PostPage, ApiError> {
            unreachable!("first_page is not scripted in these tests")
        }

        async fn next_page(&self, _locator: &PageLocator) -> Result<PostPage, ApiError> {
            self.next_calls.fetch_add(1, Ordering::SeqCst);
            self.next_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transport("script exhausted")))
        }

        async fn post(&self, _id: &str) -> Result<Option<PostDetail>, ApiError> {
            Ok(None)
        }

        async fn neighbor(
            &self,
            _published_at: OffsetDateTime,
            _direction: NeighborDirection,
        ) -> Result<Option<PostRef>, ApiError> {
            Ok(None)
        }
    }

    fn summary(id: &str) -> PostSummary {
        PostSummary {
            id: id.to_string(),
            published_at: Some(OffsetDateTime::UNIX_EPOCH),
            title: format!("Title {id}"),
            subtitle: format!("Subtitle {id}"),
            author: "Ann Author".to_string(),
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> PostPage {
        PostPage {
            next_page: next.map(PageLocator::new),
            results: ids.iter().map(|id| summary(id)).collect(),
        }
    }

    fn feed_ids(feed: &PostFeed) -> Vec<&str> {
        feed.posts().iter().map(|post| post.id.as_str()).collect()
    }

    #[tokio::test]
    async fn load_more_appends_in_feed_order() {
        let api = ScriptedApi::default();
        api.push(Ok(page(&["c", "d"], None)));
        let mut feed = PostFeed::from_page(page(&["a", "b"], Some("page-2")));

        let outcome = feed.load_more(&api).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Appended(2));
        assert_eq!(feed_ids(&feed), ["a", "b", "c", "d"]);
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn exhausted_feed_skips_the_api() {
        let api = ScriptedApi::default();
        let mut feed = PostFeed::from_page(page(&["a"], None));

        let outcome = feed.load_more(&api).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Exhausted);
        assert_eq!(api.next_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_load_leaves_the_feed_unchanged_and_retryable() {
        let api = ScriptedApi::default();
        api.push(Err(ApiError::transport("connection reset")));
        api.push(Ok(page(&["b"], None)));
        let mut feed = PostFeed::from_page(page(&["a"], Some("page-2")));

        let error = feed.load_more(&api).await.unwrap_err();

        assert!(matches!(error, ApiError::Transport(_)));
        assert_eq!(feed_ids(&feed), ["a"]);
        assert!(feed.has_more());

        let outcome = feed.load_more(&api).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Appended(1));
        assert_eq!(feed_ids(&feed), ["a", "b"]);
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn page_context_round_trips_the_next_cursor() {
        let service = FeedService::new(Arc::new(ScriptedApi::default()), 20);
        let context = service.page_context(&page(&["a"], Some("page-2")));

        let cursor = context.next_cursor.expect("cursor for a further page");
        let decoded = FeedCursor::decode(&cursor).unwrap();
        assert_eq!(decoded.locator().as_str(), "page-2");

        let context = service.page_context(&page(&["a"], None));
        assert!(context.next_cursor.is_none());
    }

    #[tokio::test]
    async fn page_after_dereferences_the_decoded_locator() {
        let api = ScriptedApi::default();
        api.push(Ok(page(&["b"], Some("page-3"))));
        let service = FeedService::new(Arc::new(api), 20);

        let cursor = FeedCursor::new(&PageLocator::new("page-2")).encode();
        let fetched = service.page_after(&cursor).await.unwrap();

        assert_eq!(fetched.results.len(), 1);
        assert_eq!(fetched.results[0].id, "b");
        assert_eq!(fetched.next_page, Some(PageLocator::new("page-3")));
    }

    #[tokio::test]
    async fn page_after_rejects_garbage_cursors() {
        let service = FeedService::new(Arc::new(ScriptedApi::default()), 20);

        let error = service.page_after("not a cursor").await.unwrap_err();

        assert!(matches!(error, FeedError::Pagination(_)));
    }

    #[test]
    fn post_context_carries_labels_and_reading_time() {
        let words = (0..420).map(|_| "word").collect::<Vec<_>>().join(" ");
        let post = PostDetail {
            id: "how-to".to_string(),
            published_at: Some(
                OffsetDateTime::UNIX_EPOCH + time::Duration::days(18701), // 15 Mar 2021
            ),
            title: "How to".to_string(),
            subtitle: "A guide".to_string(),
            author: "Ann Author".to_string(),
            banner_url: Some("https://example.com/banner.png".to_string()),
            content: vec![crate::domain::posts::ContentBlock {
                heading: "Part one".to_string(),
                body: vec![RichTextNode::Paragraph {
                    spans: vec![TextSpan::plain(&words)],
                }],
            }],
        };
        let neighbors = PostNeighbors {
            previous: Some(PostRef {
                id: "older".to_string(),
                title: "Older post".to_string(),
            }),
            next: None,
        };

        let context = build_post_context(post, neighbors);

        assert_eq!(context.published_label.as_deref(), Some("15 Mar 2021"));
        assert_eq!(context.reading_minutes, 3);
        assert_eq!(context.body.len(), 1);
        assert!(context.body[0].body_html.starts_with("<p>"));
        assert_eq!(
            context.previous.as_ref().map(|link| link.id.as_str()),
            Some("older")
        );
        assert!(context.next.is_none());
    }
}
