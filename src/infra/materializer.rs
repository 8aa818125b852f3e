use std::{sync::Arc, time::Instant};

use axum::{http::StatusCode, response::Response};
use dashmap::DashSet;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::{
        content::ContentApi,
        feed::{FeedService, LoadOutcome, PostFeed},
    },
    infra::{
        cache::{CacheStoreError, PageCache, should_store_response},
        http::public::{canonical_url, post_path},
    },
    presentation::views::{
        IndexTemplate, LayoutContext, PostTemplate, SiteChrome, render_template_response,
    },
};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to load feed content: {0}")]
    Feed(String),
    #[error("failed to load post `{id}`: {detail}")]
    PostDetail { id: String, detail: String },
    #[error("failed to store cached response for `{path}`: {source}")]
    Cache {
        path: String,
        #[source]
        source: CacheStoreError,
    },
}

/// Result of resolving a post path against the cache and the content API.
pub enum PostLookup {
    /// A stored or freshly materialized page, ready to serve.
    Found(Response),
    /// The id is absent from both the cache and the API.
    NotFound,
    /// Another request is materializing this path right now.
    Rendering,
}

/// Renders public pages ahead of time and keeps the stored copies fresh.
///
/// Pages live in the [`PageCache`] keyed by request path. A failed refresh
/// keeps the stale copy; a post that vanished upstream evicts its path.
pub struct PageMaterializer {
    cache: PageCache,
    feed: Arc<FeedService>,
    api: Arc<dyn ContentApi>,
    public_url: Url,
    prerender_posts: usize,
    comments_repo: Option<String>,
    in_flight: DashSet<String>,
}

impl PageMaterializer {
    pub fn new(
        cache: PageCache,
        feed: Arc<FeedService>,
        api: Arc<dyn ContentApi>,
        public_url: Url,
        prerender_posts: usize,
        comments_repo: Option<String>,
    ) -> Self {
        Self {
            cache,
            feed,
            api,
            public_url,
            prerender_posts,
            comments_repo,
            in_flight: DashSet::new(),
        }
    }

    /// Materialize the front page plus the first `prerender_posts` posts of
    /// the feed, walking further pages when the first one is too short.
    pub async fn prerender_initial(&self) -> Result<(), MaterializeError> {
        info!(target = "edicola::materializer", "prerendering pages");

        let page = self
            .feed
            .front_page()
            .await
            .map_err(|err| MaterializeError::Feed(err.to_string()))?;
        let content = self.feed.page_context(&page);
        let response = render_template_response(
            IndexTemplate {
                view: LayoutContext::new(self.chrome("/"), content),
            },
            StatusCode::OK,
        );
        self.store("/", response).await?;

        let mut feed = PostFeed::from_page(page);
        while feed.posts().len() < self.prerender_posts && feed.has_more() {
            let outcome = feed
                .load_more(self.api.as_ref())
                .await
                .map_err(|err| MaterializeError::Feed(err.to_string()))?;
            match outcome {
                LoadOutcome::Appended(0) | LoadOutcome::Exhausted => break,
                LoadOutcome::Appended(_) => {}
            }
        }

        let ids: Vec<String> = feed
            .posts()
            .iter()
            .take(self.prerender_posts)
            .map(|post| post.id.clone())
            .collect();

        for id in ids {
            if self.materialize_post(&id).await?.is_none() {
                warn!(
                    target = "edicola::materializer",
                    id = %id,
                    "skipping prerender because post detail not available"
                );
            }
        }

        Ok(())
    }

    /// Resolve a post path to a served page, rendering on demand when the
    /// cache has no copy yet.
    pub async fn lookup_post(&self, id: &str) -> Result<PostLookup, MaterializeError> {
        let path = post_path(id);

        if let Some(hit) = self.cache.get(&path).await {
            return Ok(PostLookup::Found(hit));
        }

        if !self.in_flight.insert(path.clone()) {
            return Ok(PostLookup::Rendering);
        }

        let result = self.materialize_post(id).await;
        self.in_flight.remove(&path);

        match result {
            Ok(Some(response)) => Ok(PostLookup::Found(response)),
            Ok(None) => Ok(PostLookup::NotFound),
            Err(error) => Err(error),
        }
    }

    /// Refresh every stored page in place. Failures keep the stale copy;
    /// posts the API no longer knows are evicted.
    pub async fn revalidate_all(&self) {
        let paths = self.cache.paths().await;
        if paths.is_empty() {
            return;
        }

        info!(
            target = "edicola::materializer",
            pages = paths.len(),
            "revalidating materialized pages"
        );

        for path in paths {
            if let Err(error) = self.revalidate_path(&path).await {
                counter!("edicola_revalidate_fail_total").increment(1);
                warn!(
                    target = "edicola::materializer",
                    path = %path,
                    error = %error,
                    "revalidation failed; keeping stale page"
                );
            }
        }
    }

    async fn revalidate_path(&self, path: &str) -> Result<(), MaterializeError> {
        if path == "/" {
            self.materialize_front_page().await?;
            return Ok(());
        }

        if let Some(id) = path.strip_prefix("/posts/") {
            if self.materialize_post(id).await?.is_none() {
                self.cache.invalidate(path).await;
                info!(
                    target = "edicola::materializer",
                    path = %path,
                    "post vanished upstream; evicting page"
                );
            }
        }

        Ok(())
    }

    pub async fn materialize_front_page(&self) -> Result<Response, MaterializeError> {
        let started = Instant::now();

        let page = self
            .feed
            .front_page()
            .await
            .map_err(|err| MaterializeError::Feed(err.to_string()))?;
        let content = self.feed.page_context(&page);

        let response = render_template_response(
            IndexTemplate {
                view: LayoutContext::new(self.chrome("/"), content),
            },
            StatusCode::OK,
        );
        let response = self.store("/", response).await?;

        histogram!("edicola_materialize_page_ms").record(elapsed_ms(started));
        Ok(response)
    }

    async fn materialize_post(&self, id: &str) -> Result<Option<Response>, MaterializeError> {
        let started = Instant::now();

        let detail = match self.feed.post_detail(id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => return Ok(None),
            Err(err) => {
                return Err(MaterializeError::PostDetail {
                    id: id.to_string(),
                    detail: err.to_string(),
                });
            }
        };

        let path = post_path(id);
        let response = render_template_response(
            PostTemplate {
                view: LayoutContext::new(self.chrome(&path), detail),
            },
            StatusCode::OK,
        );
        let response = self.store(&path, response).await?;

        histogram!("edicola_materialize_page_ms").record(elapsed_ms(started));
        Ok(Some(response))
    }

    async fn store(&self, path: &str, response: Response) -> Result<Response, MaterializeError> {
        if !should_store_response(&response) {
            return Ok(response);
        }

        match self.cache.store_response(path, response).await {
            Ok(rebuilt) => {
                info!(
                    target = "edicola::materializer",
                    path = %path,
                    "page materialized"
                );
                Ok(rebuilt)
            }
            Err((_, error)) => Err(MaterializeError::Cache {
                path: path.to_string(),
                source: error,
            }),
        }
    }

    fn chrome(&self, path: &str) -> SiteChrome {
        SiteChrome {
            canonical: canonical_url(self.public_url.as_str(), path),
            preview: false,
            comments_repo: self.comments_repo.clone(),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
