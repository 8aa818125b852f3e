use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, COOKIE, SET_COOKIE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use url::Url;

use crate::{
    application::{error::HttpError, feed::FeedService},
    infra::{
        cache::PageCache,
        materializer::{MaterializeError, PageMaterializer, PostLookup},
    },
    presentation::views::{
        FeedFragmentTemplate, IndexTemplate, LayoutContext, LoadingTemplate, LoadingView,
        PostTemplate, SiteChrome, render_not_found_response, render_template_response,
    },
};

use super::middleware::{log_responses, set_request_context};

pub(crate) const PREVIEW_COOKIE: &str = "edicola_preview";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub materializer: Arc<PageMaterializer>,
    pub cache: PageCache,
    pub public_url: Url,
    pub comments_repo: Option<String>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/posts/fragment", get(feed_fragment))
        .route("/posts/{id}", get(post_detail))
        .route("/preview/enter", get(preview_enter))
        .route("/preview/exit", get(preview_exit))
        .route("/healthz", get(healthz))
        .fallback(fallback_not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AfterQuery {
    after: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedirectQuery {
    redirect: Option<String>,
}

async fn index(
    State(state): State<HttpState>,
    Query(query): Query<AfterQuery>,
    headers: HeaderMap,
) -> Response {
    let preview = preview_requested(&headers);

    // Plain-navigation fallback for "load more": a standalone page of
    // results, never cached.
    if let Some(cursor) = query.after.as_deref() {
        return match state.feed.page_after(cursor).await {
            Ok(page) => {
                let content = state.feed.page_context(&page);
                let view = LayoutContext::new(chrome(&state, "/", preview), content);
                let mut response =
                    render_template_response(IndexTemplate { view }, StatusCode::OK);
                if preview {
                    set_no_store(&mut response);
                }
                response
            }
            Err(err) => HttpError::from(err).into_response(),
        };
    }

    if !preview {
        if let Some(hit) = state.cache.get("/").await {
            return hit;
        }

        return match state.materializer.materialize_front_page().await {
            Ok(response) => response,
            Err(err) => materialize_error_to_response("infra::http::public::index", err),
        };
    }

    match state.feed.front_page().await {
        Ok(page) => {
            let content = state.feed.page_context(&page);
            let view = LayoutContext::new(chrome(&state, "/", true), content);
            let mut response = render_template_response(IndexTemplate { view }, StatusCode::OK);
            set_no_store(&mut response);
            response
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn feed_fragment(
    State(state): State<HttpState>,
    Query(query): Query<AfterQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let Some(cursor) = query.after.as_deref() else {
        return Err(HttpError::new(
            "infra::http::public::feed_fragment",
            StatusCode::BAD_REQUEST,
            "Missing cursor",
            "The `after` query parameter is required",
        ));
    };

    let page = state.feed.page_after(cursor).await?;
    let content = state.feed.page_context(&page);

    let mut response = render_template_response(FeedFragmentTemplate { content }, StatusCode::OK);
    if preview_requested(&headers) {
        set_no_store(&mut response);
    }
    Ok(response)
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = post_path(&id);

    if preview_requested(&headers) {
        return match state.feed.post_detail(&id).await {
            Ok(Some(content)) => {
                let view = LayoutContext::new(chrome(&state, &path, true), content);
                let mut response =
                    render_template_response(PostTemplate { view }, StatusCode::OK);
                set_no_store(&mut response);
                response
            }
            Ok(None) => render_not_found_response(chrome(&state, &path, true)),
            Err(err) => HttpError::from(err).into_response(),
        };
    }

    match state.materializer.lookup_post(&id).await {
        Ok(PostLookup::Found(response)) => response,
        Ok(PostLookup::NotFound) => render_not_found_response(chrome(&state, &path, false)),
        Ok(PostLookup::Rendering) => {
            let view = LayoutContext::new(
                chrome(&state, &path, false),
                LoadingView { retry_seconds: 2 },
            );
            let mut response = render_template_response(LoadingTemplate { view }, StatusCode::OK);
            set_no_store(&mut response);
            response
        }
        Err(err) => materialize_error_to_response("infra::http::public::post_detail", err),
    }
}

async fn preview_enter(Query(query): Query<RedirectQuery>) -> Response {
    let target = query
        .redirect
        .filter(|path| is_same_site_path(path))
        .unwrap_or_else(|| "/".to_string());

    let mut response = Redirect::to(&target).into_response();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_static("edicola_preview=1; Path=/; HttpOnly; SameSite=Lax"),
    );
    response
}

async fn preview_exit() -> Response {
    let mut response = Redirect::to("/").into_response();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_static("edicola_preview=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    response
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback_not_found(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let preview = preview_requested(request.headers());
    let path = request.uri().path().to_string();
    render_not_found_response(chrome(&state, &path, preview))
}

fn materialize_error_to_response(source: &'static str, error: MaterializeError) -> Response {
    let status = match &error {
        MaterializeError::Feed(_) | MaterializeError::PostDetail { .. } => StatusCode::BAD_GATEWAY,
        MaterializeError::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpError::from_error(source, status, "Page could not be prepared", &error).into_response()
}

fn chrome(state: &HttpState, path: &str, preview: bool) -> SiteChrome {
    SiteChrome {
        canonical: canonical_url(state.public_url.as_str(), path),
        preview,
        comments_repo: state.comments_repo.clone(),
    }
}

pub(crate) fn preview_requested(headers: &HeaderMap) -> bool {
    let Some(cookies) = headers.get(COOKIE).and_then(|value| value.to_str().ok()) else {
        return false;
    };

    cookies.split(';').any(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        parts.next() == Some(PREVIEW_COOKIE) && parts.next() == Some("1")
    })
}

/// Absolute-path redirect targets only; protocol-relative, backslash, and
/// control-character variants count as off-site.
fn is_same_site_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}

pub(crate) fn post_path(id: &str) -> String {
    format!("/posts/{id}")
}

pub(crate) fn canonical_url(base: &str, path: &str) -> String {
    let root = normalize_public_site_url(base);
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        root
    } else {
        format!("{root}{trimmed}")
    }
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}
