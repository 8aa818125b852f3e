use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::{ErrorReport, HttpError};
use crate::domain::posts::PostRef;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: SiteChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Per-page chrome shared by every template: the canonical URL of the page,
/// whether the visitor is in preview mode, and the comments repository when
/// one is configured.
#[derive(Clone)]
pub struct SiteChrome {
    pub canonical: String,
    pub preview: bool,
    pub comments_repo: Option<String>,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub canonical: String,
    pub preview: bool,
    pub comments_repo: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: SiteChrome, content: T) -> Self {
        Self {
            canonical: chrome.canonical,
            preview: chrome.preview,
            comments_repo: chrome.comments_repo,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published_label: Option<String>,
}

pub struct PageContext {
    pub posts: Vec<PostCard>,
    pub post_count: usize,
    pub has_results: bool,
    pub next_cursor: Option<String>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<PageContext>,
}

#[derive(Template)]
#[template(path = "partials/feed_page.html")]
pub struct FeedFragmentTemplate {
    pub content: PageContext,
}

#[derive(Clone)]
pub struct NeighborLink {
    pub id: String,
    pub title: String,
}

impl NeighborLink {
    pub fn from_ref(post: PostRef) -> Self {
        Self {
            id: post.id,
            title: post.title,
        }
    }
}

pub struct PostBodySection {
    pub heading: String,
    pub body_html: String,
}

pub struct PostDetailContext {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub published_label: Option<String>,
    pub reading_minutes: usize,
    pub body: Vec<PostBodySection>,
    pub previous: Option<NeighborLink>,
    pub next: Option<NeighborLink>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct LoadingView {
    pub retry_seconds: u8,
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingTemplate {
    pub view: LayoutContext<LoadingView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage to continue exploring.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
