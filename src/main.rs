use std::{process, sync::Arc, time::Duration};

use edicola::{
    application::{content::ContentApi, error::AppError, feed::FeedService},
    config,
    infra::{
        cache::PageCache,
        content::HttpContentApi,
        error::InfraError,
        http::{self, HttpState},
        materializer::PageMaterializer,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let api: Arc<dyn ContentApi> =
        Arc::new(HttpContentApi::new(&settings.content_api).map_err(AppError::from)?);
    let feed = Arc::new(FeedService::new(api.clone(), settings.content_api.page_size));
    let cache = PageCache::new();

    let materializer = Arc::new(PageMaterializer::new(
        cache.clone(),
        feed.clone(),
        api,
        settings.server.public_url.clone(),
        settings.pages.prerender_posts,
        settings.pages.comments_repo.clone(),
    ));

    if settings.pages.prerender_on_startup {
        if let Err(error) = materializer.prerender_initial().await {
            warn!(
                target = "edicola::startup",
                error = %error,
                "startup prerender failed; pages will render on demand"
            );
        }
    }

    // Spawn the revalidation timer unless disabled via revalidate_secs = 0.
    let revalidate_handle = if settings.pages.revalidate_secs > 0 {
        let worker = materializer.clone();
        let period = Duration::from_secs(settings.pages.revalidate_secs);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                worker.revalidate_all().await;
            }
        }))
    } else {
        None
    };

    let http_state = HttpState {
        feed,
        materializer,
        cache,
        public_url: settings.server.public_url.clone(),
        comments_repo: settings.pages.comments_repo.clone(),
    };

    let result = serve_http(&settings, http_state).await;

    if let Some(handle) = revalidate_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.bind)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "edicola::http", addr = %settings.server.bind, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(target = "edicola::http", error = %error, "failed to listen for shutdown signal");
    }
}
