//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "edicola";
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);
const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REVALIDATE_SECS: u64 = 1800;
const DEFAULT_PRERENDER_POSTS: usize = 2;

/// Command-line arguments for the Edicola binary.
#[derive(Debug, Parser)]
#[command(name = "edicola", version, about = "Edicola blog front-end server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "EDICOLA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Edicola HTTP server.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener address, e.g. 0.0.0.0:8080.
    #[arg(long = "bind", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Override the public site URL used for canonical links.
    #[arg(long = "public-url", value_name = "URL")]
    pub public_url: Option<String>,

    /// Override the content API base URL.
    #[arg(long = "content-api-url", value_name = "URL")]
    pub content_api_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Override the log output format (compact|json).
    #[arg(long = "log-format", value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Skip the startup prerender pass and render every page on demand.
    #[arg(long = "no-prerender", action = clap::ArgAction::SetTrue)]
    pub no_prerender: bool,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub content_api: ContentApiSettings,
    pub pages: PagesSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub public_url: Url,
}

#[derive(Debug, Clone)]
pub struct ContentApiSettings {
    pub base_url: Url,
    pub page_size: u32,
    pub timeout_secs: u64,
}

/// Page materialization knobs. `revalidate_secs` of zero disables the
/// background refresh timer entirely; `comments_repo` left unset leaves
/// post pages without the comments widget.
#[derive(Debug, Clone)]
pub struct PagesSettings {
    pub revalidate_secs: u64,
    pub prerender_posts: usize,
    pub prerender_on_startup: bool,
    pub comments_repo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("EDICOLA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    content_api: RawContentApiSettings,
    pages: RawPagesSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(bind) = overrides.bind.as_ref() {
            self.server.bind = Some(bind.clone());
        }
        if let Some(url) = overrides.public_url.as_ref() {
            self.server.public_url = Some(url.clone());
        }
        if let Some(url) = overrides.content_api_url.as_ref() {
            self.content_api.base_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(format) = overrides.log_format.as_ref() {
            self.logging.format = Some(format.clone());
        }
        if overrides.no_prerender {
            self.pages.prerender_on_startup = Some(false);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            content_api,
            pages,
            logging,
        } = raw;

        let server = build_server_settings(server)?;
        let content_api = build_content_api_settings(content_api)?;
        let pages = build_pages_settings(pages)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            server,
            content_api,
            pages,
            logging,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let bind = match server.bind {
        Some(value) => value.parse::<SocketAddr>().map_err(|err| {
            LoadError::invalid("server.bind", format!("invalid address `{value}`: {err}"))
        })?,
        None => SocketAddr::from(DEFAULT_BIND),
    };

    let public_url = match server.public_url {
        Some(value) => Url::parse(&value).map_err(|err| {
            LoadError::invalid("server.public_url", format!("failed to parse: {err}"))
        })?,
        None => Url::parse(DEFAULT_PUBLIC_URL).expect("default public URL is well formed"),
    };
    if !matches!(public_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "server.public_url",
            "URL scheme must be http or https",
        ));
    }

    Ok(ServerSettings { bind, public_url })
}

fn build_content_api_settings(
    content_api: RawContentApiSettings,
) -> Result<ContentApiSettings, LoadError> {
    let base_url = match content_api.base_url {
        Some(value) => Url::parse(&value).map_err(|err| {
            LoadError::invalid("content_api.base_url", format!("failed to parse: {err}"))
        })?,
        None => {
            return Err(LoadError::invalid(
                "content_api.base_url",
                "a content API base URL is required",
            ));
        }
    };
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "content_api.base_url",
            "URL scheme must be http or https",
        ));
    }

    let page_size = content_api.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(LoadError::invalid(
            "content_api.page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let timeout_secs = content_api.timeout_secs.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "content_api.timeout_secs",
            "must be greater than zero",
        ));
    }

    Ok(ContentApiSettings {
        base_url,
        page_size,
        timeout_secs,
    })
}

fn build_pages_settings(pages: RawPagesSettings) -> Result<PagesSettings, LoadError> {
    let comments_repo = match pages.comments_repo {
        Some(value) => {
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(LoadError::invalid(
                    "pages.comments_repo",
                    "must not be empty",
                ));
            }
            Some(value)
        }
        None => None,
    };

    Ok(PagesSettings {
        revalidate_secs: pages.revalidate_secs.unwrap_or(DEFAULT_REVALIDATE_SECS),
        prerender_posts: pages.prerender_posts.unwrap_or(DEFAULT_PRERENDER_POSTS),
        prerender_on_startup: pages.prerender_on_startup.unwrap_or(true),
        comments_repo,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = match logging.format.as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") | None => LogFormat::Compact,
        Some(other) => {
            return Err(LoadError::invalid(
                "logging.format",
                format!("unknown format `{other}`, expected `compact` or `json`"),
            ));
        }
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    bind: Option<String>,
    public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentApiSettings {
    base_url: Option<String>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPagesSettings {
    revalidate_secs: Option<u64>,
    prerender_posts: Option<usize>,
    prerender_on_startup: Option<bool>,
    comments_repo: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    format: Option<String>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
