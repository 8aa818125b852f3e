use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // No handler opens spans, so the JSON layer stays flat.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "edicola_page_cache_hit_total",
            Unit::Count,
            "Total number of page cache hits."
        );
        describe_counter!(
            "edicola_page_cache_miss_total",
            Unit::Count,
            "Total number of page cache misses."
        );
        describe_gauge!(
            "edicola_page_cache_entries",
            Unit::Count,
            "Current number of materialized pages held in the cache."
        );
        describe_counter!(
            "edicola_revalidate_fail_total",
            Unit::Count,
            "Total number of page revalidations that failed and kept the stale copy."
        );
        describe_histogram!(
            "edicola_materialize_page_ms",
            Unit::Milliseconds,
            "Time spent rendering and storing one page, in milliseconds."
        );
    });
}
