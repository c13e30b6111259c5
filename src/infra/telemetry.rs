use std::sync::Once;

use metrics::{Unit, describe_counter};
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

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
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
            "phonepulse_edge_requests_total",
            Unit::Count,
            "Requests seen by the edge, labelled bypass, personalized or unpersonalized."
        );
        describe_counter!(
            "phonepulse_edge_impression_failures_total",
            Unit::Count,
            "Impression deliveries that failed and were dropped."
        );
        describe_counter!(
            "phonepulse_origin_variant_source_total",
            Unit::Count,
            "Origin variant decisions by the source they were recovered from."
        );
        describe_counter!(
            "phonepulse_origin_upstream_failures_total",
            Unit::Count,
            "Content delivery failures observed by origin content routes."
        );
    });
}
