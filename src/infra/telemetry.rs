use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};
use crate::purge::{
    METRIC_DISPATCH_MS, METRIC_DISPATCH_TOTAL, METRIC_EVENT_DROPPED_TOTAL,
    METRIC_EVENT_SKIPPED_TOTAL, METRIC_EVENT_UNRESOLVED_TOTAL, METRIC_MANUAL_REJECTED_TOTAL,
};

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
            METRIC_DISPATCH_TOTAL,
            Unit::Count,
            "Total number of purge requests sent upstream, labelled by outcome."
        );
        describe_histogram!(
            METRIC_DISPATCH_MS,
            Unit::Milliseconds,
            "Purge request latency in milliseconds."
        );
        describe_counter!(
            METRIC_EVENT_SKIPPED_TOTAL,
            Unit::Count,
            "Lifecycle events skipped before dispatch, labelled by reason."
        );
        describe_counter!(
            METRIC_EVENT_UNRESOLVED_TOTAL,
            Unit::Count,
            "Lifecycle events dropped because no purge path could be derived."
        );
        describe_counter!(
            METRIC_EVENT_DROPPED_TOTAL,
            Unit::Count,
            "Lifecycle events dropped because no async runtime was available."
        );
        describe_counter!(
            METRIC_MANUAL_REJECTED_TOTAL,
            Unit::Count,
            "Manual purge requests rejected by the authorization gate."
        );
    });
}
