use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::binding::METRIC_BINDING_FAILED_TOTAL;
use crate::application::routing::METRIC_RESOLVE_TOTAL;
use crate::cache::{
    METRIC_PENDING_CHANGES, METRIC_REBUILD_FAILED_TOTAL, METRIC_REBUILD_MS, METRIC_REBUILD_TOTAL,
    METRIC_VERSION,
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

/// Register descriptions for every metric folio emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REBUILD_TOTAL,
            Unit::Count,
            "Total number of published snapshots, labelled by rebuild mode."
        );
        describe_counter!(
            METRIC_REBUILD_FAILED_TOTAL,
            Unit::Count,
            "Total number of snapshot rebuilds that failed and left changes pending."
        );
        describe_histogram!(
            METRIC_REBUILD_MS,
            Unit::Milliseconds,
            "Snapshot rebuild latency in milliseconds."
        );
        describe_gauge!(
            METRIC_VERSION,
            Unit::Count,
            "Version of the currently published snapshot."
        );
        describe_gauge!(
            METRIC_PENDING_CHANGES,
            Unit::Count,
            "Content ids waiting for the next rebuild."
        );
        describe_counter!(
            METRIC_RESOLVE_TOTAL,
            Unit::Count,
            "Total number of request resolutions, labelled by outcome."
        );
        describe_counter!(
            METRIC_BINDING_FAILED_TOTAL,
            Unit::Count,
            "Total number of view-model binding failures."
        );
    });
}
