//! Subscriber installation

use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber: an `EnvFilter` built from the configured
/// level in front of one fmt layer
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(build_filter(&config.log_level))
        .with(output_layer(config.json_logs))
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Tracing initialized"
    );

    Ok(())
}

/// Directives from `RUST_LOG` syntax; unparsable input falls back to `info`
fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// JSON lines carry the current span's fields (extension, number, client)
/// so one call request can be followed across log records
fn output_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_filter_from_level() {
        assert_eq!(build_filter("warn").max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(
            build_filter("info,pbx_ami=trace").max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }
}
