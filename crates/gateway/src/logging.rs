use crate::config::GatewayConfig;
use common::TelemetryGuard;

pub const SERVICE_NAME: &str = "gateway";

/// Install the subscriber, with OTLP export when an endpoint is configured.
///
/// The returned guard must be held for the life of the process.
pub fn setup_logging(config: &GatewayConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    match &config.otel_endpoint {
        Some(endpoint) => {
            let guard = TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment)?;
            Ok(Some(guard))
        }
        None => {
            common::setup_logging(config.environment);
            Ok(None)
        }
    }
}
