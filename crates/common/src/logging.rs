use crate::config::Environment;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub(crate) fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber: pretty output in development,
/// JSON lines in production.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. The OpenTelemetry
/// layer is installed as well; it is a no-op until a tracer provider exists
/// (see [`crate::TelemetryGuard`], which installs its own subscriber instead).
pub fn setup_logging(environment: Environment) {
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer());

    match environment {
        Environment::Production => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_level(true)
                        .with_current_span(true),
                )
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
