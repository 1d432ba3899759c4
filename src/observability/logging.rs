use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::config::LogFormat;
use crate::error::{GatewayError, GatewayResult};

const DEFAULT_FILTER: &str = "info,swapi_gateway=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing(format: LogFormat) -> GatewayResult<()> {
    let result = match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true);
            set_global_default(Registry::default().with(env_filter()).with(layer))
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().with_target(false);
            set_global_default(Registry::default().with(env_filter()).with(layer))
        }
    };

    result.map_err(|e| GatewayError::Internal(format!("Failed to set global subscriber: {}", e)))
}
