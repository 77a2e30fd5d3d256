use crate::config::LogLevel;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global JSON subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_subscriber(log_level: &LogLevel) {
    let default_filter = format!(
        "{},hyper=info,reqwest=info,tower_http=info",
        log_level.as_str()
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();
}
