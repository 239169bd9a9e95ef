//! Tracing subscriber initialization for binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Settings consumed once at process start.
#[derive(Debug, Clone, Default)]
pub struct LoggingInitConfig<'a> {
    /// Explicit filter directive; `RUST_LOG` then `info` otherwise.
    pub filter: Option<&'a str>,
    pub json_format: bool,
}

/// Installs the global tracing subscriber.
///
/// Must be called at most once per process; later calls are ignored by the
/// registry and only logged.
pub fn init_logging(config: LoggingInitConfig<'_>) {
    let filter = match config.filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_format {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if let Err(error) = result {
        tracing::warn!(%error, "logging already initialized");
    }
}
