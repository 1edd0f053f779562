use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "locator=info,server=debug,presence_sweeper=info,tower_http=debug";

pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Installs the global subscriber. RUST_LOG, when set, wins over `default_filter`.
pub fn init_logging_with(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
