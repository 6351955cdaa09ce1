pub mod config;
pub mod pipeline_config; // thresholds, weights, call profiles
pub mod models;
pub mod db;
pub mod messaging;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. RUST_LOG wins over the built-in filter.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
