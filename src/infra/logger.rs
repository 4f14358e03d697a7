// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// `ROUNDTABLE_LOG` wins, then `RUST_LOG`, then the configured default level.
pub fn init_logging(level: &str) {
    fmt()
        .with_env_filter(build_filter(level))
        .with_target(false)
        .compact()
        .init();
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("ROUNDTABLE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
