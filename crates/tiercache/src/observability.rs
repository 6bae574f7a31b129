//! Tracing subscriber setup for applications embedding the cache.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host, which may use these helpers.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

const DEFAULT_LEVEL: &str = "info";

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() -> bool {
    init_tracing_with_level(DEFAULT_LEVEL)
}

pub fn init_tracing_from_config(config: &LoggingConfig) -> bool {
    init_tracing_with_level(&config.level)
}

/// Installs a global subscriber with a reloadable filter.
///
/// `RUST_LOG` takes precedence over `level`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing_with_level(level: &str) -> bool {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| filter_for(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let installed = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
    installed
}

/// Swaps the log level at runtime. Returns `false` when tracing was not
/// initialised through this module.
pub fn apply_logging_level(level: &str) -> bool {
    match LOG_RELOAD_HANDLE.get() {
        Some(handle) => handle.modify(|f| *f = filter_for(level)).is_ok(),
        None => false,
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        assert_eq!(filter_for("debug").to_string(), "debug");
        assert_eq!(filter_for("tiercache=loud").to_string(), DEFAULT_LEVEL);
    }
}
