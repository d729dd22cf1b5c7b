// src/logging.rs

//! Initializes `tracing` with an `EnvFilter` behind a reload handle, so
//! SIGHUP can change the log level at runtime without restarting the
//! process.

use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, reload};

pub type LogReloadHandle = Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>;

/// Installs the global subscriber and returns a handle for later reloads.
/// `level` is the initial filter directive (e.g. `"info"` or
/// `"repguard=debug"`); `RUST_LOG`, when set, takes precedence.
pub fn init(level: &str) -> LogReloadHandle {
    let initial = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    let (filter, handle) = reload::Layer::new(EnvFilter::new(initial));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_ansi(true))
        .init();

    Arc::new(handle)
}

/// Applies a new filter directive string to the running subscriber.
pub fn reload(handle: &LogReloadHandle, level: &str) {
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        tracing::warn!("failed to reload log filter: {}", e);
    }
}
