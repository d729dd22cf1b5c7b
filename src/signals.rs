// src/signals.rs

//! Wires SIGINT/SIGTERM into a broadcast shutdown channel shared by every
//! monitor task, and tracks a SIGHUP sticky flag that tells the main loop to
//! reload configuration and log level between monitoring ticks instead of
//! acting mid-tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::info;

/// Set by the SIGHUP handler task, cleared by whoever acts on it.
#[derive(Clone, Default)]
pub struct ReloadFlag(Arc<AtomicBool>);

impl ReloadFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Spawns a task that listens for SIGINT and SIGTERM and broadcasts a
/// shutdown signal to every receiver cloned from `shutdown_tx`'s
/// subscription list, and a second task that sets `reload` on SIGHUP.
pub fn install(shutdown_tx: broadcast::Sender<()>, reload: ReloadFlag) -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        }
        if shutdown_tx.send(()).is_err() {
            tracing::warn!("no monitor tasks were listening for the shutdown signal");
        }
    });

    tokio::spawn(async move {
        loop {
            sighup.recv().await;
            info!("SIGHUP received, configuration reload requested");
            reload.set();
        }
    });

    Ok(())
}
