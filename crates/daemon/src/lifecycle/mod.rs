// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, signal handling, orderly shutdown.

mod startup;
pub(crate) use startup::finish_run;
pub use startup::{build_manager, startup, startup_with, Core, DeviceIo};

use std::path::PathBuf;
use std::time::Duration;

use kb_core::{BackendError, Event, FlowError};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::hub::Publisher;
use crate::shutdown::Shutdown;

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    /// A supervised thread died or a fatal error forced the shutdown
    Fault(String),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Clean => 0,
            Outcome::Fault(_) => 1,
        }
    }
}

/// Run the core until a signal or a fatal fault stops it.
pub fn run_core(config: &Config) -> Result<Outcome, LifecycleError> {
    let core = startup(config)?;
    let drain = crate::env::drain_timeout();
    wait_for_stop(&core.shutdown, &core.publisher, drain)?;
    Ok(core.finish(drain))
}

/// Block until SIGINT/SIGTERM or an internal shutdown. A signal publishes
/// quit so it takes the same path as a watchdog fault; if the hub does not
/// act on it within `drain`, shutdown is forced.
pub fn wait_for_stop(
    shutdown: &Shutdown,
    publisher: &Publisher,
    drain: Duration,
) -> Result<(), LifecycleError> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let cancelled = shutdown.token();
    let signalled = runtime.block_on(async {
        tokio::select! {
            result = shutdown_signal() => result.map(|()| true),
            _ = cancelled.cancelled() => Ok(false),
        }
    })?;

    if signalled {
        publisher.publish(Event::quit());
        if !shutdown.wait_timeout(drain) {
            tracing::warn!("quit not dispatched in time, forcing shutdown");
            shutdown.trigger();
        }
    }
    Ok(())
}

async fn shutdown_signal() -> Result<(), LifecycleError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }
    Ok(())
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind kegnet listener at {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("Failed to open device {0}: {1}")]
    Device(PathBuf, std::io::Error),

    #[error("Failed to start thread {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Tap setup failed: {0}")]
    Flow(#[from] FlowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
