// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::lifecycle::LifecycleError;

/// Level implied by the `-v` count.
pub fn default_directive(verbosity: u8) -> Directive {
    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    level.into()
}

/// `RUST_LOG` when set, otherwise the `-v` level.
pub fn env_filter(verbosity: u8) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        filter.add_directive(default_directive(verbosity))
    } else {
        filter
    }
}

/// Install the global subscriber: stderr, plus `log_file` when given.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, LifecycleError> {
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(stderr)
        .with(file_layer)
        .try_init()
        .map_err(|e| LifecycleError::Runtime(format!("logging already initialized: {e}")))?;
    Ok(guard)
}
