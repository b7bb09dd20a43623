// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve the config file: KB_CONFIG > ~/.kegbot/kbd.toml
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = non_empty("KB_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".kegbot").join("kbd.toml"))
}

/// Kegnet listen address override for core mode.
pub fn bind_addr() -> Option<String> {
    non_empty("KB_BIND_ADDR")
}

/// Address of the core a bridge connects to.
pub fn core_addr() -> Option<String> {
    non_empty("KB_CORE_ADDR")
}

/// Serial device path override.
pub fn device_path() -> Option<PathBuf> {
    non_empty("KB_DEVICE").map(PathBuf::from)
}

/// Log file override. Logs go to stderr only when neither this nor the
/// config names a file.
pub fn log_file() -> Option<PathBuf> {
    non_empty("KB_LOG_FILE").map(PathBuf::from)
}

/// Shutdown drain timeout (default 5s, configurable via `KB_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("KB_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}
