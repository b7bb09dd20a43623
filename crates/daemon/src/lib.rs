// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kegbot daemon library
//!
//! Core mode owns the flow manager, the event hub and the Kegnet server.
//! Bridge mode forwards a locally attached kegboard to a remote core.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bridge;
pub mod config;
pub mod env;
pub mod handlers;
pub mod hub;
pub mod lifecycle;
pub mod logging;
pub mod shutdown;
pub mod supervisor;
pub mod workers;

#[cfg(test)]
mod test_helpers;

pub use bridge::{run_bridge, start_bridge, Bridge};
pub use config::{Config, ConfigError};
pub use hub::{EventHandler, EventHub, Publisher};
pub use lifecycle::{run_core, startup, startup_with, Core, DeviceIo, LifecycleError, Outcome};
pub use shutdown::Shutdown;
pub use supervisor::Supervisor;
