// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub handlers that run on the dispatch thread.

mod drink;
mod heartbeat;
mod relay;
mod subscription;
mod thermo;

pub use drink::DrinkRecorder;
pub use heartbeat::{Heartbeat, HEARTBEAT_MINUTE, HEARTBEAT_SECOND};
pub use relay::RelayWriter;
pub use subscription::Subscription;
pub use thermo::ThermoRecorder;
