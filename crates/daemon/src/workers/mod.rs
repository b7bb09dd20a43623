// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bodies of the supervised worker threads.

pub mod alarm;
pub mod device;
pub mod manager;
pub mod network;

pub use device::{DeviceSession, DeviceWriter};
pub use manager::{Manager, ManagerForwarder, ManagerInput};
