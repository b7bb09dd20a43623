// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kb-core: tap, flow, alarm and event primitives for the kegbot core

pub mod macros;

pub mod alarm;
pub mod auth;
pub mod backend;
pub mod clock;
pub mod event;
pub mod flow;
pub mod meter;
pub mod tap;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use alarm::{Alarm, AlarmError, AlarmManager};
pub use auth::{AuthDevicePolicy, AuthManager, AuthPolicies, TokenRecord, ALIAS_ALL_TAPS};
pub use backend::{
    AuthToken, Backend, BackendError, MemoryBackend, PourRecord, PourRequest, SensorReading,
    TapRecord,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{Event, EventKind, FlowAction, FlowState, RelayMode, TokenState};
pub use flow::{Flow, FLOW_IDLE_TIMEOUT};
pub use meter::{reading_delta, FlowMeter, MeterReading, MAX_METER_READING_DELTA};
pub use tap::{FlowError, Tap, TapManager};
