// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kb-kegboard: Kegboard serial protocol (KBSP v1).
//!
//! Frame layout, all integers little-endian:
//!
//! ```text
//! "KBSP v1:" | id u16 | len u16 | payload[len] | crc u16 | "\r\n"
//! ```
//!
//! The payload is a run of `tag u8 | len u8 | value[len]` fields.

mod crc;
mod error;
mod field;
mod frame;
mod message;
mod reader;

pub use crc::{crc16_ccitt, crc16_update};
pub use error::KegboardError;
pub use field::Temperature;
pub use frame::{
    decode, encode, HEADER_LEN, MIN_FRAME_LEN, PAYLOAD_MAXLEN, PREFIX, TRAILER,
};
pub use message::{
    AuthToken, Configuration, Hello, Message, MeterStatus, OnewirePresence, OutputStatus, Ping,
    SetOutput, TemperatureReading,
};
pub use reader::{write_message, KegboardReader, ReaderStats, RESYNC_BUDGET};
