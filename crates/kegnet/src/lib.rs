// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kb-kegnet: event transport between the core and satellite processes.
//!
//! Wire format: one compact JSON event followed by `"\n\n"`.

mod backoff;
mod client;
mod codec;
mod error;
mod server;

pub use backoff::Backoff;
pub use client::KegnetClient;
pub use codec::{decode, encode, KegnetCodec, DEFAULT_ADDR, MAX_MESSAGE_LEN, TERMINATOR};
pub use error::ProtocolError;
pub use server::KegnetServer;
