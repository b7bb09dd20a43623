// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message exceeds {0} bytes without a terminator")]
    TooLong(usize),

    #[error("not connected")]
    NotConnected,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
