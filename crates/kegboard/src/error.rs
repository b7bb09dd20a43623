// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KegboardError {
    #[error("unknown message id 0x{0:02x}")]
    UnknownMessage(u16),

    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("frame does not start with the KBSP prefix")]
    BadPrefix,

    #[error("payload length mismatch: header says {declared}, frame has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("payload too long: {0} bytes")]
    PayloadTooLong(usize),

    #[error("crc mismatch (residue 0x{0:04x})")]
    BadCrc(u16),

    #[error("bad trailer {0:02x?}")]
    BadTrailer([u8; 2]),

    #[error("field 0x{tag:02x} truncated")]
    TruncatedField { tag: u8 },

    #[error("field 0x{tag:02x} must be {expected} bytes, got {actual}")]
    FieldLength { tag: u8, expected: usize, actual: usize },

    #[error("field 0x{tag:02x} too long to encode: {len} bytes")]
    FieldTooLong { tag: u8, len: usize },

    #[error("lost framing: no prefix within {0} bytes")]
    Framing(usize),

    #[error("device closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KegboardError {
    /// Whether a reader can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, KegboardError::Closed | KegboardError::Io(_))
    }
}
