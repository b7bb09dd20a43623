// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminator-framed JSON codec.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use kb_core::Event;
use tokio_util::codec::{Decoder, Encoder};

pub const TERMINATOR: &[u8; 2] = b"\n\n";

/// Where satellites find the core by default.
pub const DEFAULT_ADDR: &str = "localhost:9805";

/// Largest unterminated message buffered before the peer is dropped.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Serialize an event with its terminator.
///
/// Compact JSON escapes newlines inside strings, so the body never
/// contains the terminator.
pub fn encode(event: &Event) -> Result<Bytes, ProtocolError> {
    let mut buf = serde_json::to_vec(event)?;
    buf.extend_from_slice(TERMINATOR);
    Ok(Bytes::from(buf))
}

/// Parse one message body (without terminator).
pub fn decode(body: &[u8]) -> Result<Event, ProtocolError> {
    Ok(serde_json::from_slice(body)?)
}

/// Splits a byte stream on the terminator. Empty and malformed messages
/// are logged and skipped.
#[derive(Debug, Clone)]
pub struct KegnetCodec {
    scanned: usize,
    max_len: usize,
}

impl Default for KegnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl KegnetCodec {
    pub fn new() -> Self {
        Self { scanned: 0, max_len: MAX_MESSAGE_LEN }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self { scanned: 0, max_len }
    }
}

impl Decoder for KegnetCodec {
    type Item = Event;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Event>, ProtocolError> {
        loop {
            let start = self.scanned.saturating_sub(1);
            let found = buf[start..].windows(TERMINATOR.len()).position(|w| w == TERMINATOR);
            let Some(offset) = found else {
                if buf.len() > self.max_len {
                    return Err(ProtocolError::TooLong(self.max_len));
                }
                self.scanned = buf.len();
                return Ok(None);
            };

            let end = start + offset;
            let message = buf.split_to(end + TERMINATOR.len());
            self.scanned = 0;

            let body = message[..end].trim_ascii();
            if body.is_empty() {
                continue;
            }
            match decode(body) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    tracing::warn!(error = %e, len = body.len(), "dropping malformed kegnet message");
                }
            }
        }
    }
}

impl Encoder<&Event> for KegnetCodec {
    type Error = ProtocolError;

    fn encode(&mut self, event: &Event, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let body = serde_json::to_vec(event)?;
        dst.reserve(body.len() + TERMINATOR.len());
        dst.put_slice(&body);
        dst.put_slice(TERMINATOR);
        Ok(())
    }
}

impl Encoder<Bytes> for KegnetCodec {
    type Error = ProtocolError;

    /// Pre-encoded message, terminator included.
    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.put_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
