// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking frame reader with prefix resynchronization.

use crate::error::KegboardError;
use crate::frame::{self, PAYLOAD_MAXLEN, PREFIX, TRAILER};
use crate::message::Message;
use std::io::{ErrorKind, Read, Write};

/// Bytes scanned for a prefix before giving up with a framing error.
pub const RESYNC_BUDGET: usize = 2048;

/// Counters for observing link health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub frames: u64,
    /// Missing prefix, oversized length or bad trailer.
    pub framing_losses: u64,
    /// Well-framed messages that failed to decode.
    pub decode_errors: u64,
}

/// Turns a byte stream into a sequence of [`Message`]s.
pub struct KegboardReader<R> {
    inner: R,
    stats: ReaderStats,
    resync_budget: usize,
}

impl<R: Read> KegboardReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, stats: ReaderStats::default(), resync_budget: RESYNC_BUDGET }
    }

    pub fn with_resync_budget(mut self, budget: usize) -> Self {
        self.resync_budget = budget;
        self
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), KegboardError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => KegboardError::Closed,
            _ => KegboardError::Io(e),
        })
    }

    /// Consume bytes until the stream is positioned just after a prefix.
    fn sync(&mut self) -> Result<(), KegboardError> {
        let mut window = [0u8; 8];
        self.read_exact(&mut window)?;
        if &window == PREFIX {
            return Ok(());
        }

        self.stats.framing_losses += 1;
        tracing::warn!(found = ?String::from_utf8_lossy(&window), "packet framing broken, resyncing");
        let mut byte = [0u8; 1];
        for _ in 0..self.resync_budget {
            self.read_exact(&mut byte)?;
            window.rotate_left(1);
            window[7] = byte[0];
            if &window == PREFIX {
                tracing::info!("packet framing fixed");
                return Ok(());
            }
        }
        Err(KegboardError::Framing(self.resync_budget))
    }

    /// Read the next message.
    ///
    /// Framing problems are counted and skipped internally. A well-framed
    /// message that fails to decode is returned as a recoverable error and
    /// the stream stays aligned on the following frame.
    pub fn next_message(&mut self) -> Result<Message, KegboardError> {
        loop {
            self.sync()?;

            let mut header = [0u8; 4];
            self.read_exact(&mut header)?;
            let message_id = u16::from_le_bytes([header[0], header[1]]);
            let len = usize::from(u16::from_le_bytes([header[2], header[3]]));
            if len > PAYLOAD_MAXLEN {
                self.stats.framing_losses += 1;
                tracing::warn!(message_id, len, "bogus message length, skipping");
                continue;
            }

            let mut rest = vec![0u8; len + 4];
            self.read_exact(&mut rest)?;
            if &rest[len + 2..] != TRAILER {
                self.stats.framing_losses += 1;
                tracing::warn!(message_id, trailer = ?&rest[len + 2..], "bad trailer, skipping");
                continue;
            }

            let mut raw = Vec::with_capacity(PREFIX.len() + header.len() + rest.len());
            raw.extend_from_slice(PREFIX);
            raw.extend_from_slice(&header);
            raw.extend_from_slice(&rest);
            return match frame::decode(&raw) {
                Ok(message) => {
                    self.stats.frames += 1;
                    tracing::trace!(id = message.id(), kind = message.name(), "rx");
                    Ok(message)
                }
                Err(e) => {
                    self.stats.decode_errors += 1;
                    Err(e)
                }
            };
        }
    }

    /// Messages until the stream closes or fails; recoverable errors are
    /// logged and skipped.
    pub fn messages(&mut self) -> impl Iterator<Item = Message> + '_ {
        std::iter::from_fn(move || loop {
            match self.next_message() {
                Ok(message) => return Some(message),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "dropping kegboard frame");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "kegboard stream ended");
                    return None;
                }
            }
        })
    }
}

/// Encode `message` and write it as one frame.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), KegboardError> {
    let frame = frame::encode(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    tracing::trace!(id = message.id(), kind = message.name(), "tx");
    Ok(())
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
