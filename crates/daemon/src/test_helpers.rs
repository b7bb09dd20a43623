// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon unit tests.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use kb_kegboard::{KegboardReader, Message};
use parking_lot::Mutex;

/// In-memory writer whose contents stay readable after it is handed off.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Frames written so far, decoded.
    pub fn messages(&self) -> Vec<Message> {
        let bytes = self.0.lock().clone();
        KegboardReader::new(Cursor::new(bytes)).messages().collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Blocking byte stream fed from a channel; EOF once the sender is dropped.
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Cursor<Vec<u8>>,
}

pub fn channel_reader() -> (Sender<Vec<u8>>, ChannelReader) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, ChannelReader { rx, pending: Cursor::new(Vec::new()) })
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let n = self.pending.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(bytes) => self.pending = Cursor::new(bytes),
                Err(_) => return Ok(0),
            }
        }
    }
}

pub fn frame(message: impl Into<Message>) -> Vec<u8> {
    kb_kegboard::encode(&message.into()).unwrap()
}

pub fn frames(messages: impl IntoIterator<Item = Message>) -> Vec<u8> {
    messages.into_iter().flat_map(frame).collect()
}

/// Manager over the standard test backend, taps registered as the core
/// registers them at startup.
pub fn manager(
    clock: kb_core::FakeClock,
) -> (crate::workers::Manager<kb_core::FakeClock>, Arc<kb_core::MemoryBackend>) {
    let backend = Arc::new(kb_core::test_support::memory_backend());
    let config = crate::config::Config::default();
    let manager = crate::lifecycle::build_manager(&config, backend.clone(), clock).unwrap();
    (manager, backend)
}
