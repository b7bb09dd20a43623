//! Shared fixtures: a scripted kegboard, a running core, and Kegnet peers.

#![allow(dead_code)]

pub use kb_core::{Event, FlowAction, FlowState, RelayMode, TokenState};
pub use kb_daemon::{Config, Outcome};
pub use kb_kegboard::{Hello, Message, MeterStatus, SetOutput};
pub use std::time::Duration;

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use kb_core::MemoryBackend;
use kb_daemon::workers::device::device_writer;
use kb_daemon::{Core, DeviceIo};
use kb_kegboard::KegboardReader;
use kb_kegnet::KegnetClient;
use parking_lot::Mutex;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Board side of a scripted kegboard: feed it frames, read back commands.
pub struct FakeBoard {
    tx: Option<Sender<Vec<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl FakeBoard {
    pub fn new() -> (Self, DeviceIo) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let written = Arc::new(Mutex::new(Vec::new()));
        let io = DeviceIo {
            reader: Box::new(ChannelReader { rx, pending: Cursor::new(Vec::new()) }),
            writer: device_writer(SharedWriter(Arc::clone(&written))),
        };
        (Self { tx: Some(tx), written }, io)
    }

    pub fn send(&self, message: impl Into<Message>) {
        let bytes = kb_kegboard::encode(&message.into()).unwrap();
        if let Some(tx) = &self.tx {
            tx.send(bytes).unwrap();
        }
    }

    pub fn hello(&self) {
        self.send(Hello { firmware_version: 12 });
    }

    pub fn meter(&self, name: &str, reading: u32) {
        self.send(MeterStatus { meter_name: name.to_string(), meter_reading: reading });
    }

    /// Unplug the board: the daemon's reader sees end of stream.
    pub fn unplug(&mut self) {
        self.tx = None;
    }

    /// Commands the daemon has written to the board.
    pub fn commands(&self) -> Vec<Message> {
        let bytes = self.written.lock().clone();
        KegboardReader::new(Cursor::new(bytes)).messages().collect()
    }

    pub fn wait_for_command(&self, expected: &Message) {
        wait_for(&format!("{expected:?}"), || self.commands().contains(expected));
    }
}

struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Cursor<Vec<u8>>,
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

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn wait_for(what: &str, mut ready: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + TIMEOUT;
    while !ready() {
        assert!(std::time::Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A core running on loopback with a scripted board attached.
pub struct Running {
    pub core: Core,
    pub board: FakeBoard,
    pub backend: Arc<MemoryBackend>,
    pub addr: String,
    pub runtime: tokio::runtime::Runtime,
}

pub fn start_core(config: Config) -> Running {
    let backend = Arc::new(config.memory_backend());
    let listener = kb_daemon::workers::network::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (board, io) = FakeBoard::new();
    let core = kb_daemon::startup_with(&config, backend.clone(), listener, Some(io)).unwrap();
    board.hello();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    Running { core, board, backend, addr, runtime }
}

impl Running {
    /// Connect a peer and wait until the core has registered it.
    pub fn peer(&self) -> Peer<'_> {
        let before = self.core.server.client_count();
        let mut client = KegnetClient::new(&self.addr);
        assert!(self.runtime.block_on(client.reconnect()));
        wait_for("peer registration", || self.core.server.client_count() > before);
        Peer { client, runtime: &self.runtime }
    }

    /// Stop the core and report how it ended.
    pub fn stop(mut self) -> Outcome {
        self.core.stop();
        assert!(self.core.shutdown.wait_timeout(TIMEOUT));
        self.board.unplug();
        self.core.finish(TIMEOUT)
    }
}

pub struct Peer<'a> {
    client: KegnetClient,
    runtime: &'a tokio::runtime::Runtime,
}

impl Peer<'_> {
    pub fn send(&mut self, event: Event) {
        self.runtime.block_on(self.client.send_event(&event)).unwrap();
    }

    /// Skip broadcasts until one matches.
    pub fn expect(&mut self, what: &str, mut matches: impl FnMut(&Event) -> bool) -> Event {
        let client = &mut self.client;
        self.runtime.block_on(async {
            tokio::time::timeout(TIMEOUT, async {
                loop {
                    match client.recv_event().await {
                        Ok(Some(event)) if matches(&event) => return event,
                        Ok(Some(_)) => continue,
                        other => panic!("connection ended waiting for {what}: {other:?}"),
                    }
                }
            })
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        })
    }
}

pub fn flow_update(state: FlowState) -> impl FnMut(&Event) -> bool {
    move |event| matches!(event, Event::FlowUpdate { state: s, .. } if *s == state)
}
