// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kegnet server: accepts satellites, publishes what they send and
//! multicasts core events back to all of them.

use crate::codec::{encode, KegnetCodec};
use crate::error::ProtocolError;
use bytes::Bytes;
use futures_util::StreamExt;
use kb_core::Event;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Frames queued per client before it is treated as stalled.
pub const CLIENT_QUEUE: usize = 256;

struct Peer {
    addr: SocketAddr,
    tx: mpsc::Sender<Bytes>,
    kick: CancellationToken,
}

type ClientMap = HashMap<u64, Peer>;

/// Connected peers. Cheap to share; [`send_event_to_clients`] may be called
/// from any thread.
///
/// [`send_event_to_clients`]: KegnetServer::send_event_to_clients
#[derive(Default)]
pub struct KegnetServer {
    clients: Mutex<ClientMap>,
    next_id: AtomicU64,
}

impl KegnetServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.lock().values().map(|peer| peer.addr).collect()
    }

    /// Serialize once and queue to every client. Peers whose connection has
    /// gone away, or whose queue is full, are disconnected. Returns the
    /// number of clients reached.
    pub fn send_event_to_clients(&self, event: &Event) -> Result<usize, ProtocolError> {
        let frame = encode(event)?;
        let mut clients = self.clients.lock();
        clients.retain(|id, peer| match peer.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client = id, addr = %peer.addr, queued = CLIENT_QUEUE, "kegnet client stalled, dropping");
                peer.kick.cancel();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(client = id, addr = %peer.addr, "dropping kegnet client");
                peer.kick.cancel();
                false
            }
        });
        Ok(clients.len())
    }

    /// Add a client with a fresh bounded queue. The token fires when the
    /// server drops the client.
    fn register(&self, addr: SocketAddr) -> (u64, mpsc::Receiver<Bytes>, CancellationToken) {
        let (tx, rx) = mpsc::channel::<Bytes>(CLIENT_QUEUE);
        let kick = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().insert(id, Peer { addr, tx, kick: kick.clone() });
        (id, rx, kick)
    }

    /// Accept clients until `cancel` fires. Every event received from a
    /// client is handed to `on_event`.
    pub async fn run<F>(self: Arc<Self>, listener: TcpListener, on_event: F, cancel: CancellationToken)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let on_event = Arc::new(on_event);
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "kegnet server listening");
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let server = Arc::clone(&self);
                        let on_event = Arc::clone(&on_event);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            server.serve_client(stream, addr, on_event, cancel).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "kegnet accept failed"),
                },
            }
        }
        self.clients.lock().clear();
        info!("kegnet server stopped");
    }

    async fn serve_client<F>(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        on_event: Arc<F>,
        cancel: CancellationToken,
    ) where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let _ = stream.set_nodelay(true);
        let (read_half, mut write_half) = stream.into_split();
        let (id, mut rx, kick) = self.register(addr);
        info!(client = id, %addr, "kegnet client connected");

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_half.write_all(&frame).await {
                    debug!(client = id, error = %e, "kegnet write failed");
                    break;
                }
            }
        });

        let mut frames = FramedRead::new(read_half, KegnetCodec::new());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = kick.cancelled() => break,
                next = frames.next() => match next {
                    Some(Ok(event)) => {
                        debug!(client = id, event = %event.log_summary(), "kegnet rx");
                        on_event(event);
                    }
                    Some(Err(e)) => {
                        warn!(client = id, error = %e, "kegnet client error");
                        break;
                    }
                    None => break,
                },
            }
        }

        self.clients.lock().remove(&id);
        writer.abort();
        info!(client = id, %addr, "kegnet client disconnected");
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
