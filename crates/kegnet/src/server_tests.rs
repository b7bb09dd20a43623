// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::KegnetClient;
use kb_core::test_support::meter_update_event;
use kb_core::{FlowState, TokenState};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Harness {
    server: Arc<KegnetServer>,
    addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

async fn start() -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(KegnetServer::new());
    let (tx, received) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&server).run(
        listener,
        move |event| {
            let _ = tx.send(event);
        },
        cancel.clone(),
    ));
    Harness { server, addr, received, cancel, task }
}

async fn wait_for_clients(server: &KegnetServer, count: usize) {
    for _ in 0..200 {
        if server.client_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} clients, have {}", server.client_count());
}

async fn connect(addr: SocketAddr) -> KegnetClient {
    let mut client = KegnetClient::new(addr.to_string());
    assert!(client.reconnect().await);
    client
}

fn flow_update() -> Event {
    Event::FlowUpdate {
        flow_id: 9,
        tap_name: "kegboard.flow0".into(),
        state: FlowState::Active,
        username: Some("alice".into()),
        start_time_ms: 1,
        last_activity_time_ms: 2,
        ticks: 3,
    }
}

#[tokio::test]
async fn broadcasts_to_every_client() {
    let h = start().await;
    let mut a = connect(h.addr).await;
    let mut b = connect(h.addr).await;
    wait_for_clients(&h.server, 2).await;

    assert_eq!(h.server.send_event_to_clients(&flow_update()).unwrap(), 2);
    assert_eq!(a.recv_event().await.unwrap(), Some(flow_update()));
    assert_eq!(b.recv_event().await.unwrap(), Some(flow_update()));
    h.cancel.cancel();
}

#[tokio::test]
async fn client_events_are_handed_over() {
    let mut h = start().await;
    let mut client = connect(h.addr).await;

    client.send_meter_update("kegboard.flow0", 1234).await.unwrap();
    client.send_auth_token_add("kegboard.flow0", "core.rfid", "abcd").await.unwrap();

    assert_eq!(h.received.recv().await, Some(meter_update_event("kegboard.flow0", 1234)));
    assert!(matches!(
        h.received.recv().await,
        Some(Event::TokenAuth { status: TokenState::Added, .. })
    ));
    h.cancel.cancel();
}

#[tokio::test]
async fn disconnected_client_is_dropped() {
    let h = start().await;
    let mut stay = connect(h.addr).await;
    let leave = connect(h.addr).await;
    wait_for_clients(&h.server, 2).await;

    drop(leave);
    wait_for_clients(&h.server, 1).await;

    assert_eq!(h.server.send_event_to_clients(&Event::Ping {}).unwrap(), 1);
    assert_eq!(stay.recv_event().await.unwrap(), Some(Event::Ping {}));
    h.cancel.cancel();
}

#[tokio::test]
async fn broadcast_with_no_clients_reaches_nobody() {
    let h = start().await;
    assert_eq!(h.server.send_event_to_clients(&Event::Ping {}).unwrap(), 0);
    h.cancel.cancel();
}

#[tokio::test]
async fn cancel_stops_server_and_clears_clients() {
    let h = start().await;
    let mut client = connect(h.addr).await;
    wait_for_clients(&h.server, 1).await;

    h.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), h.task).await.unwrap().unwrap();
    assert_eq!(h.server.client_count(), 0);

    // the serving task closes the socket once cancelled
    let closed = tokio::time::timeout(Duration::from_secs(2), client.recv_event()).await.unwrap();
    assert!(matches!(closed, Ok(None) | Err(_)));
}

#[test]
fn stalled_client_is_dropped_when_its_queue_fills() {
    let server = KegnetServer::new();
    let addr: SocketAddr = "127.0.0.1:9805".parse().unwrap();
    let (_, _stalled_rx, stalled_kick) = server.register(addr);
    let (_, mut healthy_rx, healthy_kick) = server.register(addr);

    for _ in 0..CLIENT_QUEUE {
        assert_eq!(server.send_event_to_clients(&Event::Ping {}).unwrap(), 2);
        assert!(healthy_rx.try_recv().is_ok());
    }
    assert!(!stalled_kick.is_cancelled());

    assert_eq!(server.send_event_to_clients(&Event::Ping {}).unwrap(), 1);
    assert!(stalled_kick.is_cancelled());
    assert!(!healthy_kick.is_cancelled());
    assert_eq!(server.client_count(), 1);
    assert!(healthy_rx.try_recv().is_ok());
}

#[test]
fn closed_client_queue_is_dropped() {
    let server = KegnetServer::new();
    let (_, rx, kick) = server.register("127.0.0.1:9805".parse().unwrap());
    drop(rx);

    assert_eq!(server.send_event_to_clients(&Event::Ping {}).unwrap(), 0);
    assert!(kick.is_cancelled());
}
