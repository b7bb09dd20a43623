//! Bridge specs
//!
//! A bridge feeds its board into a running core; the core's flows and
//! relay decisions come back through the bridge to the board.

use crate::prelude::*;
use kb_kegboard::OnewirePresence;

#[test]
fn bridged_board_pours_through_the_core() {
    let mut config = Config::default();
    config.tokens.push(kb_core::AuthToken {
        auth_device: "core.onewire".to_string(),
        token_value: "00000000000000aa".to_string(),
        username: Some("bob".to_string()),
        enabled: true,
    });
    let core = start_core(config.clone());
    let mut peer = core.peer();

    config.kegnet.core_addr = core.addr.clone();
    config.kegnet.reconnect_backoff_secs = vec![0];
    let (board, io) = FakeBoard::new();
    let bridge = kb_daemon::start_bridge(&config, io).unwrap();
    wait_for("bridge connection", || core.core.server.client_count() == 2);

    board.hello();
    board.send(OnewirePresence { device_id: 0xaa, status: 1 });
    let Event::FlowUpdate { username, .. } = peer.expect("user flow", flow_update(FlowState::Initial))
    else {
        unreachable!()
    };
    assert_eq!(username.as_deref(), Some("bob"));
    board.wait_for_command(&Message::SetOutput(SetOutput { output_id: 0, output_mode: true }));

    board.meter("flow0", 300);
    board.meter("flow0", 360);
    let active = peer.expect("active flow", flow_update(FlowState::Active));
    assert!(matches!(active, Event::FlowUpdate { ticks: 60, .. }));

    bridge.stop();
    assert!(bridge.shutdown.wait_timeout(TIMEOUT));
    drop(board);
    assert_eq!(bridge.finish(TIMEOUT), Outcome::Clean);

    drop(peer);
    assert_eq!(core.stop(), Outcome::Clean);
}
