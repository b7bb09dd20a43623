//! Auth specs
//!
//! A known token on the board's onewire reader opens the taps for its
//! owner; lifting it ends those flows.

use crate::prelude::*;
use kb_core::AuthToken;
use kb_kegboard::OnewirePresence;

const TOKEN_ID: u64 = 0x0000_1111_2222_3333;

fn config_with_token() -> Config {
    let mut config = Config::default();
    config.tokens.push(AuthToken {
        auth_device: "core.onewire".to_string(),
        token_value: format!("{TOKEN_ID:016x}"),
        username: Some("alice".to_string()),
        enabled: true,
    });
    config
}

#[test]
fn presented_token_opens_every_tap_for_its_owner() {
    let running = start_core(config_with_token());
    let mut peer = running.peer();

    running.board.send(OnewirePresence { device_id: TOKEN_ID, status: 1 });

    let mut taps = Vec::new();
    for _ in 0..2 {
        let Event::FlowUpdate { tap_name, username, .. } =
            peer.expect("user flow", flow_update(FlowState::Initial))
        else {
            unreachable!()
        };
        assert_eq!(username.as_deref(), Some("alice"));
        taps.push(tap_name);
    }
    taps.sort();
    assert_eq!(taps, vec!["kegboard.flow0", "kegboard.flow1"]);

    running.board.wait_for_command(&Message::SetOutput(SetOutput { output_id: 0, output_mode: true }));
    running.board.wait_for_command(&Message::SetOutput(SetOutput { output_id: 1, output_mode: true }));

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn lifting_a_captive_token_ends_the_flow() {
    let running = start_core(config_with_token());
    let mut peer = running.peer();

    running.board.send(OnewirePresence { device_id: TOKEN_ID, status: 1 });
    peer.expect("user flow", flow_update(FlowState::Initial));
    running.board.send(OnewirePresence { device_id: TOKEN_ID, status: 0 });

    let completed = peer.expect("completed flow", flow_update(FlowState::Completed));
    assert!(matches!(completed, Event::FlowUpdate { username: Some(ref u), .. } if u == "alice"));
    running.board.wait_for_command(&Message::SetOutput(SetOutput { output_id: 0, output_mode: false }));

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn unknown_token_starts_nothing() {
    let running = start_core(config_with_token());
    let mut peer = running.peer();

    peer.send(Event::TokenAuth {
        tap_name: "kegboard.flow0".to_string(),
        auth_device_name: "core.onewire".to_string(),
        token_value: "ffffffffffffffff".to_string(),
        status: TokenState::Added,
    });
    peer.send(Event::FlowRequest {
        tap_name: "kegboard.flow0".to_string(),
        request: FlowAction::StartFlow,
    });

    let Event::FlowUpdate { username, .. } = peer.expect("flow", flow_update(FlowState::Initial))
    else {
        unreachable!()
    };
    assert_eq!(username, None);

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}
