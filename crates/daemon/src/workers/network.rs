// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network thread: a single-threaded tokio runtime hosting the Kegnet
//! server. All socket I/O stays on this thread.

use std::net::TcpListener;
use std::sync::Arc;

use kb_core::{Event, EventKind};
use kb_kegnet::KegnetServer;

use crate::hub::Publisher;
use crate::lifecycle::LifecycleError;
use crate::shutdown::Shutdown;

/// Bind the Kegnet listener up front so address errors surface at startup.
pub fn bind(addr: &str) -> Result<TcpListener, LifecycleError> {
    let listener =
        TcpListener::bind(addr).map_err(|e| LifecycleError::BindFailed(addr.to_string(), e))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Publish an event received from a peer. Peers may not shut the core down.
fn publish_peer_event(publisher: &Publisher, event: Event) {
    if event.kind() == EventKind::Quit {
        tracing::warn!("ignoring quit from kegnet peer");
        return;
    }
    tracing::debug!(event = %event.log_summary(), "kegnet rx");
    publisher.publish(event);
}

pub fn run(
    server: Arc<KegnetServer>,
    listener: TcpListener,
    publisher: Publisher,
    shutdown: &Shutdown,
) -> Result<(), LifecycleError> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let cancel = shutdown.token();
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        tracing::info!(addr = %listener.local_addr()?, "kegnet server listening");
        server.run(listener, move |event| publish_peer_event(&publisher, event), cancel).await;
        Ok::<_, LifecycleError>(())
    })?;
    tracing::info!("network thread stopped");
    Ok(())
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
