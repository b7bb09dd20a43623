// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kegnet client used by satellites and the kegboard bridge.

use crate::backoff::Backoff;
use crate::codec::KegnetCodec;
use crate::error::ProtocolError;
use futures_util::{SinkExt, StreamExt};
use kb_core::{Event, FlowAction, TokenState};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;

/// A single persistent connection to the core.
pub struct KegnetClient {
    addr: String,
    backoff: Backoff,
    retries: u32,
    last_attempt: Option<Instant>,
    conn: Option<Framed<TcpStream, KegnetCodec>>,
}

impl KegnetClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            backoff: Backoff::default(),
            retries: 0,
            last_attempt: None,
            conn: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Consecutive failed connection attempts.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// How long [`reconnect`](Self::reconnect) would wait before trying.
    pub fn reconnect_delay(&self) -> std::time::Duration {
        match self.last_attempt {
            None => std::time::Duration::ZERO,
            Some(at) => self.backoff.delay(self.retries).saturating_sub(at.elapsed()),
        }
    }

    /// Connect unless already connected, waiting out the backoff first.
    ///
    /// Connection errors are counted and swallowed; returns whether the
    /// client is connected afterwards.
    pub async fn reconnect(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }

        let delay = self.reconnect_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.last_attempt = Some(Instant::now());

        tracing::info!(addr = %self.addr, "connecting to kegnet server");
        match TcpStream::connect(&self.addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                self.conn = Some(Framed::new(stream, KegnetCodec::new()));
                self.retries = 0;
                tracing::info!(addr = %self.addr, "kegnet connected");
                true
            }
            Err(e) => {
                self.retries = self.retries.saturating_add(1);
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    retry_in = ?self.backoff.delay(self.retries),
                    "kegnet connection failed"
                );
                false
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            tracing::info!(addr = %self.addr, "kegnet disconnected");
        }
    }

    /// Send one event. A write failure drops the connection.
    pub async fn send_event(&mut self, event: &Event) -> Result<(), ProtocolError> {
        let conn = self.conn.as_mut().ok_or(ProtocolError::NotConnected)?;
        let sent = conn.send(event).await;
        if sent.is_err() {
            self.disconnect();
        }
        sent
    }

    /// Next event from the server; `Ok(None)` once the server hangs up.
    pub async fn recv_event(&mut self) -> Result<Option<Event>, ProtocolError> {
        let conn = self.conn.as_mut().ok_or(ProtocolError::NotConnected)?;
        let next = conn.next().await;
        match next {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => {
                self.disconnect();
                Err(e)
            }
            None => {
                self.disconnect();
                Ok(None)
            }
        }
    }

    pub async fn send_ping(&mut self) -> Result<(), ProtocolError> {
        self.send_event(&Event::Ping {}).await
    }

    pub async fn send_meter_update(
        &mut self,
        tap_name: &str,
        reading: u64,
    ) -> Result<(), ProtocolError> {
        self.send_event(&Event::MeterUpdate { tap_name: tap_name.to_string(), reading }).await
    }

    pub async fn send_flow_start(&mut self, tap_name: &str) -> Result<(), ProtocolError> {
        self.send_flow_request(tap_name, FlowAction::StartFlow).await
    }

    pub async fn send_flow_stop(&mut self, tap_name: &str) -> Result<(), ProtocolError> {
        self.send_flow_request(tap_name, FlowAction::StopFlow).await
    }

    async fn send_flow_request(
        &mut self,
        tap_name: &str,
        request: FlowAction,
    ) -> Result<(), ProtocolError> {
        self.send_event(&Event::FlowRequest { tap_name: tap_name.to_string(), request }).await
    }

    pub async fn send_thermo_update(
        &mut self,
        sensor_name: &str,
        sensor_value: f64,
    ) -> Result<(), ProtocolError> {
        self.send_event(&Event::ThermoUpdate { sensor_name: sensor_name.to_string(), sensor_value })
            .await
    }

    pub async fn send_auth_token_add(
        &mut self,
        tap_name: &str,
        auth_device_name: &str,
        token_value: &str,
    ) -> Result<(), ProtocolError> {
        self.send_token(tap_name, auth_device_name, token_value, TokenState::Added).await
    }

    pub async fn send_auth_token_remove(
        &mut self,
        tap_name: &str,
        auth_device_name: &str,
        token_value: &str,
    ) -> Result<(), ProtocolError> {
        self.send_token(tap_name, auth_device_name, token_value, TokenState::Removed).await
    }

    async fn send_token(
        &mut self,
        tap_name: &str,
        auth_device_name: &str,
        token_value: &str,
        status: TokenState,
    ) -> Result<(), ProtocolError> {
        self.send_event(&Event::TokenAuth {
            tap_name: tap_name.to_string(),
            auth_device_name: auth_device_name.to_string(),
            token_value: token_value.to_string(),
            status,
        })
        .await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
