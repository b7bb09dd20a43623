// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide shutdown signal.
//!
//! Triggering closes a channel, so any `select!` that includes
//! [`Shutdown::closed`] unblocks at once; async tasks see the same moment
//! through the cancellation token.
//!
//! Each supervised thread holds a [`Shutdown::child`]: it fires when the
//! root fires, and can also be fired alone to stop just that thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

struct Inner {
    triggered: AtomicBool,
    fault: Mutex<Option<String>>,
    sender: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
    token: CancellationToken,
    hooks: Mutex<Vec<Hook>>,
    parent: Option<Shutdown>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self::build(CancellationToken::new(), None)
    }

    fn build(token: CancellationToken, parent: Option<Shutdown>) -> Self {
        let (sender, closed) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                fault: Mutex::new(None),
                sender: Mutex::new(Some(sender)),
                closed,
                token,
                hooks: Mutex::new(Vec::new()),
                parent,
            }),
        }
    }

    /// A signal that fires with this one but can also be fired alone
    /// through [`Shutdown::trigger_local`]. Faults and [`Shutdown::trigger`]
    /// on the child reach this signal.
    pub fn child(&self) -> Shutdown {
        let child = Self::build(self.inner.token.child_token(), Some(self.clone()));
        let weak: Weak<Inner> = Arc::downgrade(&child.inner);
        self.on_trigger(move || {
            if let Some(inner) = weak.upgrade() {
                Shutdown { inner }.trigger_local();
            }
        });
        child
    }

    /// Begin shutdown of the whole tree this signal belongs to. Idempotent.
    pub fn trigger(&self) {
        match &self.inner.parent {
            Some(parent) => parent.trigger(),
            None => self.trigger_local(),
        }
    }

    /// Fire this signal and its children, leaving the parent untouched.
    pub fn trigger_local(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.inner.parent.is_none() {
            tracing::info!("shutdown triggered");
        }
        self.inner.sender.lock().take();
        self.inner.token.cancel();
        for hook in self.inner.hooks.lock().iter() {
            hook();
        }
    }

    /// Remember why the process is going down, so it exits non-zero.
    /// Only the first reason is kept.
    pub fn record_fault(&self, reason: impl Into<String>) {
        if let Some(parent) = &self.inner.parent {
            parent.record_fault(reason);
            return;
        }
        let reason = reason.into();
        tracing::error!(%reason, "fault recorded");
        self.inner.fault.lock().get_or_insert(reason);
    }

    pub fn trigger_fault(&self, reason: impl Into<String>) {
        self.record_fault(reason);
        self.trigger();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    pub fn fault(&self) -> Option<String> {
        match &self.inner.parent {
            Some(parent) => parent.fault(),
            None => self.inner.fault.lock().clone(),
        }
    }

    /// Disconnected once shutdown starts; use as a `select!` arm.
    pub fn closed(&self) -> &Receiver<()> {
        &self.inner.closed
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Run `hook` on trigger, or now if already triggered. Used to unblock
    /// waits that cannot select on [`Shutdown::closed`].
    pub fn on_trigger(&self, hook: impl Fn() + Send + Sync + 'static) {
        let mut hooks = self.inner.hooks.lock();
        if self.is_triggered() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }

    /// Block until triggered or `timeout` passes. True when triggered.
    pub fn wait_timeout(&self, timeout: std::time::Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let _ = self.inner.closed.recv_timeout(timeout);
        self.is_triggered()
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
