// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight gate for token refreshes.
//!
//! The first `acquire_lock` takes the lock and is queued as waiter 0. Every
//! later call while locked joins the queue instead of starting its own
//! refresh. `release_lock` unlocks and resolves all queued waiters in the
//! order they were queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

#[derive(Default)]
struct LockState {
    locked: bool,
    waiters: Vec<oneshot::Sender<usize>>,
}

#[derive(Default)]
pub struct RefreshLock {
    state: Mutex<LockState>,
}

impl RefreshLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a waiter, taking the lock if it is free.
    ///
    /// The waiter resolves on the next `release_lock`; check `is_owner` to
    /// learn whether this caller is the one expected to refresh.
    pub fn acquire_lock(&self) -> RefreshWaiter {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let owner = !state.locked;
        state.locked = true;

        let (tx, rx) = oneshot::channel();
        let position = state.waiters.len();
        state.waiters.push(tx);

        RefreshWaiter {
            owner,
            position,
            rx,
        }
    }

    /// Unlock and wake every waiter in FIFO order. No-op when unlocked.
    pub fn release_lock(&self) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.locked {
                return;
            }
            state.locked = false;
            std::mem::take(&mut state.waiters)
        };

        tracing::debug!(waiters = waiters.len(), "Refresh lock released");
        for (order, waiter) in waiters.into_iter().enumerate() {
            // A dropped waiter just means its caller stopped listening.
            let _ = waiter.send(order);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .locked
    }
}

/// Pending release of a [`RefreshLock`]. Resolves to the order in which it
/// was woken.
pub struct RefreshWaiter {
    owner: bool,
    position: usize,
    rx: oneshot::Receiver<usize>,
}

impl RefreshWaiter {
    /// True for the caller that found the lock free.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Place in the queue at acquisition time.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Future for RefreshWaiter {
    type Output = usize;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let position = self.position;
        // If the lock itself is dropped the sender goes with it; treat that as released.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(position))
    }
}

/// Releases the lock when dropped, so an owner that errors or is cancelled
/// never strands its waiters.
pub(crate) struct LockRelease<'a> {
    lock: &'a RefreshLock,
}

impl<'a> LockRelease<'a> {
    pub(crate) fn new(lock: &'a RefreshLock) -> Self {
        Self { lock }
    }
}

impl Drop for LockRelease<'_> {
    fn drop(&mut self) {
        self.lock.release_lock();
    }
}
