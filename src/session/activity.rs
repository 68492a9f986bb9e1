// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Idle-session detection.
//!
//! User activity is debounced before it touches the idle timer, so a burst
//! of pointer moves reschedules once. The idle timer fires the expiry
//! callback once and stays quiet until the next activity.

use crate::config::{DEFAULT_ACTIVITY_DEBOUNCE, DEFAULT_IDLE_TIMEOUT};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub type SessionExpiredCallback = Arc<dyn Fn() + Send + Sync>;

struct TrackerState {
    tracking: bool,
    timeout: Duration,
    debounce: Duration,
    last_activity: Option<Instant>,
    debounce_task: Option<JoinHandle<()>>,
    idle_task: Option<JoinHandle<()>>,
    /// Bumped on every reschedule; a timer from an older generation never fires.
    generation: u64,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    callback: Mutex<Option<SessionExpiredCallback>>,
}

pub struct ActivityTracker {
    inner: Arc<TrackerInner>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, DEFAULT_ACTIVITY_DEBOUNCE)
    }
}

impl ActivityTracker {
    pub fn new(timeout: Duration, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState {
                    tracking: false,
                    timeout,
                    debounce,
                    last_activity: None,
                    debounce_task: None,
                    idle_task: None,
                    generation: 0,
                }),
                callback: Mutex::new(None),
            }),
        }
    }

    /// Register the callback fired when the idle timer elapses.
    pub fn on_session_expired<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self
            .inner
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
    }

    /// Record user activity. Ignored while not tracking.
    pub fn track_activity(&self) {
        let mut state = self.inner.lock_state();
        if !state.tracking {
            return;
        }
        if let Some(pending) = state.debounce_task.take() {
            pending.abort();
        }

        let weak = Arc::downgrade(&self.inner);
        let debounce = state.debounce;
        state.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                inner.reset_inactivity_timer();
            }
        }));
    }

    /// Mark activity now and restart the idle timer.
    pub fn reset_inactivity_timer(&self) {
        self.inner.reset_inactivity_timer();
    }

    pub fn start_tracking(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.tracking {
                return;
            }
            state.tracking = true;
        }
        tracing::debug!("Activity tracking started");
        self.inner.reset_inactivity_timer();
    }

    pub fn stop_tracking(&self) {
        let mut state = self.inner.lock_state();
        if !state.tracking {
            return;
        }
        state.tracking = false;
        state.generation += 1;
        state.abort_timers();
        tracing::debug!("Activity tracking stopped");
    }

    /// Change the idle threshold; restarts the timer if tracking.
    pub fn set_timeout_duration(&self, timeout: Duration) {
        let tracking = {
            let mut state = self.inner.lock_state();
            state.timeout = timeout;
            state.tracking
        };
        if tracking {
            self.inner.reset_inactivity_timer();
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.lock_state().tracking
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.inner.lock_state().last_activity
    }
}

impl Drop for ActivityTracker {
    fn drop(&mut self) {
        self.inner.lock_state().abort_timers();
    }
}

impl TrackerState {
    fn abort_timers(&mut self) {
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        if let Some(task) = self.idle_task.take() {
            task.abort();
        }
    }
}

impl TrackerInner {
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset_inactivity_timer(self: &Arc<Self>) {
        let mut state = self.lock_state();
        state.last_activity = Some(Instant::now());
        if let Some(task) = state.idle_task.take() {
            task.abort();
        }
        if !state.tracking {
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        let timeout = state.timeout;
        let weak: Weak<TrackerInner> = Arc::downgrade(self);

        state.idle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_expired(generation);
            }
        }));
    }

    fn fire_expired(&self, generation: u64) {
        {
            let mut state = self.lock_state();
            if !state.tracking || state.generation != generation {
                return;
            }
            state.idle_task = None;
        }

        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        tracing::info!("Session idle timeout reached");
        if let Some(callback) = callback {
            callback();
        }
    }
}
