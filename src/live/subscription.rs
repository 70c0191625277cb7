//! Subscription handle and the state shared with its dispatcher thread.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, warn};

/// Lifecycle of a live subscription. `Detached` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unattached,
    Attached,
    Detached,
}

struct Gate {
    state: SubscriptionState,
    delivering: bool,
}

type Release = Box<dyn FnOnce() + Send>;

pub(crate) struct Shared {
    gate: Mutex<Gate>,
    idle: Condvar,
    release: Mutex<Option<Release>>,
    dispatcher: Mutex<Option<ThreadId>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            gate: Mutex::new(Gate {
                state: SubscriptionState::Unattached,
                delivering: false,
            }),
            idle: Condvar::new(),
            release: Mutex::new(None),
            dispatcher: Mutex::new(None),
        }
    }

    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unattached -> Attached, remembering how to release the store listener.
    pub(crate) fn attach(&self, release: Release) {
        *self.release.lock().unwrap_or_else(PoisonError::into_inner) = Some(release);
        let mut gate = self.gate();
        if gate.state == SubscriptionState::Unattached {
            gate.state = SubscriptionState::Attached;
        }
    }

    pub(crate) fn set_dispatcher(&self, id: ThreadId) {
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        self.gate().state
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.state() == SubscriptionState::Detached
    }

    /// Claim the right to run `on_update`. False once detached.
    pub(crate) fn begin_delivery(&self) -> bool {
        let mut gate = self.gate();
        if gate.state != SubscriptionState::Attached {
            return false;
        }
        gate.delivering = true;
        true
    }

    pub(crate) fn end_delivery(&self) {
        self.gate().delivering = false;
        self.idle.notify_all();
    }

    /// Attached -> Detached because the feed failed. True if this call made
    /// the transition, i.e. `on_error` should fire.
    pub(crate) fn fail(&self) -> bool {
        let mut gate = self.gate();
        if gate.state == SubscriptionState::Attached {
            gate.state = SubscriptionState::Detached;
            true
        } else {
            false
        }
    }

    /// Release the store listener. Runs at most once.
    pub(crate) fn release(&self) {
        let release = self
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(release) = release {
            release();
        }
    }

    fn on_dispatcher_thread(&self) -> bool {
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }

    fn detach(&self, timeout: Duration) {
        let mut gate = self.gate();
        if gate.state == SubscriptionState::Detached {
            return;
        }
        gate.state = SubscriptionState::Detached;

        if gate.delivering && !self.on_dispatcher_thread() {
            let (_gate, wait) = self
                .idle
                .wait_timeout_while(gate, timeout, |gate| gate.delivering)
                .unwrap_or_else(PoisonError::into_inner);
            if wait.timed_out() {
                warn!(?timeout, "delivery still running, forcing detach");
            }
        } else {
            drop(gate);
        }

        self.release();
        debug!("live subscription detached");
    }
}

/// Handle for a live subscription.
///
/// Dropping the handle detaches it.
pub struct Subscription {
    shared: Arc<Shared>,
    detach_timeout: Duration,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<Shared>, detach_timeout: Duration) -> Self {
        Self {
            shared,
            detach_timeout,
        }
    }

    /// Stop deliveries and release the underlying listener.
    ///
    /// Waits up to the configured detach timeout for an `on_update` already in
    /// progress, then releases regardless. Detaching twice is a no-op.
    pub fn detach(&self) {
        self.shared.detach(self.detach_timeout);
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.detach(self.detach_timeout);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state())
            .finish()
    }
}
