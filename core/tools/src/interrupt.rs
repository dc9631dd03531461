//! Cooperative interrupt latch.
//!
//! The host arms the manager at turn start and triggers it from any context
//! (signal handler, TUI keypress). The scheduler and long-running handlers
//! observe the latch and wind down cooperatively.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Notify;

/// One-shot interrupt latch.
///
/// Fires at most once per arming; `check()` keeps reporting fired until an
/// explicit `clear()`.
#[derive(Debug, Default)]
pub struct InterruptManager {
    armed: AtomicBool,
    fired: AtomicBool,
    notify: Notify,
}

impl InterruptManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the latch for the coming turn.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Fire the interrupt. Returns true if this call transitioned the latch.
    ///
    /// Safe to call from a signal handler context: only atomics and a
    /// `Notify` wakeup are involved.
    pub fn trigger(&self) -> bool {
        if !self.armed.load(Ordering::SeqCst) {
            return false;
        }
        let transitioned = !self.fired.swap(true, Ordering::SeqCst);
        if transitioned {
            self.notify.notify_waiters();
        }
        transitioned
    }

    /// Non-blocking check.
    pub fn check(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Reset the latch after the host has handled the interrupt.
    pub fn clear(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    /// Wait until fired, or until `timeout` elapses. Returns whether fired.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, self.wait_until_fired())
                    .await
                    .is_ok()
            }
            None => {
                self.wait_until_fired().await;
                true
            }
        }
    }

    /// Wait indefinitely for the latch to fire.
    pub async fn wait_until_fired(&self) {
        loop {
            if self.check() {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering to close the trigger/await race.
            if self.check() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "interrupt.test.rs"]
mod tests;
