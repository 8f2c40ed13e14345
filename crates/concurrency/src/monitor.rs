//! A lock paired with a condition variable.
//!
//! `Monitor` is the shared rendezvous between a daemon and the threads
//! that feed it: callers take the lock, change some state, and notify;
//! the waiting side re-checks that state under the same lock before it
//! blocks, so a notification is never lost.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Guard returned by [`Monitor::lock`].
pub type MonitorGuard<'a> = MutexGuard<'a, ()>;

/// Mutual exclusion plus wait/notify, shared through `Arc`.
#[derive(Debug, Default)]
pub struct Monitor {
    mutex: Mutex<()>,
    cond: Condvar,
}

impl Monitor {
    /// Create an unlocked monitor with no waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the monitor's lock.
    pub fn lock(&self) -> MonitorGuard<'_> {
        self.mutex.lock()
    }

    /// Block until notified. The lock is released while waiting.
    pub fn wait(&self, guard: &mut MonitorGuard<'_>) {
        self.cond.wait(guard);
    }

    /// Wait with a millisecond timeout.
    ///
    /// `0` waits until notified and a negative value returns at once.
    /// Returns `true` if the wait ended without a notification.
    pub fn wait_millis(&self, guard: &mut MonitorGuard<'_>, millis: i64) -> bool {
        match millis {
            0 => {
                self.cond.wait(guard);
                false
            }
            n if n < 0 => true,
            n => self
                .cond
                .wait_for(guard, Duration::from_millis(n as u64))
                .timed_out(),
        }
    }

    /// Wake one waiter. Returns whether a thread was woken.
    pub fn notify_one(&self) -> bool {
        self.cond.notify_one()
    }

    /// Wake every waiter. Returns the number of threads woken.
    pub fn notify_all(&self) -> usize {
        self.cond.notify_all()
    }

    /// Take the lock and wake every waiter.
    ///
    /// Use this when the state the waiters check was changed without
    /// holding the lock.
    pub fn signal_all(&self) {
        let _guard = self.mutex.lock();
        self.cond.notify_all();
    }
}
