//! # Registration Waiter
//!
//! A version-counter monitor that lets a request thread sleep until the route
//! set changes or a deadline passes.
//!
//! ## Protocol
//!
//! ```text
//! seen = waiter.version()        // 1. capture before looking up
//! table.lookup(...)              // 2. miss
//! waiter.await_change(seen, dl)  // 3. returns at once if version != seen
//! ```
//!
//! The version is only ever incremented while holding the monitor mutex, and
//! `await_change` compares it against `seen` under that same mutex before
//! parking. A signal landing between steps 1 and 3 therefore either bumps the
//! version before the comparison (no sleep) or blocks until the waiter has
//! parked and then wakes it. No wakeup is lost.
//!
//! Waiting never holds the route table's writer lock, so a concurrent
//! registration can always complete and wake the sleeper.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

/// Outcome of [`RegistrationWaiter::await_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The version moved past the captured snapshot
    Changed(u64),
    /// The deadline passed with no change
    TimedOut,
    /// The caller's cancellation check turned true
    Cancelled,
}

impl WaitOutcome {
    /// True if the caller should re-check the route table
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, WaitOutcome::Changed(_))
    }
}

/// Monotonic change counter with blocking waits
///
/// The waiter carries no lifecycle state of its own. Callers that need to be
/// released early (a dispatcher shutting down) pass a cancellation check to
/// [`await_change_or_cancel`](Self::await_change_or_cancel), set their own
/// flag, then call [`wake_all`](Self::wake_all).
#[derive(Debug, Default)]
pub struct RegistrationWaiter {
    version: AtomicU64,
    lock: Mutex<()>,
    changed: Condvar,
}

impl RegistrationWaiter {
    /// Create a waiter at version 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Bump the version and wake every waiter, returning the new version
    pub fn signal(&self) -> u64 {
        let next = {
            let _guard = self.lock.lock();
            self.version.fetch_add(1, Ordering::SeqCst) + 1
        };
        let woken = self.changed.notify_all();
        trace!(version = next, woken = woken, "Registration change signalled");
        next
    }

    /// Wake every waiter without changing the version
    ///
    /// Waiters re-evaluate their cancellation check. Set the flag the check
    /// reads before calling this.
    pub fn wake_all(&self) {
        drop(self.lock.lock());
        self.changed.notify_all();
    }

    /// Block until the version differs from `seen` or the deadline passes
    ///
    /// Returns immediately when the version has already moved on.
    pub fn await_change(&self, seen: u64, deadline: Instant) -> WaitOutcome {
        self.await_change_or_cancel(seen, deadline, || false)
    }

    /// Like [`await_change`](Self::await_change), but also returns
    /// [`WaitOutcome::Cancelled`] once `cancelled` reports true
    ///
    /// `cancelled` is evaluated under the monitor lock before every park, so a
    /// flag set before [`wake_all`](Self::wake_all) is never missed.
    pub fn await_change_or_cancel<F>(&self, seen: u64, deadline: Instant, cancelled: F) -> WaitOutcome
    where
        F: Fn() -> bool,
    {
        let mut guard = self.lock.lock();
        loop {
            let current = self.version.load(Ordering::SeqCst);
            if current != seen {
                return WaitOutcome::Changed(current);
            }
            if cancelled() {
                return WaitOutcome::Cancelled;
            }
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                let current = self.version.load(Ordering::SeqCst);
                return if current != seen {
                    WaitOutcome::Changed(current)
                } else if cancelled() {
                    WaitOutcome::Cancelled
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn returns_immediately_when_version_already_moved() {
        let waiter = RegistrationWaiter::new();
        let seen = waiter.version();
        waiter.signal();
        let start = Instant::now();
        let outcome = waiter.await_change(seen, Instant::now() + Duration::from_secs(5));
        assert_eq!(outcome, WaitOutcome::Changed(seen + 1));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn times_out_without_signal() {
        let waiter = RegistrationWaiter::new();
        let start = Instant::now();
        let outcome = waiter.await_change(waiter.version(), Instant::now() + Duration::from_millis(100));
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn wakes_on_signal_from_other_thread() {
        let waiter = Arc::new(RegistrationWaiter::new());
        let seen = waiter.version();
        let signaller = Arc::clone(&waiter);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signaller.signal();
        });

        let start = Instant::now();
        let outcome = waiter.await_change(seen, Instant::now() + Duration::from_secs(5));
        assert!(outcome.changed());
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn cancellation_wakes_only_the_cancelled_waiter() {
        let waiter = Arc::new(RegistrationWaiter::new());
        let stop = Arc::new(AtomicBool::new(false));

        let cancelled = {
            let waiter = Arc::clone(&waiter);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                waiter.await_change_or_cancel(
                    waiter.version(),
                    Instant::now() + Duration::from_secs(5),
                    || stop.load(Ordering::SeqCst),
                )
            })
        };
        let bystander = {
            let waiter = Arc::clone(&waiter);
            thread::spawn(move || {
                waiter.await_change(waiter.version(), Instant::now() + Duration::from_millis(300))
            })
        };

        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
        waiter.wake_all();

        assert_eq!(cancelled.join().unwrap(), WaitOutcome::Cancelled);
        assert_eq!(bystander.join().unwrap(), WaitOutcome::TimedOut);
        assert_eq!(waiter.version(), 0);
    }
}
