//! Dispatch outcome counters.
//!
//! Routing misses, bounded-wait timeouts and handler failures all reach the
//! client as plain status codes; these counters keep them apart for
//! monitoring.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on the request path
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    requests: AtomicU64,
    matched: AtomicU64,
    not_found: AtomicU64,
    wait_started: AtomicU64,
    wait_woken: AtomicU64,
    wait_timed_out: AtomicU64,
    handler_failures: AtomicU64,
    handler_panics: AtomicU64,
    rejected_inactive: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchMetricsSnapshot {
    /// Requests received by `handle`
    pub requests: u64,
    /// Requests that reached a handler
    pub matched: u64,
    /// Requests answered 404, with or without waiting
    pub not_found: u64,
    /// Requests that entered the bounded wait
    pub wait_started: u64,
    /// Waiting requests that found a route
    pub wait_woken: u64,
    /// Waiting requests whose delay expired
    pub wait_timed_out: u64,
    /// Handlers that returned an error
    pub handler_failures: u64,
    /// Handlers that panicked
    pub handler_panics: u64,
    /// Requests refused because the dispatcher was not active
    pub rejected_inactive: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl DispatchMetrics {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_request, requests);
    counter!(record_matched, matched);
    counter!(record_not_found, not_found);
    counter!(record_wait_started, wait_started);
    counter!(record_wait_woken, wait_woken);
    counter!(record_wait_timed_out, wait_timed_out);
    counter!(record_handler_failure, handler_failures);
    counter!(record_handler_panic, handler_panics);
    counter!(record_rejected_inactive, rejected_inactive);

    /// Copy the current values
    #[must_use]
    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            wait_started: self.wait_started.load(Ordering::Relaxed),
            wait_woken: self.wait_woken.load(Ordering::Relaxed),
            wait_timed_out: self.wait_timed_out.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            rejected_inactive: self.rejected_inactive.load(Ordering::Relaxed),
        }
    }
}
