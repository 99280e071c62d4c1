//! Dispatcher core - request handling and admission control.
//!
//! `handle` looks the request up in the route table. On a hit the bound
//! operation runs on the calling thread. On a miss the admission
//! configuration decides between an immediate 404 and a bounded wait during
//! which the request sleeps on the registration waiter and re-checks the
//! table after every change.

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use http::{Method, StatusCode};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::metrics::DispatchMetrics;
use super::operation::{HandlerRequest, HandlerResponse, OperationBase};
use crate::error::{ConfigError, RouteError};
use crate::ids::RequestId;
use crate::router::{PathTemplate, RouteDefinition, RouteId, RouteMatch, RouteTable};
use crate::runtime_config::AdmissionConfig;
use crate::waiter::WaitOutcome;

/// Configuration installed by [`Dispatcher::activate`]
#[derive(Debug)]
struct Activation {
    config: AdmissionConfig,
    activated_at: Instant,
    /// Set when this activation is shut down; releases its waiting requests
    closed: AtomicBool,
}

impl Activation {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Routes of one mounted [`OperationBase`]
#[derive(Debug)]
struct MountedBase {
    prefix: String,
    route_ids: Vec<RouteId>,
    /// Clone of the base's `Arc`; keeps its address from being reused while mounted
    _base: Box<dyn Any + Send + Sync>,
}

/// Identity of an operation base: the address of its `Arc` allocation
type BaseKey = usize;

fn base_key<B: OperationBase + ?Sized>(base: &Arc<B>) -> BaseKey {
    Arc::as_ptr(base).cast::<()>() as usize
}

/// Maps incoming requests to registered operations
///
/// The dispatcher keeps no route state of its own; routes live in the shared
/// [`RouteTable`]. It only holds the current activation and the bookkeeping
/// needed to unmount operation bases.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    activation: ArcSwapOption<Activation>,
    mounted: DashMap<BaseKey, MountedBase>,
    metrics: DispatchMetrics,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(RouteTable::new()))
    }
}

impl Dispatcher {
    /// Create an inactive dispatcher over `table`
    ///
    /// Requests are refused with 503 until [`activate`](Self::activate) is called.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            activation: ArcSwapOption::empty(),
            mounted: DashMap::new(),
            metrics: DispatchMetrics::new(),
        }
    }

    /// The route table this dispatcher reads
    #[must_use]
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Outcome counters
    #[must_use]
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Install an admission configuration and start accepting requests
    ///
    /// Calling it again replaces the configuration; requests already waiting
    /// keep the configuration they started with.
    pub fn activate(&self, config: AdmissionConfig) -> Result<(), ConfigError> {
        let config = config.validated()?;
        info!(
            register_on_start = ?config.register_on_start,
            delay_on_not_found_secs = config.delay_on_not_found_secs,
            routes = self.table.len(),
            "Dispatcher activated"
        );
        self.activation.store(Some(Arc::new(Activation {
            config,
            activated_at: Instant::now(),
            closed: AtomicBool::new(false),
        })));
        Ok(())
    }

    /// Stop accepting requests
    ///
    /// Requests parked in the bounded wait are released with 503. Mounted
    /// operation bases stay registered. Other dispatchers sharing the route
    /// table are unaffected.
    pub fn shutdown(&self) {
        if let Some(previous) = self.activation.swap(None) {
            previous.closed.store(true, Ordering::SeqCst);
            // Only requests waiting under this activation see the flag
            self.table.waiter().wake_all();
            info!(
                uptime_ms = previous.activated_at.elapsed().as_millis() as u64,
                "Dispatcher shut down"
            );
        }
    }

    /// True between [`activate`](Self::activate) and [`shutdown`](Self::shutdown)
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation.load().is_some()
    }

    /// Register every operation of `base` under its prefix
    ///
    /// All operations become visible together, or none do if one of them
    /// conflicts with an existing route or has an invalid template.
    pub fn add<B: OperationBase + ?Sized + 'static>(
        &self,
        base: &Arc<B>,
    ) -> Result<Vec<RouteId>, RouteError> {
        let prefix = base.prefix().to_string();
        let slot = match self.mounted.entry(base_key(base)) {
            Entry::Occupied(_) => return Err(RouteError::AlreadyMounted { prefix }),
            Entry::Vacant(slot) => slot,
        };

        let defs = base
            .operations()
            .into_iter()
            .map(|op| {
                Ok(RouteDefinition {
                    template: PathTemplate::with_prefix(&prefix, &op.template)?,
                    method: op.method,
                    handler: op.handler,
                })
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        let route_ids = self.table.register_all(defs)?;
        info!(
            prefix = %prefix,
            operations = route_ids.len(),
            "Operation base added"
        );
        slot.insert(MountedBase {
            prefix,
            route_ids: route_ids.clone(),
            _base: Box::new(Arc::clone(base)),
        });
        Ok(route_ids)
    }

    /// Unregister every operation of `base`
    ///
    /// Returns `false` if the base is not mounted, which makes a second
    /// removal a no-op.
    pub fn remove<B: OperationBase + ?Sized>(&self, base: &Arc<B>) -> bool {
        match self.mounted.remove(&base_key(base)) {
            Some((_, mounted)) => {
                let removed = self.table.unregister_all(&mounted.route_ids);
                info!(
                    prefix = %mounted.prefix,
                    removed = removed,
                    "Operation base removed"
                );
                true
            }
            None => {
                debug!(prefix = %base.prefix(), "Remove ignored - operation base not mounted");
                false
            }
        }
    }

    /// Handle one request
    ///
    /// Never fails for routing reasons: misses become 404, handler failures
    /// 5xx, and an inactive dispatcher answers 503.
    pub fn handle(&self, method: Method, path: &str, body: Bytes) -> HandlerResponse {
        let request_id = RequestId::new();
        self.metrics.record_request();

        let Some(activation) = self.activation.load_full() else {
            self.metrics.record_rejected_inactive();
            warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                "Request refused - dispatcher not active"
            );
            return HandlerResponse::error(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
        };

        let waiter = self.table.waiter();
        // D1: Version captured before the first lookup
        let mut seen = waiter.version();
        if let Some(route_match) = self.table.lookup(&method, path) {
            return self.invoke(request_id, route_match, method, path, body);
        }

        let config = &activation.config;
        if !config.should_wait(path) {
            // D2: Immediate 404
            self.metrics.record_not_found();
            info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                "No route - not found"
            );
            return HandlerResponse::not_found();
        }

        // D3: Bounded wait for a route to register
        let started = Instant::now();
        let deadline = started + config.delay();
        self.metrics.record_wait_started();
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            delay_secs = config.delay_on_not_found_secs,
            "No route yet - waiting for registration"
        );

        loop {
            match waiter.await_change_or_cancel(seen, deadline, || activation.is_closed()) {
                WaitOutcome::Changed(version) => {
                    seen = version;
                    if let Some(route_match) = self.table.lookup(&method, path) {
                        self.metrics.record_wait_woken();
                        info!(
                            request_id = %request_id,
                            method = %method,
                            path = %path,
                            version = version,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "Route registered while waiting"
                        );
                        return self.invoke(request_id, route_match, method, path, body);
                    }
                    debug!(
                        request_id = %request_id,
                        version = version,
                        "Route set changed - still no match"
                    );
                }
                WaitOutcome::TimedOut => {
                    // D4: Delay exhausted
                    self.metrics.record_wait_timed_out();
                    self.metrics.record_not_found();
                    info!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Wait for registration timed out - not found"
                    );
                    return HandlerResponse::not_found();
                }
                WaitOutcome::Cancelled => {
                    self.metrics.record_rejected_inactive();
                    warn!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        "Wait aborted - dispatcher shut down"
                    );
                    return HandlerResponse::error(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Service Unavailable",
                    );
                }
            }
        }
    }

    fn invoke(
        &self,
        request_id: RequestId,
        route_match: RouteMatch,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> HandlerResponse {
        self.metrics.record_matched();
        let RouteMatch { route, path_params } = route_match;

        // H1: Handler execution start
        debug!(
            request_id = %request_id,
            route_id = %route.id,
            template = %route.template,
            path_params = ?path_params,
            "Handler execution start"
        );

        let request = HandlerRequest {
            request_id,
            method,
            path: path.to_string(),
            path_params,
            body,
        };

        let execution_start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| (route.handler)(request)));
        let execution_time_ms = execution_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                // H2: Handler execution complete
                info!(
                    request_id = %request_id,
                    route_id = %route.id,
                    template = %route.template,
                    status = response.status.as_u16(),
                    execution_time_ms = execution_time_ms,
                    "Handler execution complete"
                );
                response
            }
            Ok(Err(err)) => {
                // H3: Handler reported failure
                self.metrics.record_handler_failure();
                let status = err.status();
                error!(
                    request_id = %request_id,
                    route_id = %route.id,
                    template = %route.template,
                    status = status.as_u16(),
                    error = %err,
                    execution_time_ms = execution_time_ms,
                    "Handler failed"
                );
                HandlerResponse::error(status, err.message())
            }
            Err(panic) => {
                // H4: Handler panicked
                self.metrics.record_handler_panic();
                let panic_message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(
                    request_id = %request_id,
                    route_id = %route.id,
                    template = %route.template,
                    panic_message = %panic_message,
                    "Handler panicked"
                );
                HandlerResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}
