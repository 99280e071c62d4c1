//! Route table core - concurrent registration and lookup.
//!
//! Lookups read an immutable snapshot through [`ArcSwap`] and never take a
//! lock, so concurrent requests do not block each other. Registrations
//! serialize on a writer mutex, build the next snapshot off to the side and
//! publish it with a single pointer swap; a lookup sees either the old route
//! set or the new one, never a half-inserted route.
//!
//! Every published change bumps the [`RegistrationWaiter`] version *after*
//! the swap, so a request that observed version `v` and then missed a route
//! is guaranteed to see a version greater than `v` once that route is
//! visible.

use arc_swap::ArcSwap;
use http::Method;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::radix::RadixRouter;
use super::template::PathTemplate;
use crate::dispatcher::RouteHandler;
use crate::error::RouteError;
use crate::waiter::RegistrationWaiter;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Extracted path parameters as `(name, value)` pairs in template order
///
/// Names are shared with the template (`Arc<str>`), values are per request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Identifier handed out by [`RouteTable::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub u64);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

/// A route owned by the table: method, template and the bound handler
pub struct RegisteredRoute {
    /// Table-assigned identifier
    pub id: RouteId,
    /// HTTP method this route answers
    pub method: Method,
    /// Parsed template including any mount prefix
    pub template: PathTemplate,
    /// Operation callback
    pub handler: RouteHandler,
}

impl fmt::Debug for RegisteredRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredRoute")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .finish_non_exhaustive()
    }
}

/// A route waiting to be registered
pub struct RouteDefinition {
    /// HTTP method
    pub method: Method,
    /// Parsed template
    pub template: PathTemplate,
    /// Operation callback
    pub handler: RouteHandler,
}

impl RouteDefinition {
    /// Parse `template` and bundle it with a method and handler
    pub fn new(method: Method, template: &str, handler: RouteHandler) -> Result<Self, RouteError> {
        Ok(Self {
            method,
            template: PathTemplate::parse(template)?,
            handler,
        })
    }
}

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The selected route
    pub route: Arc<RegisteredRoute>,
    /// Captured placeholder values, in template declaration order
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Captured values in template declaration order
    #[must_use]
    pub fn param_values(&self) -> SmallVec<[&str; MAX_INLINE_PARAMS]> {
        self.path_params.iter().map(|(_, v)| v.as_str()).collect()
    }

    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Diagnostic view of one registered route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Table-assigned identifier
    pub id: RouteId,
    /// HTTP method
    pub method: Method,
    /// Template as written
    pub template: String,
}

#[derive(Default)]
struct RouteSnapshot {
    tree: RadixRouter,
    routes: BTreeMap<RouteId, Arc<RegisteredRoute>>,
}

/// Concurrent table of registered routes
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    waiter: Arc<RegistrationWaiter>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.len())
            .field("version", &self.current_version())
            .finish()
    }
}

impl RouteTable {
    /// Create an empty table with its own change signal
    #[must_use]
    pub fn new() -> Self {
        Self::with_waiter(Arc::new(RegistrationWaiter::new()))
    }

    /// Create an empty table that signals changes on `waiter`
    #[must_use]
    pub fn with_waiter(waiter: Arc<RegistrationWaiter>) -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            waiter,
        }
    }

    /// The change signal bumped on every mutation
    #[must_use]
    pub fn waiter(&self) -> &Arc<RegistrationWaiter> {
        &self.waiter
    }

    /// Current value of the registration change signal
    #[must_use]
    pub fn current_version(&self) -> u64 {
        self.waiter.version()
    }

    /// Register a single route
    ///
    /// Fails with [`RouteError::Conflict`] if a route with the same method and
    /// template shape is already registered. Conflicting registrations are
    /// rejected, never replaced.
    pub fn register(
        &self,
        method: Method,
        template: &str,
        handler: RouteHandler,
    ) -> Result<RouteId, RouteError> {
        let def = RouteDefinition::new(method, template, handler)?;
        // One id per definition on success
        let ids = self.register_all(vec![def])?;
        Ok(ids[0])
    }

    /// Register a batch of routes atomically
    ///
    /// Either every route becomes visible in one step (one version bump) or,
    /// on the first conflict, none does.
    pub fn register_all(&self, defs: Vec<RouteDefinition>) -> Result<Vec<RouteId>, RouteError> {
        if defs.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock();
        let snapshot = self.current.load_full();
        let mut tree = snapshot.tree.clone();
        let mut routes = snapshot.routes.clone();
        let mut ids = Vec::with_capacity(defs.len());

        for def in defs {
            let id = RouteId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let route = Arc::new(RegisteredRoute {
                id,
                method: def.method,
                template: def.template,
                handler: def.handler,
            });

            if let Err(existing) = tree.insert(Arc::clone(&route)) {
                // R2: Conflicting registration rejected
                warn!(
                    method = %route.method,
                    template = %route.template,
                    existing_id = %existing.id,
                    existing_template = %existing.template,
                    "Route registration rejected - shape already registered"
                );
                return Err(RouteError::Conflict {
                    method: route.method.clone(),
                    template: route.template.to_string(),
                    existing: existing.template.to_string(),
                });
            }
            routes.insert(id, route);
            ids.push(id);
        }

        self.current.store(Arc::new(RouteSnapshot { tree, routes }));
        let version = self.waiter.signal();

        // R1: Routes registered
        info!(
            route_ids = ?ids,
            total_routes = self.current.load().routes.len(),
            version = version,
            "Routes registered"
        );
        Ok(ids)
    }

    /// Remove a route
    ///
    /// Removing an id that is not registered returns [`RouteError::NotFound`]
    /// and leaves the table untouched.
    pub fn unregister(&self, id: RouteId) -> Result<(), RouteError> {
        match self.unregister_all(&[id]) {
            0 => Err(RouteError::NotFound(id)),
            _ => Ok(()),
        }
    }

    /// Remove a batch of routes in one step, returning how many were removed
    ///
    /// Unknown ids are skipped. Nothing is published when no id matched.
    pub fn unregister_all(&self, ids: &[RouteId]) -> usize {
        let _guard = self.write_lock.lock();
        let snapshot = self.current.load_full();
        let mut routes = snapshot.routes.clone();
        let removed = ids.iter().filter(|id| routes.remove(id).is_some()).count();

        if removed == 0 {
            debug!(route_ids = ?ids, "Unregister ignored - routes not registered");
            return 0;
        }

        let tree = RadixRouter::from_routes(routes.values());
        let total_routes = routes.len();
        self.current.store(Arc::new(RouteSnapshot { tree, routes }));
        let version = self.waiter.signal();

        // R3: Routes unregistered
        info!(
            route_ids = ?ids,
            removed = removed,
            total_routes = total_routes,
            version = version,
            "Routes unregistered"
        );
        removed
    }

    /// Match `method` and `path` against the current snapshot
    ///
    /// `None` is the normal "no route" outcome, not an error.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let match_start = Instant::now();
        let snapshot = self.current.load();
        let result = snapshot.tree.route(method, path);
        let match_duration = match_start.elapsed();

        match result {
            Some((route, path_params)) => {
                if match_duration > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        route_id = %route.id,
                        template = %route.template,
                        duration_us = match_duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        route_id = %route.id,
                        template = %route.template,
                        path_params = ?path_params,
                        duration_us = match_duration.as_micros(),
                        "Route matched"
                    );
                }
                Some(RouteMatch { route, path_params })
            }
            None => {
                debug!(
                    method = %method,
                    path = %path,
                    routes = snapshot.routes.len(),
                    "No route matched"
                );
                None
            }
        }
    }

    /// Registered routes in match-precedence order
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        let snapshot = self.current.load();
        let mut routes: Vec<&Arc<RegisteredRoute>> = snapshot.routes.values().collect();
        routes.sort_by(|a, b| {
            a.template
                .precedence_cmp(&b.template)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        routes
            .into_iter()
            .map(|r| RouteInfo {
                id: r.id,
                method: r.method.clone(),
                template: r.template.to_string(),
            })
            .collect()
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().routes.len()
    }

    /// True when no route is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
