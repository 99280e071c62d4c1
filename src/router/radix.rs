//! Segment tree for route matching
//!
//! Each node stands for one path segment. Literal children are keyed by their
//! text; a node has at most one placeholder child, shared by every template
//! that has a placeholder at that depth regardless of the placeholder's name.
//! Routes live on terminal nodes keyed by HTTP method.
//!
//! ## Precedence
//!
//! Search walks the path left to right and tries the literal child before the
//! placeholder child, backtracking when a branch has no route for the method.
//! The first route found is therefore the one whose template has a literal at
//! the leftmost position where competing templates differ.
//!
//! Because placeholder children are shared, two templates with the same
//! literal/placeholder shape end on the same terminal node; a second insert
//! for the same method is reported as a conflict.

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use super::core::{ParamVec, RegisteredRoute, MAX_INLINE_PARAMS};
use super::template::{split_path, Segment};

#[derive(Clone, Default)]
struct RadixNode {
    /// Routes terminating at this node, per HTTP method
    routes: HashMap<Method, Arc<RegisteredRoute>>,
    /// Literal children keyed by exact segment text
    children: HashMap<Arc<str>, RadixNode>,
    /// Placeholder child matching any non-empty segment
    param_child: Option<Box<RadixNode>>,
}

impl RadixNode {
    fn insert(
        &mut self,
        segments: &[Segment],
        route: Arc<RegisteredRoute>,
    ) -> Result<(), Arc<RegisteredRoute>> {
        let Some((first, remaining)) = segments.split_first() else {
            if let Some(existing) = self.routes.get(&route.method) {
                return Err(Arc::clone(existing));
            }
            self.routes.insert(route.method.clone(), route);
            return Ok(());
        };

        match first {
            Segment::Literal(text) => self
                .children
                .entry(Arc::clone(text))
                .or_default()
                .insert(remaining, route),
            Segment::Param(_) => self
                .param_child
                .get_or_insert_with(Box::default)
                .insert(remaining, route),
        }
    }

    fn search<'p>(
        &self,
        segments: &[&'p str],
        method: &Method,
        captured: &mut SmallVec<[&'p str; MAX_INLINE_PARAMS]>,
    ) -> Option<&Arc<RegisteredRoute>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.routes.get(method);
        };

        if let Some(child) = self.children.get(segment) {
            if let Some(route) = child.search(remaining, method, captured) {
                return Some(route);
            }
        }

        if segment.is_empty() {
            return None;
        }

        if let Some(param_child) = &self.param_child {
            captured.push(segment);
            if let Some(route) = param_child.search(remaining, method, captured) {
                return Some(route);
            }
            // Backtrack: this branch did not lead to a route for the method
            captured.pop();
        }

        None
    }
}

/// Immutable-by-convention segment tree over a set of registered routes
///
/// The route table clones and extends it on registration and rebuilds it on
/// removal, then publishes the result as a new snapshot.
#[derive(Clone, Default)]
pub(crate) struct RadixRouter {
    root: RadixNode,
}

impl RadixRouter {
    /// Build a tree from routes already known not to conflict
    pub(crate) fn from_routes<'a>(routes: impl IntoIterator<Item = &'a Arc<RegisteredRoute>>) -> Self {
        let mut router = Self::default();
        for route in routes {
            // Routes come from a previous conflict-free snapshot
            if let Err(existing) = router.insert(Arc::clone(route)) {
                debug_assert!(false, "conflict while rebuilding: {} vs {}", route.id, existing.id);
                error!(
                    route_id = %route.id,
                    existing_id = %existing.id,
                    template = %route.template,
                    "Route conflict while rebuilding tree - route dropped"
                );
            }
        }
        router
    }

    /// Insert a route, returning the already-registered route on a shape conflict
    pub(crate) fn insert(&mut self, route: Arc<RegisteredRoute>) -> Result<(), Arc<RegisteredRoute>> {
        let shape = Arc::clone(&route);
        self.root.insert(shape.template.segments(), route)
    }

    /// Find the highest-precedence route for `method` and `path`
    ///
    /// Captured values are paired with the winning template's placeholder names
    /// in declaration order.
    pub(crate) fn route(&self, method: &Method, path: &str) -> Option<(Arc<RegisteredRoute>, ParamVec)> {
        let segments = split_path(path)?;
        let mut captured: SmallVec<[&str; MAX_INLINE_PARAMS]> = SmallVec::new();
        let route = self.root.search(&segments, method, &mut captured)?;

        let params: ParamVec = route
            .template
            .param_names()
            .zip(captured)
            .map(|(name, value)| (Arc::clone(name), value.to_string()))
            .collect();
        Some((Arc::clone(route), params))
    }
}
