//! # Router Module
//!
//! Route templates, the segment-tree matcher and the concurrent route table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing path templates such as `/a/{a}/bar/{b}`
//! - Holding the set of registered routes, safe for concurrent
//!   registration, removal and lookup
//! - Matching a method and concrete path to the highest-precedence route
//! - Extracting placeholder values in template declaration order
//!
//! ## Precedence
//!
//! When several templates could match the same path, the one with a literal
//! segment at the leftmost position where they differ wins:
//!
//! ```text
//! PUT /a/{a}/foo/bar   beats   PUT /a/{a}/foo/{b}   beats   PUT /a/{a}/{b}/{c}
//! ```
//!
//! Two templates with the same literal/placeholder shape cannot be registered
//! for the same method; the second registration fails with
//! [`RouteError::Conflict`](crate::error::RouteError::Conflict).
//!
//! ## Example
//!
//! ```rust
//! use openapi_runtime::dispatcher::{handler, HandlerResponse};
//! use openapi_runtime::router::RouteTable;
//! use http::Method;
//!
//! let table = RouteTable::new();
//! table
//!     .register(Method::PUT, "/a/{a}/bar/{b}", handler(|_| Ok(HandlerResponse::ok())))
//!     .unwrap();
//!
//! let m = table.lookup(&Method::PUT, "/a/1/bar/2").unwrap();
//! assert_eq!(m.param_values().as_slice(), ["1", "2"]);
//! ```

mod core;
mod radix;
mod template;

pub use core::{
    ParamVec, RegisteredRoute, RouteDefinition, RouteId, RouteInfo, RouteMatch, RouteTable,
    MAX_INLINE_PARAMS,
};
pub use template::{PathTemplate, Segment};
