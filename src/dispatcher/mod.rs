//! # Dispatcher Module
//!
//! Maps requests to registered operations and applies admission control to
//! requests that arrive before their route exists.
//!
//! ## Request Flow
//!
//! 1. Capture the route table version, then look the request up
//! 2. On a match, run the operation on the calling thread
//! 3. On a miss outside every `registerOnStart` prefix, or with a zero
//!    delay, answer 404 at once
//! 4. Otherwise sleep on the registration waiter until the route set changes
//!    or the delay runs out, re-checking after each change
//!
//! ## Registration
//!
//! Operations are supplied in groups through [`OperationBase`]:
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http::{Method, StatusCode};
//! use openapi_runtime::dispatcher::{Dispatcher, HandlerResponse, Operation, OperationBase};
//! use openapi_runtime::runtime_config::AdmissionConfig;
//!
//! struct Pets;
//!
//! impl OperationBase for Pets {
//!     fn prefix(&self) -> &str {
//!         "/api/v1"
//!     }
//!
//!     fn operations(&self) -> Vec<Operation> {
//!         vec![Operation::new(Method::GET, "/pets/{id}", |req| {
//!             Ok(HandlerResponse::text(StatusCode::OK, req.param(0).unwrap_or_default()))
//!         })]
//!     }
//! }
//!
//! let dispatcher = Dispatcher::default();
//! dispatcher.activate(AdmissionConfig::default()).unwrap();
//! let pets = Arc::new(Pets);
//! dispatcher.add(&pets).unwrap();
//!
//! let resp = dispatcher.handle(Method::GET, "/api/v1/pets/7", Bytes::new());
//! assert_eq!(resp.status, StatusCode::OK);
//! assert_eq!(resp.body, Bytes::from_static(b"7"));
//! ```
//!
//! ## Error Handling
//!
//! - Routing misses and expired waits return 404
//! - Handler errors return their declared 5xx status, or 500
//! - Handler panics are caught and return 500
//! - A dispatcher that is not active returns 503

mod core;
mod metrics;
mod operation;

pub use core::Dispatcher;
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
pub use operation::{
    handler, HandlerError, HandlerRequest, HandlerResponse, HeaderVec, Operation, OperationBase,
    RouteHandler, MAX_INLINE_HEADERS,
};
