//! # openapi-runtime
//!
//! Runtime dispatch core for services whose operations are declared as
//! OpenAPI path templates and bound to handlers while the process runs.
//!
//! ## Overview
//!
//! Operations can be added and removed at any time. Requests are matched
//! against whatever set of routes is current, with deterministic precedence
//! between overlapping templates and placeholder values returned in
//! declaration order. A request that arrives before its route has been
//! registered may optionally be held for a bounded delay and is served as
//! soon as the route appears.
//!
//! ## Architecture
//!
//! - **[`router`]** - Path templates, segment-tree matching and the
//!   copy-on-write [`RouteTable`]
//! - **[`waiter`]** - Version counter and condition variable used to wake
//!   requests parked on a missing route
//! - **[`dispatcher`]** - Admission control, operation bases and handler
//!   invocation
//! - **[`runtime_config`]** - `registerOnStart` / `delayOnNotFoundInSecs`
//!   admission settings from env or YAML
//! - **[`otel`]** - Structured logging setup
//! - **[`ids`]** - Per-request correlation ids
//! - **[`error`]** - Error types
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use http::{Method, StatusCode};
//! use openapi_runtime::dispatcher::{handler, HandlerResponse};
//! use openapi_runtime::{AdmissionConfig, Dispatcher};
//!
//! let dispatcher = Dispatcher::default();
//! dispatcher
//!     .activate(AdmissionConfig::new(["/api/v1"], 0))
//!     .unwrap();
//!
//! dispatcher
//!     .table()
//!     .register(
//!         Method::GET,
//!         "/api/v1/a/{a}",
//!         handler(|req| Ok(HandlerResponse::text(StatusCode::OK, req.param(0).unwrap_or_default()))),
//!     )
//!     .unwrap();
//!
//! let resp = dispatcher.handle(Method::GET, "/api/v1/a/1", Bytes::new());
//! assert_eq!(resp.status, StatusCode::OK);
//! ```
//!
//! ## Configuration
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `OAR_REGISTER_ON_START` | Comma-separated path prefixes eligible for waiting |
//! | `OAR_DELAY_ON_NOT_FOUND_SECS` | Maximum wait for a missing route, in seconds |
//! | `OAR_LOG_LEVEL` | trace/debug/info/warn/error |
//! | `OAR_LOG_FORMAT` | json/pretty |
//! | `OAR_LOG_ASYNC` | Non-blocking log writer |
//! | `OAR_LOG_TARGET_FILTER` | Extra filter directives |
//! | `OAR_LOG_INCLUDE_LOCATION` | Include file:line |

pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod otel;
pub mod router;
pub mod runtime_config;
pub mod waiter;

pub use dispatcher::{
    Dispatcher, HandlerError, HandlerRequest, HandlerResponse, Operation, OperationBase,
};
pub use error::{ConfigError, RouteError, TemplateError};
pub use ids::RequestId;
pub use router::{PathTemplate, RouteId, RouteMatch, RouteTable};
pub use runtime_config::AdmissionConfig;
pub use waiter::{RegistrationWaiter, WaitOutcome};
