//! Operation capability: what external code hands the dispatcher.
//!
//! An operation is a method, a path template and a callback. Operations are
//! grouped into an [`OperationBase`] that mounts them under a common prefix,
//! the way a generated API module mounts every path of one OpenAPI document
//! under its base path.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use crate::ids::RequestId;
use crate::router::{ParamVec, MAX_INLINE_PARAMS};

/// Maximum inline response headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Callback bound to a route
pub type RouteHandler =
    Arc<dyn Fn(HandlerRequest) -> Result<HandlerResponse, HandlerError> + Send + Sync>;

/// Wrap a closure as a [`RouteHandler`]
pub fn handler<F>(f: F) -> RouteHandler
where
    F: Fn(HandlerRequest) -> Result<HandlerResponse, HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Request data passed to an operation callback
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Correlation id, also present in every log line for this request
    pub request_id: RequestId,
    /// HTTP method
    pub method: Method,
    /// Concrete request path
    pub path: String,
    /// Captured placeholders in template declaration order
    pub path_params: ParamVec,
    /// Raw request body
    pub body: Bytes,
}

impl HandlerRequest {
    /// Captured values in template declaration order
    #[must_use]
    pub fn param_values(&self) -> SmallVec<[&str; MAX_INLINE_PARAMS]> {
        self.path_params.iter().map(|(_, v)| v.as_str()).collect()
    }

    /// The `index`-th captured value
    #[inline]
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).map(|(_, v)| v.as_str())
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

/// Response produced by an operation or by the dispatcher itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderVec,
    /// Response body
    pub body: Bytes,
}

impl HandlerResponse {
    /// Create a response with the given status, headers and body
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderVec, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// 200 with an empty body
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, HeaderVec::new(), Bytes::new())
    }

    /// 204 with an empty body
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, HeaderVec::new(), Bytes::new())
    }

    /// Plain-text response
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "text/plain; charset=utf-8".to_string()));
        Self::new(status, headers, Bytes::from(body.into()))
    }

    /// JSON response
    #[must_use]
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        // Serializing a `Value` cannot fail
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        Self::new(status, headers, Bytes::from(bytes))
    }

    /// JSON error body `{ "error": message }`
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    /// 404 returned for routing misses
    #[must_use]
    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "Not Found")
    }

    /// Parse the body as JSON
    pub fn json_body(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// An operation callback failed
///
/// The declared status is used when it is a server error (5xx); anything
/// else is reported as 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    /// Failure reported as 500
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Failure with an operation-declared status
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Status the dispatcher will answer with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.status.is_server_error() {
            self.status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Failure description
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation failed ({}): {}", self.status, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<anyhow::Error> for HandlerError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(format!("{e:#}"))
    }
}

/// One operation: method, template (relative to the base prefix) and callback
#[derive(Clone)]
pub struct Operation {
    /// HTTP method
    pub method: Method,
    /// Template relative to [`OperationBase::prefix`]
    pub template: String,
    /// Callback invoked with the captured parameters
    pub handler: RouteHandler,
}

impl Operation {
    /// Bundle a method, template and closure
    pub fn new<F>(method: Method, template: impl Into<String>, f: F) -> Self
    where
        F: Fn(HandlerRequest) -> Result<HandlerResponse, HandlerError> + Send + Sync + 'static,
    {
        Self {
            method,
            template: template.into(),
            handler: handler(f),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// A group of operations mounted together
///
/// The dispatcher identifies a base by its `Arc` allocation: adding and
/// removing must use clones of the same `Arc`. A mounted base is kept alive
/// by the dispatcher until it is removed.
pub trait OperationBase: Send + Sync {
    /// Mount prefix such as `/api/v1`; empty mounts at the root
    fn prefix(&self) -> &str {
        ""
    }

    /// The operations to register
    fn operations(&self) -> Vec<Operation>;
}
