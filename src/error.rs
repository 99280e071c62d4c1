//! Error types for route registration and runtime configuration.
//!
//! Routing misses are not errors: [`crate::router::RouteTable::lookup`] returns
//! `None` and the dispatcher turns that into a 404. The types here cover the
//! failures that are surfaced to whoever registers routes or supplies config.

use http::Method;
use std::fmt;

use crate::router::RouteId;

/// A path template that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Template does not start with `/`
    NotAbsolute {
        /// The offending template
        template: String,
    },
    /// Template contains an empty segment (`//` or a trailing `/`)
    EmptySegment {
        /// The offending template
        template: String,
        /// Zero-based segment index
        position: usize,
    },
    /// A segment has unbalanced or misplaced braces, or an empty `{}` placeholder
    MalformedSegment {
        /// The offending template
        template: String,
        /// The segment text as written
        segment: String,
    },
    /// The same placeholder name occurs twice
    DuplicateParameter {
        /// The offending template
        template: String,
        /// The repeated placeholder name
        name: String,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::NotAbsolute { template } => {
                write!(f, "path template '{template}' must start with '/'")
            }
            TemplateError::EmptySegment { template, position } => {
                write!(
                    f,
                    "path template '{template}' has an empty segment at position {position}"
                )
            }
            TemplateError::MalformedSegment { template, segment } => {
                write!(
                    f,
                    "path template '{template}' has a malformed segment '{segment}'; \
                    placeholders must be written as '{{name}}'"
                )
            }
            TemplateError::DuplicateParameter { template, name } => {
                write!(
                    f,
                    "path template '{template}' declares parameter '{name}' more than once"
                )
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Failure to register or unregister a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// A route with the same method and template shape is already registered
    Conflict {
        /// HTTP method of the rejected route
        method: Method,
        /// Template of the rejected route
        template: String,
        /// Template of the route already holding that shape
        existing: String,
    },
    /// The route id is not (or no longer) registered
    NotFound(RouteId),
    /// The template could not be parsed
    Template(TemplateError),
    /// The operation base is already mounted on this dispatcher
    AlreadyMounted {
        /// Prefix the base mounts under
        prefix: String,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Conflict {
                method,
                template,
                existing,
            } => write!(
                f,
                "route {method} {template} conflicts with registered route {method} {existing}"
            ),
            RouteError::NotFound(id) => write!(f, "route {id} is not registered"),
            RouteError::Template(e) => write!(f, "{e}"),
            RouteError::AlreadyMounted { prefix } => {
                write!(f, "operation base mounted at '{prefix}' is already added")
            }
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouteError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TemplateError> for RouteError {
    fn from(e: TemplateError) -> Self {
        RouteError::Template(e)
    }
}

/// Invalid admission configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A `registerOnStart` entry is not an absolute path prefix
    RelativePrefix {
        /// The offending prefix
        prefix: String,
    },
    /// An environment variable holds an unparsable value
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::RelativePrefix { prefix } => {
                write!(
                    f,
                    "registerOnStart prefix '{prefix}' must be an absolute path starting with '/'"
                )
            }
            ConfigError::InvalidEnv { name, value } => {
                write!(f, "environment variable {name} has invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
