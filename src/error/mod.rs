//! # Error Module
//!
//! Two kinds of failure flow through trellis:
//!
//! - **Configuration errors** ([`FrameworkError`]) are raised eagerly, at route
//!   registration or service lookup time: a malformed pattern, an unknown handler
//!   name, a status code outside the known table, a header name that is not a
//!   valid token. They are never swallowed.
//! - **Runtime errors** are plain [`anyhow::Error`] values returned by handlers,
//!   middleware and hooks. Inside a route attempt they only disqualify that route;
//!   anywhere else in the request lifecycle they reach the [`ErrorHandler`], which
//!   logs them and (in display mode) renders a diagnostic page.
//!
//! `FrameworkError` converts into `anyhow::Error` through `?`, so handler code can
//! mix both freely.

mod handler;

pub use handler::{panic_message, ErrorHandler, ErrorReport, PanicHookGuard};

use std::fmt;

/// Configuration and lookup errors raised by the framework itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameworkError {
    /// A route pattern could not be compiled
    InvalidPattern {
        /// The raw pattern as registered
        pattern: String,
        /// What was wrong with it
        reason: String,
    },
    /// A named route parameter was requested but never captured
    MissingParam {
        /// The parameter name
        name: String,
    },
    /// A status code outside the known status table
    InvalidStatus {
        /// The rejected code
        code: u16,
    },
    /// A header name or value that cannot be sent
    InvalidHeader {
        /// The rejected header name
        name: String,
    },
    /// A handler key with no entry in the handler registry
    UnknownHandler {
        /// The unresolved key
        name: String,
    },
    /// A container key that was never registered
    MissingService {
        /// The container key
        key: String,
    },
    /// A container entry holding a different type than the one requested
    ServiceType {
        /// The container key
        key: String,
        /// The requested type
        expected: &'static str,
    },
    /// A factory that (transitively) reads its own key
    CircularDependency {
        /// The key being resolved when the cycle was found
        key: String,
    },
    /// A log level name or code outside the eight supported levels
    InvalidLogLevel {
        /// The rejected level
        level: String,
    },
    /// A template that does not exist under the templates directory
    TemplateNotFound {
        /// The template name as requested
        name: String,
    },
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern '{pattern}': {reason}")
            }
            FrameworkError::MissingParam { name } => {
                write!(f, "route parameter '{name}' was not captured")
            }
            FrameworkError::InvalidStatus { code } => write!(f, "invalid status code {code}"),
            FrameworkError::InvalidHeader { name } => write!(f, "invalid header '{name}'"),
            FrameworkError::UnknownHandler { name } => {
                write!(f, "no handler registered under '{name}'")
            }
            FrameworkError::MissingService { key } => {
                write!(f, "no service registered under '{key}'")
            }
            FrameworkError::ServiceType { key, expected } => {
                write!(f, "service '{key}' is not of type {expected}")
            }
            FrameworkError::CircularDependency { key } => {
                write!(f, "circular dependency while resolving service '{key}'")
            }
            FrameworkError::InvalidLogLevel { level } => {
                write!(f, "invalid log level '{level}'")
            }
            FrameworkError::TemplateNotFound { name } => {
                write!(f, "template '{name}' not found")
            }
        }
    }
}

impl std::error::Error for FrameworkError {}
