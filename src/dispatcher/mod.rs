//! # Dispatcher Module
//!
//! The route loop at the heart of a request.
//!
//! ## Request Flow
//!
//! 1. `before` hook fires; an error here aborts the request
//! 2. the router returns every route matching method and path info
//! 3. each match is attempted in registration order:
//!    `before.dispatch` hook, route middleware, handler, `after.dispatch` hook
//! 4. the first attempt whose handler reports [`Outcome::Handled`] ends the loop
//! 5. with no handler, `Page Not Found` is written and the status set to 404
//! 6. buffered output is appended to the response body
//!
//! ## Error Handling
//!
//! - An attempt that returns an error or panics is logged through both
//!   `tracing` and the application [`Logger`], then skipped
//! - Output written by a failed or passing attempt is discarded
//! - Response changes made by a failed attempt are kept
//!
//! [`Outcome::Handled`]: crate::handlers::Outcome::Handled
//! [`Logger`]: crate::logging::Logger

mod core;

pub use core::{DispatchReport, Dispatcher, Phase, RouteFailure, NOT_FOUND_BODY};
