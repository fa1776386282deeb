//! # Application Module
//!
//! [`App`] is the front controller. It owns a service [`Container`] with the
//! default services registered as lazy singletons, a set of named hook slots,
//! and the request lifecycle:
//!
//! 1. `before` hook
//! 2. every route matching method and path, in registration order, until one
//!    handles the request; each attempt runs `before.dispatch`, the route's
//!    middleware, its handler and `after.dispatch`
//! 3. `Page Not Found` with status 404 when nothing handled it
//! 4. buffered output appended to the response body
//! 5. `after` hook
//!
//! A failing or panicking route attempt only disqualifies that route. Failures
//! anywhere else reach the error handler.
//!
//! ## Example
//!
//! ```rust
//! use trellis::http::Request;
//! use trellis::App;
//!
//! let app = App::new();
//! app.get("/blog/@id:[0-9]+", |params, ctx| {
//!     let id = params.require("id")?;
//!     ctx.echo(&format!("post {id}"));
//!     Ok::<_, anyhow::Error>(())
//! })
//! .unwrap();
//!
//! let response = app
//!     .handle(Request::builder().method("GET").uri("/blog/42").build())
//!     .unwrap();
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body(), "post 42");
//! ```
//!
//! [`Container`]: crate::container::Container

mod context;
mod core;
pub mod hooks;

pub use context::{Context, RequestId};
pub use core::{App, RouteRef, DEFAULT_APP, VERSION};

/// Container keys of the services every [`App`] registers.
pub mod services {
    /// `RwLock<Settings>`
    pub const SETTINGS: &str = "settings";
    /// `Request`, replaced at the start of every [`App::handle`](super::App::handle)
    pub const REQUEST: &str = "request";
    /// `RwLock<Response>`, replaced at the start of every request
    pub const RESPONSE: &str = "response";
    /// `RwLock<Router>`
    pub const ROUTER: &str = "router";
    /// `Logger`
    pub const LOGGER: &str = "logger";
    /// `ErrorHandler`
    pub const ERROR: &str = "error";
    /// `View`
    pub const VIEW: &str = "view";
    /// `RwLock<HandlerRegistry>`
    pub const HANDLERS: &str = "handlers";
}
