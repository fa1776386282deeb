//! # Trellis
//!
//! **Trellis** is a small front-controller web framework for single-request,
//! CGI-style processes: declare routes with inline parameter patterns, attach
//! per-route middleware, and let the dispatch loop fall through matching routes
//! until one of them handles the request.
//!
//! ## Overview
//!
//! An [`App`] owns a service [`Container`](container::Container) holding the
//! default services (settings, request, response, router, logger, error
//! handler, view, handler registry) as lazy singletons. Application code
//! registers routes through the app; [`App::handle`] then runs one request
//! through the lifecycle and returns the finished [`Response`].
//!
//! ## Architecture
//!
//! - **[`container`]** - Insertion-ordered service registry with lazy singletons
//! - **[`router`]** - Pattern compiler, [`Route`], [`Params`] and the ordered [`Router`]
//! - **[`handlers`]** - The [`Handler`](handlers::Handler) trait, [`Outcome`] and a named handler registry
//! - **[`middleware`]** - Per-route [`Middleware`](middleware::Middleware)
//! - **[`dispatcher`]** - The fall-through route loop
//! - **[`app`]** - The front controller, hooks and the per-request [`Context`]
//! - **[`http`]** - [`Request`] from CGI variables, [`Response`] with cookies and caching
//! - **[`error`]** - [`FrameworkError`] and the fatal [`ErrorHandler`](error::ErrorHandler)
//! - **[`logging`]** - The leveled application logger and `tracing` setup
//! - **[`view`]** - Template rendering with `minijinja`
//! - **[`settings`]** - Layered settings (defaults, file, environment)
//!
//! ### Request Lifecycle
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant App
//!     participant Dispatcher
//!     participant Router
//!     participant Route as Route<br/>(middleware + handler)
//!     participant Error as ErrorHandler
//!
//!     Caller->>App: handle(request)
//!     App->>App: install fresh request/response services
//!     App->>Dispatcher: dispatch(ctx)
//!     Dispatcher->>Dispatcher: "before" hook
//!     Dispatcher->>Router: matched_routes(method, path_info)
//!     Router-->>Dispatcher: Vec<RouteMatch> (registration order)
//!
//!     loop each match until handled
//!         Dispatcher->>Dispatcher: "before.dispatch" hook
//!         Dispatcher->>Route: middleware, then handler
//!         alt error or panic
//!             Route-->>Dispatcher: logged, output discarded, next match
//!         else pass
//!             Route-->>Dispatcher: Outcome::Pass, next match
//!         else handled
//!             Route-->>Dispatcher: Outcome::Handled
//!         end
//!         Dispatcher->>Dispatcher: "after.dispatch" hook
//!     end
//!
//!     alt nothing handled
//!         Dispatcher->>Dispatcher: "Page Not Found", 404
//!     end
//!     Dispatcher-->>App: output appended to body
//!
//!     alt before hook failed or panicked
//!         App->>Error: handle(report, response)
//!         Error-->>App: 500 (diagnostic page in debug mode)
//!     end
//!     App->>App: "after" hook
//!     App-->>Caller: Response
//! ```
//!
//! ## Example
//!
//! ```rust
//! use trellis::{App, Outcome, Request};
//!
//! let app = App::new();
//!
//! // A specific route that passes on drafts...
//! app.get("/blog/@slug", |params, ctx| {
//!     if params.get("slug") == Some("draft") {
//!         return Outcome::Pass;
//!     }
//!     ctx.echo("post");
//!     Outcome::Handled
//! })
//! .unwrap();
//!
//! // ...leaving them to a more generic one registered later.
//! app.any("/blog(/@rest)", |_, ctx| ctx.echo("blog index")).unwrap();
//!
//! let response = app
//!     .handle(Request::builder().method("GET").uri("/blog/draft").build())
//!     .unwrap();
//! assert_eq!(response.body(), "blog index");
//! ```

pub mod app;
pub mod cli;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod settings;
pub mod view;

pub use app::{App, Context, RouteRef, VERSION};
pub use error::FrameworkError;
pub use handlers::{handler_fn, Outcome};
pub use http::{Request, Response};
pub use router::{Params, Route, RouteMatch, Router};
pub use settings::Settings;
