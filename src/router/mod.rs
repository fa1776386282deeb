//! # Router Module
//!
//! Pattern-based routing with optional segments and fall-through matching.
//!
//! ## Pattern language
//!
//! ```text
//! pattern  := segment*
//! segment  := literal | param | "(" pattern ")"
//! param    := "@" name [":" regex]
//! ```
//!
//! - `@name` captures one path segment (`[^/?]+`); `@name:regex` uses the given
//!   regex instead (it may not contain `/`, `(` or `)`).
//! - Every parenthesized group is optional. Nested groups can only match when the
//!   enclosing group matched.
//! - A trailing slash is always optional, both in the pattern and in the request.
//! - Literal characters match literally; matching is case-insensitive unless the
//!   route is marked case-sensitive.
//! - Doubled slashes in the request path are collapsed before matching.
//!
//! ## Matching
//!
//! [`Router::matched_routes`] returns *every* route that accepts the method and
//! path, in registration order, each as a [`RouteMatch`] with its own
//! [`Params`]. The dispatch loop tries them in turn until one handles the
//! request, which lets a specific route pass on a request and leave it to a more
//! generic one registered later.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use trellis::handlers::{handler_fn, Outcome};
//! use trellis::router::Router;
//!
//! let mut router = Router::new();
//! router
//!     .map(["get"], "/admin(/@module(/@controller(/@action)))(/@id)", handler_fn(|_, _| Outcome::Handled))
//!     .unwrap();
//!
//! let matched = router.matched_routes(&Method::GET, "/admin/users/list");
//! assert_eq!(matched.len(), 1);
//! assert_eq!(matched[0].param("module"), Some("users"));
//! assert_eq!(matched[0].param("controller"), Some("list"));
//! assert_eq!(matched[0].param("action"), None);
//! ```

mod core;
mod params;
pub mod pattern;
mod route;
#[cfg(test)]
mod tests;

pub use core::{Router, SUPPORTED_METHODS};
pub use params::{ParamVec, Params, MAX_INLINE_PARAMS};
pub use route::{Route, RouteMatch};
