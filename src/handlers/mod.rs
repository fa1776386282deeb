//! # Handlers Module
//!
//! Route handlers and the string-keyed handler registry.
//!
//! A handler is anything implementing [`Handler`], which every
//! `Fn(&Params, &mut Context) -> R` closure does as long as `R` implements
//! [`IntoOutcome`]. The return value decides whether the dispatch loop stops:
//!
//! | Handler returns | Outcome |
//! |-----------------|---------|
//! | `()` / `true` / `Outcome::Handled` | handled, stop |
//! | `false` / `Outcome::Pass` | pass, try the next matching route |
//! | `Err(e)` | route failed, logged, try the next matching route |
//!
//! Handlers that need to be referenced by name (from configuration, for
//! instance) are registered in a [`HandlerRegistry`] and mapped with
//! [`App::map_named`](crate::App::map_named).

mod core;
mod registry;

pub use core::{handler_fn, Handler, IntoOutcome, Outcome};
pub use registry::HandlerRegistry;
