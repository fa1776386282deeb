//! # Container Module
//!
//! A small service container: an insertion-ordered registry from string keys to
//! shared values, invokable factories, or lazily-initialized singletons.
//!
//! ## Entry kinds
//!
//! | Registered with | On every read |
//! |-----------------|---------------|
//! | [`Container::set`] | returns the stored value, nothing is invoked |
//! | [`Container::factory`] | invokes the factory with the container |
//! | [`Container::singleton`] | invokes the factory once, then returns the memoized `Arc` |
//!
//! Values come back as `Arc<T>`; asking for the wrong `T` is an error rather than
//! a panic. Factories receive the container itself so they can pull in their own
//! dependencies, and a factory that ends up reading its own key is reported as a
//! circular dependency instead of deadlocking.
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::container::Container;
//!
//! # fn main() -> anyhow::Result<()> {
//! let container = Container::new();
//! container.set("greeting", String::from("hello"));
//! container.singleton("shout", |c| {
//!     let greeting = c.get::<String>("greeting")?;
//!     Ok(greeting.to_uppercase())
//! });
//!
//! let first = container.get::<String>("shout")?;
//! let second = container.get::<String>("shout")?;
//! assert_eq!(first.as_str(), "HELLO");
//! assert!(Arc::ptr_eq(&first, &second));
//! # Ok(())
//! # }
//! ```

mod core;

pub use core::{Container, Service};
