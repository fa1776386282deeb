use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::core::{Handler, IntoOutcome};
use crate::app::Context;
use crate::error::FrameworkError;
use crate::router::Params;

/// Handlers addressable by a string key such as `"blog.show"`.
///
/// Keys are resolved when a route is registered, so a typo fails at startup
/// rather than on the first request.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler stored under `name`.
    pub fn register<F, R>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.register_handler(name, Arc::new(handler));
    }

    pub fn register_handler(&mut self, name: &str, handler: Arc<dyn Handler>) {
        debug!(handler_name = %name, "Handler registered");
        self.handlers.insert(name.to_string(), handler);
    }

    /// Look up `name`.
    ///
    /// # Errors
    ///
    /// [`FrameworkError::UnknownHandler`] when nothing is registered under it.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Handler>, FrameworkError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| FrameworkError::UnknownHandler {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
