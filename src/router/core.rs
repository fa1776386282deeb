use std::sync::Arc;

use http::Method;
use tracing::{debug, info};

use super::route::{Route, RouteMatch};
use crate::error::FrameworkError;
use crate::handlers::Handler;

/// HTTP methods a router accepts by default.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// Ordered collection of routes.
///
/// Matching walks every route in registration order and returns all of them
/// that accept the request; the dispatch loop decides which one ends up
/// handling it. Nothing about a match is stored on the router.
#[derive(Clone, Debug)]
pub struct Router {
    routes: Vec<Arc<Route>>,
    supported: Vec<Method>,
    case_sensitive: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// A router accepting [`SUPPORTED_METHODS`], matching case-insensitively.
    #[must_use]
    pub fn new() -> Self {
        Self::with_methods(SUPPORTED_METHODS)
    }

    /// A router accepting only `methods`.
    #[must_use]
    pub fn with_methods(methods: impl IntoIterator<Item = Method>) -> Self {
        let mut supported: Vec<Method> = Vec::new();
        for method in methods {
            if !supported.contains(&method) {
                supported.push(method);
            }
        }
        Self {
            routes: Vec::new(),
            supported,
            case_sensitive: false,
        }
    }

    /// Case sensitivity given to routes mapped from now on.
    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    #[must_use]
    pub fn supported_methods(&self) -> &[Method] {
        &self.supported
    }

    /// Uppercase `methods` and keep the ones this router supports.
    ///
    /// Unknown or unsupported tokens are dropped, so the result may be empty.
    #[must_use]
    pub fn normalize_methods<I, S>(&self, methods: I) -> Vec<Method>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<Method> = Vec::new();
        for token in methods {
            let upper = token.as_ref().trim().to_ascii_uppercase();
            let Ok(method) = Method::from_bytes(upper.as_bytes()) else {
                continue;
            };
            if self.supported.contains(&method) && !normalized.contains(&method) {
                normalized.push(method);
            }
        }
        normalized
    }

    /// Compile and append a route, returning it for further configuration.
    ///
    /// # Errors
    ///
    /// [`FrameworkError::InvalidPattern`] when `pattern` does not compile.
    pub fn map<I, S>(
        &mut self,
        methods: I,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Route, FrameworkError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods = self.normalize_methods(methods);
        let route = Route::new(methods, pattern, handler, self.case_sensitive)?;

        info!(
            pattern = %pattern,
            methods = ?route.methods(),
            params = ?route.param_names(),
            index = self.routes.len(),
            "Route registered"
        );

        self.routes.push(Arc::new(route));
        let index = self.routes.len() - 1;
        self.route_mut(index).ok_or_else(|| FrameworkError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "route vanished after registration".to_string(),
        })
    }

    /// Every route accepting `method` whose pattern matches `path`, in
    /// registration order, each with its own parameters.
    #[must_use]
    pub fn matched_routes(&self, method: &Method, path: &str) -> Vec<RouteMatch> {
        let matched: Vec<RouteMatch> = self
            .routes
            .iter()
            .filter(|route| route.accepts(method))
            .filter_map(|route| {
                route
                    .match_url(path)
                    .map(|params| RouteMatch::new(Arc::clone(route), params))
            })
            .collect();

        debug!(
            method = %method,
            path = %path,
            candidates = self.routes.len(),
            matched = matched.len(),
            "Route matching complete"
        );
        matched
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn route(&self, index: usize) -> Option<&Arc<Route>> {
        self.routes.get(index)
    }

    /// Mutable access for configuration; clones the route if a match still
    /// holds it.
    pub fn route_mut(&mut self, index: usize) -> Option<&mut Route> {
        self.routes.get_mut(index).map(Arc::make_mut)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
