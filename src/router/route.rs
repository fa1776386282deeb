use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use tracing::debug;

use super::params::Params;
use super::pattern::{self, collapse_slashes, CompiledPattern};
use crate::app::Context;
use crate::error::FrameworkError;
use crate::handlers::Handler;
use crate::middleware::Middleware;

/// One pattern/method-set/handler binding.
///
/// Routes are configured while the application is being set up (middleware,
/// case sensitivity, handler) and are read-only during dispatch: matching
/// returns a fresh [`RouteMatch`] instead of storing parameters on the route.
#[derive(Clone)]
pub struct Route {
    pattern: Arc<str>,
    methods: Vec<Method>,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
    case_sensitive: bool,
    compiled: CompiledPattern,
    name: Option<Arc<str>>,
}

impl Route {
    /// Compile `pattern` and bind it to `handler`.
    ///
    /// `methods` is taken as given; normalization against the supported set is
    /// the router's job.
    pub fn new(
        methods: Vec<Method>,
        pattern: &str,
        handler: Arc<dyn Handler>,
        case_sensitive: bool,
    ) -> Result<Self, FrameworkError> {
        let compiled = pattern::compile(pattern, case_sensitive)?;
        Ok(Self {
            pattern: Arc::from(pattern),
            methods,
            handler,
            middleware: Vec::new(),
            case_sensitive,
            compiled,
            name: None,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &Arc<str> {
        &self.pattern
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Recompile with a different case-sensitivity flag.
    pub fn set_case_sensitive(&mut self, case_sensitive: bool) -> Result<(), FrameworkError> {
        if self.case_sensitive != case_sensitive {
            self.compiled = pattern::compile(&self.pattern, case_sensitive)?;
            self.case_sensitive = case_sensitive;
        }
        Ok(())
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn set_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handler = handler;
    }

    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Registry key of the handler, for routes registered by name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<Arc<str>>) {
        self.name = Some(name.into());
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        self.compiled.names()
    }

    /// Match a request path, ignoring the method.
    ///
    /// Doubled slashes in `url` are collapsed first. Captured values are
    /// URL-decoded (`+` decodes to a space).
    #[must_use]
    pub fn match_url(&self, url: &str) -> Option<Params> {
        let url = collapse_slashes(url);
        let captures = self.compiled.regex().captures(&url)?;

        let mut params = Params::new();
        for (index, name) in self.compiled.names().iter().enumerate() {
            let group = format!("p{index}");
            if let Some(value) = captures.name(&group) {
                params.set(Arc::clone(name), decode_component(value.as_str()));
            }
        }
        Some(params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("case_sensitive", &self.case_sensitive)
            .field("middleware", &self.middleware.len())
            .field("name", &self.name)
            .finish()
    }
}

fn decode_component(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(plus_decoded.as_bytes())).into_owned()
}

/// A route that accepted the current request, with its own parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: Arc<Route>,
    params: Params,
}

impl RouteMatch {
    #[must_use]
    pub fn new(route: Arc<Route>, params: Params) -> Self {
        Self { route, params }
    }

    #[must_use]
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Shorthand for `params().get(name)`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[must_use]
    pub fn into_params(self) -> Params {
        self.params
    }

    /// Run the route's middleware in registration order, then its handler.
    ///
    /// Returns `Ok(false)` when the handler passes on the request. Errors from
    /// middleware or the handler propagate; the caller decides whether they end
    /// the request.
    pub fn dispatch(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<bool> {
        let route = Arc::clone(&self.route);
        let started = Instant::now();

        for middleware in route.middleware() {
            middleware.before(self, ctx)?;
        }

        let outcome = route.handler().call(&self.params, ctx)?;
        let handled = outcome.is_handled();

        let latency = started.elapsed();
        for middleware in route.middleware() {
            middleware.after(self, ctx, handled, latency);
        }

        debug!(
            pattern = %route.pattern(),
            handled = handled,
            latency_us = latency.as_micros() as u64,
            "Route dispatched"
        );
        Ok(handled)
    }
}
