use std::collections::HashMap;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context as _, Result};
use http::Method;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{info, info_span};

use super::hooks::{self, Hook, Hooks};
use super::{services, Context, RequestId};
use crate::container::Container;
use crate::dispatcher::Dispatcher;
use crate::error::{ErrorHandler, ErrorReport, FrameworkError};
use crate::handlers::{Handler, HandlerRegistry, IntoOutcome};
use crate::http::{Request, Response, SendMode};
use crate::logging::{Logger, TracingWriter};
use crate::middleware::Middleware;
use crate::router::{Params, Route, RouteMatch, Router};
use crate::settings::Settings;
use crate::view::View;

/// Framework version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name an application is registered under when nothing else is.
pub const DEFAULT_APP: &str = "default";

static APPS: Lazy<RwLock<HashMap<String, Arc<App>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// The front controller.
///
/// Owns the service [`Container`] and the hook slots. Routes are registered
/// through the `router` service; [`App::handle`] runs one request through the
/// lifecycle and returns the finished [`Response`].
pub struct App {
    container: Container,
    settings: Arc<RwLock<Settings>>,
    hooks: RwLock<Hooks>,
    name: RwLock<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// An application with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// An application with defaults overridden by `TRELLIS_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_settings(Settings::from_env())
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        let app = Self {
            container: Container::new(),
            settings: Arc::new(RwLock::new(settings)),
            hooks: RwLock::new(Hooks::default()),
            name: RwLock::new(DEFAULT_APP.to_string()),
        };
        app.register_default_services();
        app
    }

    fn register_default_services(&self) {
        let c = &self.container;
        c.set_shared(services::SETTINGS, Arc::clone(&self.settings));

        c.singleton(services::REQUEST, |_| Ok(Request::from_env()));
        c.singleton(services::RESPONSE, |_| Ok(RwLock::new(Response::new())));

        c.singleton(services::ROUTER, |c| {
            let settings = c.get::<RwLock<Settings>>(services::SETTINGS)?;
            let case_sensitive = read_settings(&settings).routes.case_sensitive;
            Ok(RwLock::new(Router::new().case_sensitive(case_sensitive)))
        });

        c.singleton(services::LOGGER, |c| {
            let settings = c.get::<RwLock<Settings>>(services::SETTINGS)?;
            let logger = Logger::new(Arc::new(TracingWriter));
            logger.set_enabled(read_settings(&settings).log.enabled);
            Ok(logger)
        });

        c.singleton(services::ERROR, |c| {
            let logger = c.get::<Logger>(services::LOGGER)?;
            Ok(ErrorHandler::new(logger))
        });

        c.singleton(services::VIEW, |c| {
            let settings = c.get::<RwLock<Settings>>(services::SETTINGS)?;
            let dir = read_settings(&settings).templates.directory.clone();
            Ok(View::new(dir))
        });

        c.singleton(services::HANDLERS, |_| Ok(RwLock::new(HandlerRegistry::new())));
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// A snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        read_settings(&self.settings).clone()
    }

    /// Change settings in place.
    ///
    /// The logger's enabled flag follows `log.enabled`; routes registered
    /// afterwards pick up `routes.case_sensitive`.
    pub fn configure<F: FnOnce(&mut Settings)>(&self, f: F) -> Result<()> {
        let enabled = {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut settings);
            settings.log.enabled
        };
        self.logger()?.set_enabled(enabled);
        Ok(())
    }

    /// A setting by dotted key, e.g. `cookies.path`.
    #[must_use]
    pub fn config(&self, key: &str) -> Option<Value> {
        read_settings(&self.settings).get(key)
    }

    pub fn request(&self) -> Result<Arc<Request>> {
        self.container.get(services::REQUEST)
    }

    pub fn response(&self) -> Result<Arc<RwLock<Response>>> {
        self.container.get(services::RESPONSE)
    }

    pub fn router(&self) -> Result<Arc<RwLock<Router>>> {
        self.container.get(services::ROUTER)
    }

    pub fn logger(&self) -> Result<Arc<Logger>> {
        self.container.get(services::LOGGER)
    }

    pub fn error_handler(&self) -> Result<Arc<ErrorHandler>> {
        self.container.get(services::ERROR)
    }

    pub fn view(&self) -> Result<Arc<View>> {
        self.container.get(services::VIEW)
    }

    pub fn handlers(&self) -> Result<Arc<RwLock<HandlerRegistry>>> {
        self.container.get(services::HANDLERS)
    }

    /// Register `handler` for `pattern` under the given methods.
    ///
    /// Method names are case-insensitive; unsupported ones are dropped.
    ///
    /// # Errors
    ///
    /// [`FrameworkError::InvalidPattern`] for a malformed pattern.
    pub fn map<I, S, F, R>(&self, methods: I, pattern: &str, handler: F) -> Result<RouteRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map_handler(methods, pattern, Arc::new(handler))
    }

    /// [`App::map`] for an already shared handler.
    pub fn map_handler<I, S>(&self, methods: I, pattern: &str, handler: Arc<dyn Handler>) -> Result<RouteRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let case_sensitive = read_settings(&self.settings).routes.case_sensitive;
        let router = self.router()?;
        let index = {
            let mut guard = router.write().unwrap_or_else(PoisonError::into_inner);
            let route = guard.map(methods, pattern, handler)?;
            if route.is_case_sensitive() != case_sensitive {
                route.set_case_sensitive(case_sensitive)?;
            }
            guard.len() - 1
        };
        Ok(RouteRef { router, index })
    }

    /// Register a route whose handler is looked up in the handler registry.
    ///
    /// # Errors
    ///
    /// [`FrameworkError::UnknownHandler`] when `handler_name` is not registered.
    pub fn map_named<I, S>(&self, methods: I, pattern: &str, handler_name: &str) -> Result<RouteRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let handler = {
            let registry = self.handlers()?;
            let registry = registry.read().unwrap_or_else(PoisonError::into_inner);
            registry.resolve(handler_name)?
        };
        Ok(self.map_handler(methods, pattern, handler)?.name(handler_name))
    }

    /// Add `handler` to the handler registry under `name`.
    pub fn register_handler<F, R>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.handlers()?
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, handler);
        Ok(())
    }

    pub fn get<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["GET"], pattern, handler)
    }

    pub fn post<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["POST"], pattern, handler)
    }

    pub fn put<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["PUT"], pattern, handler)
    }

    pub fn patch<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["PATCH"], pattern, handler)
    }

    pub fn delete<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["DELETE"], pattern, handler)
    }

    pub fn options<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.map(["OPTIONS"], pattern, handler)
    }

    /// Register for every method the router supports.
    pub fn any<F, R>(&self, pattern: &str, handler: F) -> Result<RouteRef>
    where
        F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        let methods: Vec<String> = {
            let router = self.router()?;
            let router = router.read().unwrap_or_else(PoisonError::into_inner);
            router
                .supported_methods()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect()
        };
        self.map(methods, pattern, handler)
    }

    /// Assign the hook slot `name`, replacing what was there.
    pub fn hook<F>(&self, name: &str, hook: F)
    where
        F: Fn(&mut Context<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let hook: Hook = Arc::new(hook);
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(name, hook);
    }

    /// Fire the hook slot `name`. Returns `Ok(false)` when the slot is empty.
    pub fn apply_hook(&self, name: &str, ctx: &mut Context<'_>) -> Result<bool> {
        let hook = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name);
        match hook {
            Some(hook) => {
                hook(ctx).with_context(|| format!("hook '{name}' failed"))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clear the current response and point the client at `url`.
    pub fn redirect(&self, url: &str, status: u16) -> Result<()> {
        self.response()?
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .redirect(url, status)?;
        Ok(())
    }

    /// Queue a cookie on the current response using the cookie settings.
    pub fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        let cookie = read_settings(&self.settings).cookies.cookie(value);
        self.response()?
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookie(name, cookie);
        Ok(())
    }

    /// Register this application under `name`.
    ///
    /// The first application registered under any name also becomes the
    /// `default` instance.
    pub fn set_name(self: &Arc<Self>, name: &str) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
        let mut apps = APPS.write().unwrap_or_else(PoisonError::into_inner);
        apps.insert(name.to_string(), Arc::clone(self));
        apps.entry(DEFAULT_APP.to_string())
            .or_insert_with(|| Arc::clone(self));
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A registered application by name.
    #[must_use]
    pub fn instance(name: &str) -> Option<Arc<App>> {
        APPS.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Run one request through the lifecycle and return the finished response.
    ///
    /// Fresh `request` and `response` services are installed first. Failures in
    /// the before hook (or anything outside a route attempt) go to the error
    /// handler, which turns the response into a 500. Output of the after hook
    /// is appended to the returned body. View data is cleared once the request
    /// is done, so values set before `handle` apply to that request only.
    pub fn handle(&self, request: Request) -> Result<Response> {
        let request_id = RequestId::for_request(&request);
        let request = Arc::new(request);
        let response = Arc::new(RwLock::new(Response::new()));
        self.container.set_shared(services::REQUEST, Arc::clone(&request));
        self.container.set_shared(services::RESPONSE, Arc::clone(&response));

        let error = self.error_handler()?;
        error.set_display(read_settings(&self.settings).debug);
        let _hook_guard = error.register();

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.path_info()
        );
        let _entered = span.enter();

        let mut ctx = Context::new(self, request, response, request_id);

        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| Dispatcher::new(self).dispatch(&mut ctx)));
        let failure = match dispatched {
            Ok(Ok(report)) => {
                info!(
                    matched = report.matched,
                    attempted = report.attempted,
                    handled_by = ?report.handled_by,
                    failures = report.failures.len(),
                    "Request dispatched"
                );
                None
            }
            Ok(Err(err)) => Some(ErrorReport::from_error(&err)),
            Err(payload) => Some(ErrorReport::from_panic(payload.as_ref())),
        };
        if let Some(report) = failure {
            ctx.take_output();
            error.handle(&report, &mut ctx.response());
        }

        let mut finished = ctx.response().clone();

        let after = panic::catch_unwind(AssertUnwindSafe(|| self.apply_hook(hooks::AFTER, &mut ctx)));
        match after {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => error.report(&ErrorReport::from_error(&err)),
            Err(payload) => error.report(&ErrorReport::from_panic(payload.as_ref())),
        }
        finished.append_body(&ctx.take_output());

        // View data belongs to the request that set it.
        if let Ok(view) = self.view() {
            view.clear();
        }

        Ok(finished)
    }

    /// [`App::handle`] followed by [`Response::send`].
    pub fn run<W: Write>(&self, request: Request, out: &mut W, mode: &SendMode) -> Result<()> {
        let mut response = self.handle(request)?;
        response
            .send(out, mode)
            .context("Failed to write response")?;
        Ok(())
    }

    /// Serve the request described by the process environment and stdin,
    /// writing a CGI response to stdout.
    pub fn run_cgi(&self) -> Result<()> {
        let request = Request::from_env_with_body(io::stdin().lock())
            .context("Failed to read request body")?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run(request, &mut out, &SendMode::Cgi)
    }
}

/// Handle to a registered route for further configuration.
#[derive(Clone, Debug)]
pub struct RouteRef {
    router: Arc<RwLock<Router>>,
    index: usize,
}

impl RouteRef {
    fn update<T>(&self, f: impl FnOnce(&mut Route) -> T) -> Option<T> {
        let mut router = self.router.write().unwrap_or_else(PoisonError::into_inner);
        router.route_mut(self.index).map(f)
    }

    /// Position of the route in registration order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Append a closure middleware run before the handler.
    pub fn middleware<F>(self, middleware: F) -> Self
    where
        F: Fn(&mut RouteMatch, &mut Context<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.with_middleware(Arc::new(middleware))
    }

    pub fn with_middleware(self, middleware: Arc<dyn Middleware>) -> Self {
        self.update(|route| route.add_middleware(middleware));
        self
    }

    pub fn case_sensitive(self, case_sensitive: bool) -> Result<Self, FrameworkError> {
        if let Some(result) = self.update(|route| route.set_case_sensitive(case_sensitive)) {
            result?;
        }
        Ok(self)
    }

    pub fn name(self, name: &str) -> Self {
        self.update(|route| route.set_name(name));
        self
    }

    #[must_use]
    pub fn pattern(&self) -> Option<String> {
        let router = self.router.read().unwrap_or_else(PoisonError::into_inner);
        router.route(self.index).map(|r| r.pattern().to_string())
    }

    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        let router = self.router.read().unwrap_or_else(PoisonError::into_inner);
        router
            .route(self.index)
            .map(|r| r.methods().to_vec())
            .unwrap_or_default()
    }
}

fn read_settings(settings: &RwLock<Settings>) -> std::sync::RwLockReadGuard<'_, Settings> {
    settings.read().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name())
            .field("container", &self.container)
            .field("hooks", &*self.hooks.read().unwrap_or_else(PoisonError::into_inner))
            .finish()
    }
}
