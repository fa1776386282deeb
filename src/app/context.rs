use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use anyhow::Result;
use serde::{Serialize, Serializer};
use serde_json::Value;
use ulid::Ulid;

use super::App;
use crate::http::{Cookie, Request, Response};
use crate::router::Route;

/// ULID naming one request in every log line it produces.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// The client's `X-Request-Id` when it holds a ULID, a fresh id otherwise.
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        request
            .header("x-request-id")
            .and_then(|raw| Ulid::from_string(raw.trim()).ok())
            .map_or_else(Self::default, Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything a handler, middleware or hook sees of the current request.
///
/// Output written with [`Context::echo`] (or `write!`) is buffered and becomes
/// the response body once dispatch finishes. Output written during a route
/// attempt that fails or passes is dropped with it.
pub struct Context<'a> {
    app: &'a App,
    request: Arc<Request>,
    response: Arc<RwLock<Response>>,
    output: String,
    request_id: RequestId,
    current_route: Option<Arc<Route>>,
}

impl<'a> Context<'a> {
    /// A context for driving a [`Dispatcher`](crate::dispatcher::Dispatcher)
    /// directly; [`App::handle`] builds its own.
    pub fn new(
        app: &'a App,
        request: Arc<Request>,
        response: Arc<RwLock<Response>>,
        request_id: RequestId,
    ) -> Self {
        Self {
            app,
            request,
            response,
            output: String::new(),
            request_id,
            current_route: None,
        }
    }

    #[must_use]
    pub fn app(&self) -> &'a App {
        self.app
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Lock the response for writing.
    ///
    /// Release the guard before calling back into [`App`] methods that touch
    /// the response, such as [`App::redirect`].
    pub fn response(&self) -> RwLockWriteGuard<'_, Response> {
        self.response.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn echo(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Output buffered so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn output_len(&self) -> usize {
        self.output.len()
    }

    pub(crate) fn truncate_output(&mut self, len: usize) {
        self.output.truncate(len);
    }

    pub(crate) fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The route being attempted, or the one that handled the request.
    #[must_use]
    pub fn current_route(&self) -> Option<&Arc<Route>> {
        self.current_route.as_ref()
    }

    pub(crate) fn set_current_route(&mut self, route: Option<Arc<Route>>) {
        self.current_route = route;
    }

    /// Queue a cookie using the application's cookie defaults.
    pub fn set_cookie(&self, name: &str, value: &str) {
        let cookie = self.app.settings().cookies.cookie(value);
        self.response().set_cookie(name, cookie);
    }

    /// Queue a fully specified cookie.
    pub fn set_cookie_with(&self, name: &str, cookie: Cookie) {
        self.response().set_cookie(name, cookie);
    }

    /// Clear the response and redirect the client to `url`.
    pub fn redirect(&self, url: &str, status: u16) -> Result<()> {
        self.response().redirect(url, status)?;
        Ok(())
    }

    /// Render a template from the view service into the output.
    pub fn render(&mut self, template: &str, data: &Value) -> Result<()> {
        let view = self.app.view()?;
        view.display(self, template, data)
    }

    /// Look up a container service.
    pub fn service<T: std::any::Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        self.app.container().get(key)
    }
}

impl fmt::Write for Context<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.echo(s);
        Ok(())
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("path_info", &self.request.path_info())
            .field("output_len", &self.output.len())
            .field("current_route", &self.current_route.as_ref().map(|r| r.pattern()))
            .finish()
    }
}
