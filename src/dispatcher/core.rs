use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};

use anyhow::Result;
use http::StatusCode;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::app::hooks;
use crate::app::{App, Context, RequestId};
use crate::error::ErrorReport;
use crate::router::RouteMatch;

/// Body written when no route handled the request.
pub const NOT_FOUND_BODY: &str = "Page Not Found";

/// Lifecycle phases, recorded in the order they were entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    Matching,
    Dispatching,
    NotFound,
    Done,
}

/// A route attempt that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteFailure {
    pub pattern: String,
    pub message: String,
}

/// What happened while dispatching one request.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub request_id: RequestId,
    pub phases: Vec<Phase>,
    /// Routes whose method and pattern matched
    pub matched: usize,
    /// Routes actually tried before one handled the request
    pub attempted: usize,
    /// Pattern of the route that handled the request
    pub handled_by: Option<Arc<str>>,
    pub failures: Vec<RouteFailure>,
}

impl DispatchReport {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            phases: Vec::new(),
            matched: 0,
            attempted: 0,
            handled_by: None,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn handled(&self) -> bool {
        self.handled_by.is_some()
    }
}

/// Runs the route loop for an [`App`].
pub struct Dispatcher<'a> {
    app: &'a App,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    /// Dispatch the request held by `ctx`.
    ///
    /// Matching routes are tried in registration order until one handles the
    /// request. An attempt that errors or panics is logged and skipped, and
    /// its output is discarded, as is the output of an attempt that passes.
    /// Errors from the `before` hook or from looking up the router are
    /// returned to the caller.
    pub fn dispatch(&self, ctx: &mut Context<'_>) -> Result<DispatchReport> {
        let mut report = DispatchReport::new(ctx.request_id());

        report.phases.push(Phase::Before);
        self.app.apply_hook(hooks::BEFORE, ctx)?;

        report.phases.push(Phase::Matching);
        let matches = {
            let router = self.app.router()?;
            let router = router.read().unwrap_or_else(PoisonError::into_inner);
            router.matched_routes(ctx.request().method(), ctx.request().path_info())
        };
        report.matched = matches.len();

        report.phases.push(Phase::Dispatching);
        for mut matched in matches {
            report.attempted += 1;
            let route = Arc::clone(matched.route());
            let mark = ctx.output_len();
            ctx.set_current_route(Some(Arc::clone(&route)));

            let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.attempt(&mut matched, ctx)));
            let message = match attempt {
                Ok(Ok(true)) => {
                    report.handled_by = Some(Arc::clone(route.pattern()));
                    break;
                }
                Ok(Ok(false)) => {
                    debug!(pattern = %route.pattern(), "Route passed");
                    ctx.truncate_output(mark);
                    continue;
                }
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => ErrorReport::from_panic(payload.as_ref()).summary(),
            };

            ctx.truncate_output(mark);
            self.log_failure(ctx, route.pattern(), &message);
            report.failures.push(RouteFailure {
                pattern: route.pattern().to_string(),
                message,
            });
        }

        if !report.handled() {
            ctx.set_current_route(None);
            report.phases.push(Phase::NotFound);
            ctx.echo(NOT_FOUND_BODY);
            ctx.response().set_status_code(StatusCode::NOT_FOUND);
        }

        report.phases.push(Phase::Done);
        let output = ctx.take_output();
        ctx.response().append_body(&output);
        Ok(report)
    }

    fn attempt(&self, matched: &mut RouteMatch, ctx: &mut Context<'_>) -> Result<bool> {
        self.app.apply_hook(hooks::BEFORE_DISPATCH, ctx)?;
        let handled = matched.dispatch(ctx)?;
        self.app.apply_hook(hooks::AFTER_DISPATCH, ctx)?;
        Ok(handled)
    }

    fn log_failure(&self, ctx: &Context<'_>, pattern: &str, message: &str) {
        warn!(
            request_id = %ctx.request_id(),
            pattern = %pattern,
            error = %message,
            "Route attempt failed, trying next match"
        );
        if let Ok(logger) = self.app.logger() {
            logger.error(
                "Route {pattern} failed",
                &json!({ "pattern": pattern, "exception": message }),
            );
        }
    }
}
