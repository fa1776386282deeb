use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::app::Context;
use crate::router::RouteMatch;

/// Logs each attempt at a route: the parameters going in, the outcome and
/// latency coming out.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, matched: &mut RouteMatch, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        debug!(
            request_id = %ctx.request_id(),
            method = %ctx.request().method(),
            path = %ctx.request().path_info(),
            pattern = %matched.route().pattern(),
            params = ?matched.params().to_map(),
            "Route attempt"
        );
        Ok(())
    }

    fn after(&self, matched: &RouteMatch, ctx: &mut Context<'_>, handled: bool, latency: Duration) {
        info!(
            request_id = %ctx.request_id(),
            pattern = %matched.route().pattern(),
            handled = handled,
            latency_ms = latency.as_millis() as u64,
            "Route attempt complete"
        );
    }
}
