use std::time::Duration;

use crate::app::Context;
use crate::router::RouteMatch;

/// Per-route middleware.
///
/// `before` runs ahead of the handler, in registration order, and may inspect or
/// rewrite the match (its parameters in particular). An error from `before` fails
/// the route attempt. `after` runs once the handler returned, whether or not it
/// handled the request.
pub trait Middleware: Send + Sync {
    fn before(&self, _matched: &mut RouteMatch, _ctx: &mut Context<'_>) -> anyhow::Result<()> {
        Ok(())
    }
    fn after(&self, _matched: &RouteMatch, _ctx: &mut Context<'_>, _handled: bool, _latency: Duration) {}
}

impl<F> Middleware for F
where
    F: Fn(&mut RouteMatch, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn before(&self, matched: &mut RouteMatch, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        self(matched, ctx)
    }
}
