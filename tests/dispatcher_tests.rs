//! Tests for the fall-through dispatch loop
//!
//! # Test Coverage
//!
//! - First matching route that handles the request wins
//! - A route that passes hands the request to the next match
//! - A route that errors or panics is skipped, its output discarded
//! - `Page Not Found` with 404 when nothing handles the request
//! - Hook order around each route attempt
//! - Middleware running before the handler and rewriting parameters
//! - Fatal errors from the `before` hook reaching the error handler

use std::sync::{Arc, Mutex};

use serde_json::json;
use trellis::app::hooks;
use trellis::dispatcher::{Dispatcher, Phase, NOT_FOUND_BODY};
use trellis::{App, Outcome, Request};

mod tracing_util;
use tracing_util::TestTracing;

fn get(path: &str) -> Request {
    Request::builder().method("GET").uri(path).build()
}

#[test]
fn test_first_handling_route_wins() {
    let app = App::new();
    app.get("/hello", |_, ctx| ctx.echo("first")).unwrap();
    app.get("/hello", |_, ctx| ctx.echo("second")).unwrap();

    let response = app.handle(get("/hello")).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "first");
}

#[test]
fn test_pass_falls_through_and_discards_output() {
    let app = App::new();
    app.get("/blog/@slug", |params, ctx| {
        ctx.echo("specific ");
        if params.get("slug") == Some("latest") {
            Outcome::Pass
        } else {
            Outcome::Handled
        }
    })
    .unwrap();
    app.get("/blog(/@rest)", |_, ctx| ctx.echo("generic")).unwrap();

    assert_eq!(app.handle(get("/blog/latest")).unwrap().body(), "generic");
    assert_eq!(app.handle(get("/blog/post-1")).unwrap().body(), "specific ");
}

#[test]
fn test_failing_route_is_skipped() {
    let tracing = TestTracing::init();
    let app = App::new();
    app.get("/x", |_, ctx| -> anyhow::Result<()> {
        ctx.echo("half-written");
        Err(anyhow::anyhow!("database unavailable"))
    })
    .unwrap();
    app.get("/x", |_, ctx| ctx.echo("fallback")).unwrap();

    let response = app.handle(get("/x")).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "fallback");

    let logs = tracing.logs.contents();
    assert!(logs.contains("Route attempt failed"));
    assert!(logs.contains("database unavailable"));
}

#[test]
fn test_panicking_route_is_skipped() {
    let app = App::new();
    app.get("/x", |_, _| -> Outcome { panic!("handler blew up") })
        .unwrap();
    app.get("/x", |_, ctx| ctx.echo("recovered")).unwrap();

    let response = app.handle(get("/x")).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "recovered");
}

#[test]
fn test_not_found_when_nothing_handles() {
    let app = App::new();
    app.get("/only", |_, _| Outcome::Pass).unwrap();
    app.post("/missing", |_, ctx| ctx.echo("wrong method")).unwrap();

    for path in ["/only", "/missing", "/nowhere"] {
        let response = app.handle(get(path)).unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.body(), NOT_FOUND_BODY);
    }
}

#[test]
fn test_error_in_every_route_gives_not_found() {
    let app = App::new();
    app.get("/x", |_, _| Err::<(), _>(anyhow::anyhow!("nope")))
        .unwrap();

    let response = app.handle(get("/x")).unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), "Page Not Found");
}

#[test]
fn test_hook_order() {
    let app = App::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    for name in [hooks::BEFORE, hooks::BEFORE_DISPATCH, hooks::AFTER_DISPATCH, hooks::AFTER] {
        let events = Arc::clone(&events);
        app.hook(name, move |_| {
            events.lock().unwrap().push(name.to_string());
            Ok(())
        });
    }
    let handler_events = Arc::clone(&events);
    app.get("/x", move |_, _| {
        handler_events.lock().unwrap().push("pass".to_string());
        Outcome::Pass
    })
    .unwrap();
    let handler_events = Arc::clone(&events);
    app.get("/x", move |_, _| {
        handler_events.lock().unwrap().push("handle".to_string());
    })
    .unwrap();

    app.handle(get("/x")).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "before",
            "before.dispatch",
            "pass",
            "after.dispatch",
            "before.dispatch",
            "handle",
            "after.dispatch",
            "after",
        ]
    );
}

#[test]
fn test_middleware_runs_first_and_can_rewrite_params() {
    let app = App::new();
    app.get("/users/@id", |params, ctx| {
        ctx.echo(&format!("user {}", params.require("id")?));
        Ok::<_, anyhow::Error>(())
    })
    .unwrap()
    .middleware(|matched, ctx| {
        ctx.echo("[mw]");
        let id = matched.param("id").unwrap_or("").to_uppercase();
        matched.params_mut().set("id", id);
        Ok(())
    });

    assert_eq!(app.handle(get("/users/ab")).unwrap().body(), "[mw]user AB");
}

#[test]
fn test_middleware_error_disqualifies_route() {
    let app = App::new();
    app.get("/admin", |_, ctx| ctx.echo("secret"))
        .unwrap()
        .middleware(|_, _| anyhow::bail!("not logged in"));
    app.get("/admin", |_, ctx| ctx.echo("login page")).unwrap();

    assert_eq!(app.handle(get("/admin")).unwrap().body(), "login page");
}

#[test]
fn test_before_hook_error_is_fatal() {
    let app = App::new();
    app.hook(hooks::BEFORE, |_| anyhow::bail!("maintenance"));
    app.get("/", |_, ctx| ctx.echo("home")).unwrap();

    let response = app.handle(get("/")).unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.body(), "");
}

#[test]
fn test_before_hook_error_shows_page_in_debug() {
    let app = App::new();
    app.configure(|s| s.debug = true).unwrap();
    app.hook(hooks::BEFORE, |_| anyhow::bail!("maintenance <now>"));

    let response = app.handle(get("/")).unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert!(response.body().contains("maintenance &lt;now&gt;"));
}

#[test]
fn test_dispatch_report() {
    let app = App::new();
    app.get("/r", |_, _| Err::<(), _>(anyhow::anyhow!("first fails")))
        .unwrap();
    app.get("/r", |_, _| Outcome::Pass).unwrap();
    app.get("/r", |_, ctx| ctx.echo("third")).unwrap();
    app.get("/r", |_, ctx| ctx.echo("never")).unwrap();

    let request = Arc::new(get("/r"));
    let response = app.response().unwrap();
    let mut ctx = trellis::Context::new(&app, request, Arc::clone(&response), Default::default());
    let report = Dispatcher::new(&app).dispatch(&mut ctx).unwrap();

    assert_eq!(report.matched, 4);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.handled_by.as_deref(), Some("/r"));
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].message.contains("first fails"));
    assert_eq!(
        report.phases,
        vec![Phase::Before, Phase::Matching, Phase::Dispatching, Phase::Done]
    );
    assert_eq!(response.read().unwrap().body(), "third");
    assert_eq!(
        serde_json::to_value(&report.phases).unwrap(),
        json!(["before", "matching", "dispatching", "done"])
    );
}
