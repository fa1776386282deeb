use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use trellis::handlers::{handler_fn, Outcome};
use trellis::router::Router;

const PATTERNS: &[&str] = &[
    "/",
    r"/blog/@id:[\d]+",
    "/blog(/@slug)",
    "/admin(/@module(/@controller(/@action)))(/@id)",
    "/zoo/animals/@id/toys/@toy_id",
    "/inventory/@warehouse/feeds/@feed/items/@item/batches/@batch",
    "/files/@path:.*",
];

fn build_router() -> Router {
    let mut router = Router::new();
    for pattern in PATTERNS {
        if let Err(err) = router.map(["GET", "POST"], pattern, handler_fn(|_, _| Outcome::Handled)) {
            panic!("bench pattern {pattern} rejected: {err}");
        }
    }
    router
}

fn bench_matched_routes(c: &mut Criterion) {
    let router = build_router();
    c.bench_function("matched_routes", |b| {
        let test_paths = [
            (Method::GET, "/"),
            (Method::GET, "/blog/42"),
            (Method::GET, "/blog/hello-world"),
            (Method::GET, "/admin/users/edit/save/7"),
            (Method::GET, "/zoo/animals/123/toys/456"),
            (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
            (Method::GET, "/files/a/b/c.txt"),
            (Method::GET, "/nowhere/at/all"),
        ];
        b.iter(|| {
            for (method, path) in &test_paths {
                black_box(router.matched_routes(method, path));
            }
        })
    });
}

fn bench_case_sensitive(c: &mut Criterion) {
    let mut router = Router::new().case_sensitive(true);
    for pattern in PATTERNS {
        if let Err(err) = router.map(["GET"], pattern, handler_fn(|_, _| ())) {
            panic!("bench pattern {pattern} rejected: {err}");
        }
    }
    c.bench_function("matched_routes_case_sensitive", |b| {
        b.iter(|| black_box(router.matched_routes(&Method::GET, "/admin/Users/Edit")))
    });
}

criterion_group!(benches, bench_matched_routes, bench_case_sensitive);
criterion_main!(benches);
