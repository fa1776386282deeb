use http::Method;

use super::Router;
use crate::handlers::{handler_fn, Outcome};

fn router_with(patterns: &[&str]) -> Router {
    let mut router = Router::new();
    for pattern in patterns {
        router
            .map(["GET"], pattern, handler_fn(|_, _| Outcome::Handled))
            .unwrap();
    }
    router
}

fn patterns(router: &Router, method: &Method, path: &str) -> Vec<String> {
    router
        .matched_routes(method, path)
        .iter()
        .map(|m| m.route().pattern().to_string())
        .collect()
}

#[test]
fn test_root_path() {
    let router = router_with(&["/"]);
    assert_eq!(router.matched_routes(&Method::GET, "/").len(), 1);
    assert_eq!(router.matched_routes(&Method::GET, "").len(), 1);
    assert!(router.matched_routes(&Method::GET, "/x").is_empty());
}

#[test]
fn test_constrained_parameter() {
    let router = router_with(&[r"/blog/@id:[\d]+"]);
    let matched = router.matched_routes(&Method::GET, "/blog/42");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].param("id"), Some("42"));
    assert!(router.matched_routes(&Method::GET, "/blog/abc").is_empty());
    assert!(router.matched_routes(&Method::GET, "/blog/").is_empty());
}

#[test]
fn test_nested_optional_groups() {
    let router = router_with(&["/admin(/@module(/@controller(/@action)))(/@id)"]);

    let matched = router.matched_routes(&Method::GET, "/admin");
    assert_eq!(matched.len(), 1);
    assert!(matched[0].params().is_empty());

    let matched = router.matched_routes(&Method::GET, "/admin/users/edit/save/7");
    let params = matched[0].params();
    assert_eq!(params.get("module"), Some("users"));
    assert_eq!(params.get("controller"), Some("edit"));
    assert_eq!(params.get("action"), Some("save"));
    assert_eq!(params.get("id"), Some("7"));

    assert!(router
        .matched_routes(&Method::GET, "/admin/a/b/c/d/e")
        .is_empty());
}

#[test]
fn test_all_matches_in_registration_order() {
    let router = router_with(&["/blog/@slug", "/blog(/@rest)", "/about"]);
    assert_eq!(
        patterns(&router, &Method::GET, "/blog/hello"),
        vec!["/blog/@slug", "/blog(/@rest)"]
    );
}

#[test]
fn test_matching_is_repeatable() {
    let router = router_with(&["/users/@id"]);
    let first = router.matched_routes(&Method::GET, "/users/1");
    let second = router.matched_routes(&Method::GET, "/users/2");
    assert_eq!(first[0].param("id"), Some("1"));
    assert_eq!(second[0].param("id"), Some("2"));
    assert_eq!(
        router.matched_routes(&Method::GET, "/users/1")[0].params(),
        first[0].params()
    );
}

#[test]
fn test_method_normalization() {
    let mut router = Router::new();
    let route = router
        .map(["get", "Post", "BREW", "get"], "/x", handler_fn(|_, _| ()))
        .unwrap();
    assert_eq!(route.methods(), &[Method::GET, Method::POST]);

    assert_eq!(router.matched_routes(&Method::POST, "/x").len(), 1);
    assert!(router.matched_routes(&Method::DELETE, "/x").is_empty());
}

#[test]
fn test_route_with_no_supported_method_never_matches() {
    let mut router = Router::new();
    router
        .map(["TRACE"], "/x", handler_fn(|_, _| ()))
        .unwrap();
    assert_eq!(router.len(), 1);
    assert!(router.matched_routes(&Method::TRACE, "/x").is_empty());
    assert!(router.matched_routes(&Method::GET, "/x").is_empty());
}

#[test]
fn test_case_sensitivity() {
    let insensitive = router_with(&["/About"]);
    assert_eq!(insensitive.matched_routes(&Method::GET, "/about").len(), 1);

    let mut sensitive = Router::new().case_sensitive(true);
    sensitive
        .map(["GET"], "/About", handler_fn(|_, _| ()))
        .unwrap();
    assert!(sensitive.matched_routes(&Method::GET, "/about").is_empty());
    assert_eq!(sensitive.matched_routes(&Method::GET, "/About").len(), 1);

    let route = sensitive.route_mut(0).unwrap();
    route.set_case_sensitive(false).unwrap();
    assert_eq!(sensitive.matched_routes(&Method::GET, "/about").len(), 1);
}

#[test]
fn test_slashes_are_forgiving() {
    let router = router_with(&["/docs/@page/"]);
    assert_eq!(router.matched_routes(&Method::GET, "/docs/intro").len(), 1);
    assert_eq!(router.matched_routes(&Method::GET, "/docs/intro/").len(), 1);
    let matched = router.matched_routes(&Method::GET, "//docs///intro");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].param("page"), Some("intro"));
}

#[test]
fn test_parameters_are_url_decoded() {
    let router = router_with(&["/search/@term"]);
    let matched = router.matched_routes(&Method::GET, "/search/hello%20big+world");
    assert_eq!(matched[0].param("term"), Some("hello big world"));
}

#[test]
fn test_literals_are_escaped() {
    let router = router_with(&["/file.json"]);
    assert_eq!(router.matched_routes(&Method::GET, "/file.json").len(), 1);
    assert!(router.matched_routes(&Method::GET, "/fileXjson").is_empty());
}

#[test]
fn test_duplicate_names_keep_last_capture() {
    let router = router_with(&["/@x/@x"]);
    let matched = router.matched_routes(&Method::GET, "/first/second");
    assert_eq!(matched[0].params().len(), 1);
    assert_eq!(matched[0].param("x"), Some("second"));
}

#[test]
fn test_invalid_pattern_is_rejected_at_registration() {
    let mut router = Router::new();
    assert!(router
        .map(["GET"], "/a(/b", handler_fn(|_, _| ()))
        .is_err());
    assert!(router.is_empty());
}
