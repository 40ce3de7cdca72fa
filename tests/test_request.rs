use std::sync::Arc;
use std::time::Duration;

use ice_server::http::request::{Method, Request};
use ice_server::session::SessionStore;

fn get(uri: &str) -> Request {
    Request::builder().method(Method::GET).uri(uri).build().unwrap()
}

#[test]
fn test_request_header_retrieval() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_header_lookup_is_case_sensitive() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header("X-Token", "abc")
        .build()
        .unwrap();

    assert_eq!(req.header("X-Token"), Some("abc"));
    assert_eq!(req.header("x-token"), None);
}

#[test]
fn test_request_duplicate_headers_first_wins() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header("Accept", "text/html")
        .header("Accept", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Accept"), Some("text/html"));
    assert_eq!(req.headers().filter(|(k, _)| *k == "Accept").count(), 2);
}

#[test]
fn test_request_content_length_parsing() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api")
        .header("Content-Length", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing() {
    assert_eq!(get("/").content_length(), 0);
}

#[test]
fn test_request_path_and_query() {
    let req = get("/search?q=rust&page=2");

    assert_eq!(req.path(), "/search");
    assert_eq!(req.query(), Some("q=rust&page=2"));
    assert_eq!(get("/plain").query(), None);
}

#[test]
fn test_request_empty_body_is_absent() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .body(Vec::<u8>::new())
        .build()
        .unwrap();

    assert_eq!(req.body(), None);
}

#[test]
fn test_request_keep_alive_rules() {
    assert!(get("/").keep_alive());

    let close = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!close.keep_alive());

    let http10 = Request::builder()
        .method(Method::GET)
        .uri("/")
        .version("HTTP/1.0")
        .build()
        .unwrap();
    assert!(!http10.keep_alive());
}

#[test]
fn test_request_cookie_lookup() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header("Cookie", "theme=dark; ICE_SESSION_ID=01ABC")
        .build()
        .unwrap();

    assert_eq!(req.cookie("theme"), Some("dark"));
    assert_eq!(req.cookie("ICE_SESSION_ID"), Some("01ABC"));
    assert_eq!(req.cookie("missing"), None);
}

#[test]
fn test_request_builder_requires_method_and_uri() {
    assert!(Request::builder().uri("/").build().is_err());
    assert!(Request::builder().method(Method::GET).build().is_err());
}

#[test]
fn test_request_without_store_has_no_session() {
    let req = get("/");

    assert_eq!(req.create_session(), None);
    assert!(!req.load_session("anything"));
    assert!(!req.set_session_item("k", "v"));
    assert_eq!(req.session_item("k"), None);
}

#[test]
fn test_request_session_roundtrip() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
    let mut req = get("/");
    req.attach_sessions(Arc::clone(&store));

    assert_eq!(req.session_id(), None);
    assert!(!req.set_session_item("user", "ada"));

    let id = req.create_session().unwrap();
    assert_eq!(req.session_id().as_deref(), Some(id.as_str()));
    assert!(req.set_session_item("user", "ada"));
    assert_eq!(req.session_item("user").as_deref(), Some("ada"));
    assert_eq!(store.get_item(&id, "user").as_deref(), Some("ada"));

    assert_eq!(req.remove_session_item("user").as_deref(), Some("ada"));
    assert_eq!(req.session_item("user"), None);
}

#[test]
fn test_request_load_unknown_session_fails() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
    let mut req = get("/");
    req.attach_sessions(store);

    assert!(!req.load_session("no-such-session"));
    assert_eq!(req.session_id(), None);
}
