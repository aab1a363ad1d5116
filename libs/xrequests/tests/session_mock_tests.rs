#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Session requests against an httpmock server

mod common;

use common::session;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use xrequests::{PoolKey, RequestError, Session};

#[test]
fn test_get_json() {
    #[derive(serde::Deserialize)]
    struct Item {
        name: String,
        value: i32,
    }

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/json").query_param("id", "7");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"name": "test", "value": 42}));
    });

    let resp = session()
        .get(&server.url("/json?id=7"))
        .send()
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.content_type(), Some("application/json"));
    let item: Item = resp.json().unwrap();
    assert_eq!(item.name, "test");
    assert_eq!(item.value, 42);
    assert_eq!(mock.calls(), 1);
}

#[test]
fn test_post_json_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/items")
            .header("content-type", "application/json")
            .json_body(json!({"id": 1, "tags": ["a", "b"]}));
        then.status(201).body("created");
    });

    let resp = session()
        .post(&server.url("/items"))
        .json(&json!({"id": 1, "tags": ["a", "b"]}))
        .unwrap()
        .send()
        .unwrap();

    assert_eq!(resp.status(), 201);
    assert_eq!(resp.text(), "created");
    assert_eq!(mock.calls(), 1);
}

#[test]
fn test_host_and_user_agent_headers() {
    let server = MockServer::start();
    let host = format!("127.0.0.1:{}", server.port());
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/ua")
            .header("host", host.as_str())
            .header("user-agent", "xrequests-test/1.0");
        then.status(204);
    });

    let session = Session::builder()
        .user_agent("xrequests-test/1.0")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let resp = session.get(&server.url("/ua")).send().unwrap();

    assert_eq!(resp.status(), 204);
    assert!(resp.body().is_empty());
    assert_eq!(mock.calls(), 1);
}

#[test]
fn test_error_for_status() {
    let server = MockServer::start();
    let _m = server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404).body(r#"{"error": "not found"}"#);
    });

    let resp = session().get(&server.url("/missing")).send().unwrap();
    assert!(!resp.is_success());
    assert_eq!(resp.reason(), "Not Found");

    match resp.error_for_status() {
        Err(RequestError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus error, got: {other:?}"),
    }
}

#[test]
fn test_merged_headers_reach_server() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/tags")
            .header("x-first", "1")
            .header("x-second", "2");
        then.status(200);
    });

    let resp = session()
        .put(&server.url("/tags"))
        .headers([("X-First", "1"), ("X-Second", "2")])
        .body_string("payload".to_owned())
        .send()
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(mock.calls(), 1);
}

#[test]
fn test_concurrent_requests_share_one_pool_slot() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/concurrent");
        then.status(200).body("ok");
    });

    let session = session();
    let url = server.url("/concurrent");
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let resp = session.get(&url).send().unwrap();
                assert_eq!(resp.text(), "ok");
            });
        }
    });

    assert_eq!(mock.calls(), 8);
    assert_eq!(
        session.pool_keys(),
        vec![PoolKey::new("127.0.0.1", server.port())]
    );
}
