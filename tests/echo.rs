//! The reflector behind the full app: routing, middleware and all.

use bytes::Bytes;
use echobin::telemetry::Level;
use echobin::Request;
use http::StatusCode;
use serde_json::json;

mod common;
use common::{call, json_body, recorded, request};

#[tokio::test]
async fn json_body_is_mirrored() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let res = call(
        &app,
        request("POST", "/api/test", &[("content-type", "application/json")], br#"{"user":"alice"}"#),
    )
    .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(
        json_body(&res),
        json!({
            "body": {"user": "alice"},
            "headers": {"content-type": "application/json"},
            "queries": {},
            "params": {}
        })
    );
}

#[tokio::test]
async fn repeated_queries_collapse() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let res = call(&app, request("GET", "/x?a=1&a=2&b=3", &[], b"")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let v = json_body(&res);
    assert_eq!(v["body"], json!({}));
    assert_eq!(v["queries"], json!({"a": ["1", "2"], "b": "3"}));
}

#[tokio::test]
async fn repeated_headers_keep_arrival_order() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let res = call(
        &app,
        request("PUT", "/", &[("x-hop", "b"), ("x-hop", "a"), ("x-single", "1")], b""),
    )
    .await;

    let v = json_body(&res);
    assert_eq!(v["headers"]["x-hop"], json!(["b", "a"]));
    assert_eq!(v["headers"]["x-single"], json!("1"));
}

#[tokio::test]
async fn scalar_and_array_bodies_round_trip() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    for raw in [r#"[1,"two",{"three":3}]"#, "12.5", r#""plain""#, "null", "false"] {
        let req = Request::from(
            http::Request::post("/hook").body(Bytes::copy_from_slice(raw.as_bytes())).unwrap(),
        );
        let res = call(&app, req).await;
        let expected: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(json_body(&res)["body"], expected);
    }
}

#[tokio::test]
async fn malformed_body_is_500_plain_text_with_one_event() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let res = call(&app, request("POST", "/", &[], b"{bad json")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    assert!(!res.body().is_empty());
    assert!(serde_json::from_slice::<serde_json::Value>(res.body()).is_err());

    let events = rec.monitor.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.level, Level::Error);
    assert_eq!(event.exception.as_ref().unwrap().values[0].kind, "BodyParseError");
    assert_eq!(event.extra["body"], "{bad json");
    assert_eq!(event.tags["endpoint"], "handle_request");
    assert_eq!(event.tags["http.status_code"], "500");

    let entries = rec.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(entries[0].to_string().contains(" error=\""));
}

#[tokio::test]
async fn unreadable_body_is_500_with_transport_error_text() {
    use futures_util::stream;
    use http_body_util::StreamBody;
    use hyper::body::Frame;

    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let chunks: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
        Ok(Frame::data(Bytes::from_static(b"{\"partial\":"))),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
    ];
    let body = StreamBody::new(stream::iter(chunks));
    let req = Request::from_http(
        http::Request::post("/upload").body(body).unwrap(),
        "192.0.2.1:5555".parse().unwrap(),
    );

    let res = call(&app, req).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body(), b"client went away");

    let events = rec.monitor.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].exception.as_ref().unwrap().values[0].kind, "BodyReadError");
    assert_eq!(events[0].extra["url"], "/upload");
}

#[tokio::test]
async fn healthz_ignores_everything() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    for req in [
        request("GET", "/healthz", &[], b""),
        request("GET", "/healthz?verbose=1", &[("x-check", "k8s")], b"{not json"),
    ] {
        let res = call(&app, req).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"OK");
    }
    assert!(rec.monitor.events().is_empty());
}

#[tokio::test]
async fn replay_is_byte_identical() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    let make = || {
        request(
            "POST",
            "/replay?z=9&a=1&z=8",
            &[("x-b", "2"), ("x-a", "1"), ("content-type", "application/json")],
            br#"{"nested":{"k":[1,2,3]},"flag":true}"#,
        )
    };
    let first = call(&app, make()).await;
    let second = call(&app, make()).await;

    assert_eq!(first.body(), second.body());
    assert!(first.body().ends_with(b"\n"));
}

#[tokio::test]
async fn successful_requests_are_not_reported_by_default() {
    let rec = recorded();
    let app = echobin::app(rec.telemetry.clone()).into_handler();

    call(&app, request("GET", "/quiet", &[], b"")).await;

    assert!(rec.monitor.events().is_empty());
    assert_eq!(rec.log.entries().len(), 1);
}
