use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use logdrain::config::SinkConfig;
use logdrain::sink::{SinkRegistry, TracingReporter};
use logdrain::source::MessageFormat;
use logdrain::store::{LogStore, MemoryLogStore};
use logdrain::web::{router, Credentials, DrainState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const LINE_ONE: &str =
    "89 <45>1 2016-10-15T08:59:08.723822+00:00 host heroku web.1 - State changed from up to down";
const LINE_TWO: &str =
    "83 <190>1 2016-10-15T08:59:07.000000+00:00 host app web.1 - \x1b[1mStarting process\x1b[0m";

struct Harness {
    app: Router,
    registry: Arc<SinkRegistry>,
    store: Arc<MemoryLogStore>,
}

fn harness(credentials: Credentials, format: MessageFormat, strip_ansi_codes: bool) -> Harness {
    let store = Arc::new(MemoryLogStore::new());
    let registry = Arc::new(SinkRegistry::new(
        Arc::clone(&store) as Arc<dyn LogStore>,
        Arc::new(TracingReporter),
        SinkConfig {
            flush_interval: Duration::from_millis(20),
            ..SinkConfig::default()
        },
    ));
    let state = Arc::new(DrainState {
        registry: Arc::clone(&registry),
        credentials,
        message_format: format,
        strip_ansi_codes,
    });

    Harness {
        app: router(state),
        registry,
        store,
    }
}

fn open_harness() -> Harness {
    harness(Credentials::default(), MessageFormat::Text, false)
}

fn request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
}

#[tokio::test]
async fn test_health_check() {
    let h = open_harness();
    let response = h.app.oneshot(request(Method::GET, "/", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_get_tenant_is_not_found() {
    let h = open_harness();
    let response = h.app.oneshot(request(Method::GET, "/app", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_without_tenant_is_rejected() {
    let h = open_harness();
    let response = h
        .app
        .oneshot(request(Method::POST, "/", LINE_ONE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let h = open_harness();
    let put = h
        .app
        .clone()
        .oneshot(request(Method::PUT, "/app", LINE_ONE))
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::BAD_REQUEST);

    let delete = h
        .app
        .oneshot(request(Method::DELETE, "/", ""))
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_credentials_are_forbidden() {
    let h = harness(
        Credentials::new("drain", "SECRET"),
        MessageFormat::Text,
        false,
    );

    let mut missing = request(Method::POST, "/app", LINE_ONE);
    missing.headers_mut().remove(header::AUTHORIZATION);
    let response = h.app.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut wrong = request(Method::POST, "/app", LINE_ONE);
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, basic("drain", "guess").parse().unwrap());
    let response = h.app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(h.registry.is_empty());

    let mut right = request(Method::POST, "/app", LINE_ONE);
    right
        .headers_mut()
        .insert(header::AUTHORIZATION, basic("drain", "SECRET").parse().unwrap());
    let response = h.app.oneshot(right).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_accepted_lines_are_delivered() {
    let h = harness(Credentials::default(), MessageFormat::Text, true);
    let body = format!("{}\n{}\n", LINE_ONE, LINE_TWO);

    let response = h
        .app
        .oneshot(request(Method::POST, "/my-app", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    h.registry.stop_all().await;

    let messages: Vec<String> = h
        .store
        .events("my-app")
        .into_iter()
        .map(|event| event.message)
        .collect();
    // Delivered in timestamp order with colour codes removed
    assert_eq!(
        messages,
        vec![
            "app[web.1]: Starting process".to_string(),
            "heroku[web.1]: State changed from up to down".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_json_format() {
    let h = harness(Credentials::default(), MessageFormat::Json, false);
    let line = "96 <190>1 2016-10-15T08:59:08.723822+00:00 host app web.1 - {\"level\":\"info\"}";

    let response = h
        .app
        .oneshot(request(Method::POST, "/app", line))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    h.registry.stop_all().await;
    let events = h.store.events("app");
    let value: serde_json::Value = serde_json::from_str(&events[0].message).unwrap();
    assert_eq!(value["heroku_app"], "app");
    assert_eq!(value["heroku_process"], "web.1");
    assert_eq!(value["level"], "info");
}

#[tokio::test]
async fn test_malformed_line_rejects_whole_request() {
    let h = open_harness();
    let body = format!("{}\n12 <45>1 garbage", LINE_ONE);

    let response = h
        .app
        .oneshot(request(Method::POST, "/app", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"]
        .as_str()
        .unwrap()
        .starts_with("unable to parse message"));

    // Nothing from the request was queued
    assert!(h.registry.is_empty());
    h.registry.stop_all().await;
    assert!(h.store.events("app").is_empty());
}

#[tokio::test]
async fn test_post_after_shutdown_is_unavailable() {
    let h = open_harness();
    h.registry.stop_all().await;

    let response = h
        .app
        .oneshot(request(Method::POST, "/app", LINE_ONE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_empty_post_does_not_start_a_sink() {
    let h = open_harness();

    for body in ["", "\n"] {
        let response = h
            .app
            .clone()
            .oneshot(request(Method::POST, "/app", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    assert!(h.registry.is_empty());
}
