//! HTTP contract tests against an in-memory transport.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use service_gateway::config::GatewayConfig;
use service_gateway::gateway::GatewayService;
use service_gateway::http::HttpServer;
use service_gateway::lifecycle::Shutdown;
use service_gateway::transport::MemoryTransport;

struct Harness {
    base_url: String,
    transport: Arc<MemoryTransport>,
    shutdown: Shutdown,
}

impl Harness {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn serve(transport: MemoryTransport, config: GatewayConfig) -> Harness {
    let transport = Arc::new(transport);
    let gateway = Arc::new(GatewayService::new(transport.clone(), &config));
    let server = HttpServer::new(&config, gateway);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    Harness {
        base_url: format!("http://{}", addr),
        transport,
        shutdown,
    }
}

async fn post(harness: &Harness, path: &str, body: Value) -> (StatusCode, Value) {
    let res = reqwest::Client::new()
        .post(harness.url(path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_fixture_user_is_deterministic() {
    let harness = serve(MemoryTransport::disconnected(), GatewayConfig::default()).await;

    for _ in 0..3 {
        let res = reqwest::get(harness.url("/gateway/users/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({"id": 1, "name": "Test User", "email": "test@example.com"}));
    }
    assert_eq!(harness.transport.call_count(), 0);
}

#[tokio::test]
async fn test_user_lookup_unavailable_without_link() {
    let harness = serve(MemoryTransport::disconnected(), GatewayConfig::default()).await;

    let res = reqwest::get(harness.url("/gateway/users/2")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"statusCode": 503, "message": "Service Unavailable"}));
}

#[tokio::test]
async fn test_user_lookup_times_out_within_deadline() {
    let mut config = GatewayConfig::default();
    config.timeouts.call_ms = 300;
    let harness = serve(MemoryTransport::unresponsive(), config).await;

    let start = Instant::now();
    let res = reqwest::get(harness.url("/gateway/users/timeout")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(elapsed >= Duration::from_millis(300), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2000), "returned late: {:?}", elapsed);
}

#[tokio::test]
async fn test_user_lookup_passthrough() {
    let transport = MemoryTransport::with_responder(|_, data| {
        Ok(json!({"id": data["userId"], "name": "Remote User"}))
    });
    let harness = serve(transport, GatewayConfig::default()).await;

    let body: Value = reqwest::get(harness.url("/gateway/users/7"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"id": "7", "name": "Remote User"}));
    assert_eq!(
        harness.transport.sent(),
        vec![(r#"{"cmd":"get_user_by_id"}"#.to_string(), json!({"userId": "7"}))]
    );
}

#[tokio::test]
async fn test_empty_event_is_created() {
    let harness = serve(MemoryTransport::new(), GatewayConfig::default()).await;

    let (status, body) = post(&harness, "/gateway/events", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Event dispatched");
    let ts = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    assert_eq!(harness.transport.emitted(), vec![("user_event".to_string(), json!({}))]);
}

#[tokio::test]
async fn test_event_refused_without_link() {
    let harness = serve(MemoryTransport::disconnected(), GatewayConfig::default()).await;

    let (status, body) = post(&harness, "/gateway/events", json!({"type": "login"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to process event");
}

#[tokio::test]
async fn test_message_fixture_skips_transport() {
    let harness = serve(MemoryTransport::new(), GatewayConfig::default()).await;

    let (status, body) = post(
        &harness,
        "/gateway/message",
        json!({"pattern": "get_data", "data": {"key": "test"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"key": "test", "value": "test_value"}));
    assert_eq!(harness.transport.call_count(), 0);
}

#[tokio::test]
async fn test_message_validation_names_fields() {
    let harness = serve(MemoryTransport::new(), GatewayConfig::default()).await;

    let cases = [
        (json!({"data": {"key": "test"}}), "pattern"),
        (json!({"pattern": "get_data"}), "data"),
        (json!({"pattern": "get_data", "data": "not an object"}), "object"),
        (json!({}), "pattern"),
    ];

    for (body, needle) in cases {
        let (status, res) = post(&harness, "/gateway/message", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(res["error"], "Bad Request");
        let messages = res["message"].as_array().unwrap();
        assert!(
            messages.iter().any(|m| m.as_str().unwrap().contains(needle)),
            "{:?} should mention {}",
            messages,
            needle
        );
    }
    assert_eq!(harness.transport.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_pattern_is_processing_error() {
    let harness = serve(MemoryTransport::new(), GatewayConfig::default()).await;

    let (status, body) = post(
        &harness,
        "/gateway/message",
        json!({"pattern": "unknown_pattern", "data": {"test": true}}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Processing Error");
    assert_eq!(harness.transport.call_count(), 0);
}

#[tokio::test]
async fn test_routed_failure_is_processing_error() {
    let harness = serve(MemoryTransport::disconnected(), GatewayConfig::default()).await;

    let (status, body) = post(
        &harness,
        "/gateway/message",
        json!({"pattern": "compute", "data": {"n": 1}}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"statusCode": 500, "message": "Processing Error"}));
}

#[tokio::test]
async fn test_open_circuit_fails_fast() {
    let mut config = GatewayConfig::default();
    config.timeouts.call_ms = 1000;
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.recovery_secs = 60;
    let harness = serve(MemoryTransport::unresponsive(), config).await;

    for _ in 0..2 {
        let res = reqwest::get(harness.url("/gateway/users/9")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(harness.transport.call_count(), 2);

    let start = Instant::now();
    let res = reqwest::get(harness.url("/gateway/users/9")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(harness.transport.call_count(), 2);

    let health: Value = reqwest::get(harness.url("/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["circuit"], "open");
}
