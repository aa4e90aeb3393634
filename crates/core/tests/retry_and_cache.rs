//! Online request paths of `ResilientClient`
//!
//! **Coverage:**
//! - Server errors retried with exponential backoff until success
//! - Retry budget bounds the number of transport calls
//! - Client errors fail fast without scheduling retries
//! - TTL cache hits and expiry
//! - Concurrent failures for one key share a single retry timer
//! - Cache persistence across client restarts

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use support::{fast_config, wait_until, yield_many, Harness, InMemoryStore, ScriptedTransport, Step};
use tether_core::{FallbackRule, FallbackTable, TransportError};
use tether_domain::{
    FailureCategory, HttpMethod, RequestOptions, ResilienceConfig, ResponseSource, TetherError,
};

/// Validates `ResilientClient::get` behavior for the transient server failure scenario.
///
/// Assertions:
/// - Confirms three transport calls for 500, 500, 200.
/// - Confirms the final payload is the 200 body.
/// - Confirms the gaps between calls follow 100 ms then 200 ms.
/// - Ensures the failure record is cleared on success.
#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_with_exponential_backoff() {
    let transport = ScriptedTransport::new()
        .respond(500, "")
        .respond(500, "")
        .respond(200, r#"{"categories":["news"]}"#);
    let h = Harness::new(transport, true);

    let response = h.client.get("/api/categories").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), r#"{"categories":["news"]}"#);
    assert_eq!(response.source, ResponseSource::Network);

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 3);
    let first_gap = calls[1].started - calls[0].started;
    let second_gap = calls[2].started - calls[1].started;
    assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(150));
    assert!(second_gap >= Duration::from_millis(200) && second_gap < Duration::from_millis(250));

    let diagnostics = h.client.diagnostics();
    assert_eq!(diagnostics.failed_request_count, 0);
    assert_eq!(diagnostics.cached_entry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_transport_calls() {
    let transport = ScriptedTransport::new().otherwise(Step::Respond(503, "busy".into()));
    let h = Harness::new(transport, true);

    let err = h.client.get("/api/categories").await.unwrap_err();
    assert_eq!(h.transport.call_count(), 4);
    match err {
        TetherError::RetryExhausted { key, attempts, last_error } => {
            assert_eq!(key, "GET /api/categories");
            assert_eq!(attempts, 4);
            assert_eq!(last_error, "HTTP 503: busy");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let diagnostics = h.client.diagnostics();
    let record = &diagnostics.errors[0];
    assert_eq!(record.category, FailureCategory::Server);
    assert_eq!(record.retry_count, 3);
    assert_eq!(record.status_code, Some(503));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fall_back_when_available() {
    let transport = ScriptedTransport::new().otherwise(Step::Respond(500, "".into()));
    let fallback = FallbackTable::new()
        .with_rule(FallbackRule::prefix("/api/articles", json!({"articles": [], "total": 0})));
    let config = ResilienceConfig { max_retries: 1, ..fast_config() };
    let h = Harness::with(transport, true, config, fallback);

    let response = h.client.get("/api/articles?page=1").await.unwrap();
    assert!(response.is_degraded());
    assert_eq!(h.transport.call_count(), 2);

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["total"], 0);
    assert!(body["message"].is_string());
}

/// Validates `ResilientClient::get` behavior for the non-retryable client error scenario.
///
/// Assertions:
/// - Confirms exactly one transport call for 404 and for 401.
/// - Ensures no retry timer is ever scheduled.
#[tokio::test(start_paused = true)]
async fn client_errors_fail_fast() {
    for status in [404u16, 401] {
        let transport = ScriptedTransport::new().respond(status, "nope");
        let h = Harness::new(transport, true);

        let err = h.client.get("/api/profile").await.unwrap_err();
        assert_eq!(err, TetherError::Client { status, message: format!("HTTP {status}: nope") });
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.client.pending_retries(), 0);

        let diagnostics = h.client.diagnostics();
        assert_eq!(diagnostics.failed_request_count, 1);
        assert!(!diagnostics.errors[0].retryable);
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_requests_are_retried() {
    let transport = ScriptedTransport::new().respond(429, "").respond(200, "ok");
    let h = Harness::new(transport, true);

    let response = h.client.get("/api/feed").await.unwrap();
    assert_eq!(response.text(), "ok");
    assert_eq!(h.transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn connect_failures_are_retried_as_network_errors() {
    let transport = ScriptedTransport::new()
        .fail(TransportError::connect("connection refused"))
        .respond(200, "ok");
    let h = Harness::new(transport, true);

    assert_eq!(h.client.get("/api/feed").await.unwrap().text(), "ok");
    assert_eq!(h.transport.call_count(), 2);
}

/// Validates the response cache for the TTL window scenario.
///
/// Assertions:
/// - Confirms a read at t=3000 is served from cache without a call.
/// - Confirms a read at t=6000 triggers exactly one new call.
#[tokio::test(start_paused = true)]
async fn cached_reads_respect_ttl() {
    let transport = ScriptedTransport::new().respond(200, "v1").respond(200, "v2");
    let h = Harness::new(transport, true);

    assert_eq!(h.client.get("/api/categories").await.unwrap().text(), "v1");
    assert_eq!(h.transport.call_count(), 1);

    h.clock.set_millis(3_000);
    let cached = h.client.get("/api/categories").await.unwrap();
    assert_eq!(cached.source, ResponseSource::Cache);
    assert_eq!(cached.text(), "v1");
    assert_eq!(h.transport.call_count(), 1);

    h.clock.set_millis(6_000);
    let fresh = h.client.get("/api/categories").await.unwrap();
    assert_eq!(fresh.text(), "v2");
    assert_eq!(h.transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn mutating_requests_bypass_the_cache() {
    let transport = ScriptedTransport::new();
    let h = Harness::new(transport, true);

    for _ in 0..2 {
        h.client
            .execute("/api/order", RequestOptions::new().method(HttpMethod::Post).body("{}"))
            .await
            .unwrap();
    }
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.client.diagnostics().cached_entry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn request_headers_and_body_pass_through() {
    let transport = ScriptedTransport::new();
    let h = Harness::new(transport, true);

    let options = RequestOptions::new()
        .method(HttpMethod::Put)
        .header("content-type", "multipart/form-data; boundary=xyz")
        .body(b"--xyz--".to_vec());
    h.client.execute("/api/upload", options).await.unwrap();

    let calls = h.transport.calls();
    let request = &calls[0].request;
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.headers.len(), 1);
    assert_eq!(request.headers["content-type"], "multipart/form-data; boundary=xyz");
    assert_eq!(request.body.as_deref(), Some(b"--xyz--".as_slice()));
}

/// Validates the retry scheduler for the overlapping failures scenario.
///
/// Assertions:
/// - Ensures two quick failures of one key leave a single pending timer.
/// - Confirms both callers receive the outcome of the surviving retry.
/// - Confirms the stale timer never reaches the transport.
#[tokio::test(start_paused = true)]
async fn overlapping_failures_share_one_retry_timer() {
    let transport = ScriptedTransport::new().respond(500, "").respond(500, "").respond(200, "ok");
    let h = Harness::new(transport, true);

    let first = tokio::spawn({
        let client = h.client.clone();
        async move { client.get("/api/categories").await }
    });
    let second = tokio::spawn({
        let client = h.client.clone();
        async move { client.get("/api/categories").await }
    });

    yield_many().await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.client.pending_retries(), 1);

    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    assert_eq!(a.unwrap().text(), "ok");
    assert_eq!(b.unwrap().text(), "ok");
    assert_eq!(h.transport.call_count(), 3);

    let record_count = h.client.diagnostics().failed_request_count;
    assert_eq!(record_count, 0);
}

#[tokio::test(start_paused = true)]
async fn cache_survives_restart_through_durable_store() {
    let store = Arc::new(InMemoryStore::default());

    let first = Harness::with_store(
        ScriptedTransport::new().respond(200, "persisted"),
        true,
        fast_config(),
        FallbackTable::new(),
        Arc::clone(&store),
    );
    first.client.start().await.unwrap();
    first.client.get("/api/categories").await.unwrap();
    first.client.shutdown().await.unwrap();
    assert!(store.raw("tether.response_cache").is_some());

    let second = Harness::with_store(
        ScriptedTransport::new(),
        true,
        fast_config(),
        FallbackTable::new(),
        Arc::clone(&store),
    );
    second.client.start().await.unwrap();
    let response = second.client.get("/api/categories").await.unwrap();
    assert_eq!(response.source, ResponseSource::Cache);
    assert_eq!(response.text(), "persisted");
    assert_eq!(second.transport.call_count(), 0);
    second.client.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn corrupt_persisted_cache_starts_empty() {
    let store = Arc::new(InMemoryStore::default());
    store.put_raw("tether.response_cache", "]]]");

    let h = Harness::with_store(
        ScriptedTransport::new(),
        true,
        fast_config(),
        FallbackTable::new(),
        store,
    );
    h.client.start().await.unwrap();
    assert_eq!(h.client.diagnostics().cached_entry_count, 0);
    h.client.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn background_flusher_persists_new_entries() {
    let h = Harness::new(ScriptedTransport::new().respond(200, "x"), true);
    h.client.start().await.unwrap();

    h.client.get("/api/categories").await.unwrap();
    wait_until(|| h.store.raw("tether.response_cache").is_some()).await;

    let blob: serde_json::Value =
        serde_json::from_str(&h.store.raw("tether.response_cache").unwrap()).unwrap();
    assert_eq!(blob["version"], 1);
    assert_eq!(blob["entries"][0]["url"], "/api/categories");
    h.client.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn clear_all_empties_every_store() {
    let transport = ScriptedTransport::new().respond(200, "x").respond(404, "");
    let h = Harness::new(transport, true);

    h.client.get("/api/a").await.unwrap();
    h.client.get("/api/b").await.unwrap_err();
    h.client.shutdown().await.unwrap();
    assert!(h.store.raw("tether.response_cache").is_some());

    h.client.clear_all().await.unwrap();
    let diagnostics = h.client.diagnostics();
    assert_eq!(diagnostics.cached_entry_count, 0);
    assert_eq!(diagnostics.failed_request_count, 0);
    assert!(h.store.raw("tether.response_cache").is_none());
}

#[tokio::test]
async fn build_requires_transport_and_valid_config() {
    let err = tether_core::ResilientClient::builder().build().err().unwrap();
    assert!(matches!(err, TetherError::Config(_)));

    let config = ResilienceConfig { retry_delay_ms: 0, ..Default::default() };
    let err = tether_core::ResilientClient::builder()
        .config(config)
        .transport(Arc::new(ScriptedTransport::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TetherError::Config(_)));
}
