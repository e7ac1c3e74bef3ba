//! Integration tests for the entity API client: auth headers, status
//! handling and body decoding against a wiremock server.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modelsetup_client::{ApiAuth, ApiClient, ApiError, EntityApi, HttpMethod};

/// Helper: create an `ApiClient` pointing at a wiremock server with Bearer auth.
fn bearer_client(server: &MockServer) -> ApiClient {
    ApiClient::with_http_client(
        server.uri(),
        ApiAuth::bearer("test-token-123"),
        reqwest::Client::new(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// Authentication
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/acme"))
        .and(header("Authorization", "Bearer test-token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "acme"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let response = client.get("/accounts/acme").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json_value().unwrap()["name"], "acme");
}

#[tokio::test]
async fn test_custom_token_header_sends_raw_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("X-Session-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::with_http_client(
        server.uri(),
        ApiAuth::new(Some("abc".into()), "X-Session-Token"),
        reqwest::Client::new(),
    );
    assert!(client.get("/me").await.unwrap().is_success());
}

#[tokio::test]
async fn test_pushed_token_is_used_until_popped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/whoami"))
        .and(header("Authorization", "Bearer delegate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("delegate"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/whoami"))
        .and(header("Authorization", "Bearer test-token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("admin"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = bearer_client(&server);
    client.push_token("delegate");
    let first = client.get("/whoami").await.unwrap();
    client.pop_token();
    let second = client.get("/whoami").await.unwrap();

    assert_eq!(first.body.as_deref(), Some("delegate"));
    assert_eq!(second.body.as_deref(), Some("admin"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Status handling
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_get_returns_not_found_without_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let response = client.get("/accounts/missing").await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_fetch_fails_on_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let err = client.fetch("/accounts/missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_put_sends_json_and_decodes_response() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/accounts/acme"))
        .and(body_json(json!({"name": "acme"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"uuid": "u1", "name": "acme"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let created = client
        .put("/accounts/acme", &json!({"name": "acme"}))
        .await
        .unwrap();

    assert_eq!(created["uuid"], "u1");
}

#[tokio::test]
async fn test_post_with_empty_body_decodes_as_null() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let created = client.post("/accounts", &json!({"name": "x"})).await.unwrap();
    assert!(created.is_null());
}

#[tokio::test]
async fn test_put_validation_failure_is_typed() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/accounts/acme"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!([{"messageTemplate": "err.name.notUnique"}])),
        )
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let err = client
        .put("/accounts/acme", &json!({"name": "acme"}))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    let response = err.response().expect("response attached");
    assert!(response.body_or_empty().contains("notUnique"));
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let err = client.post("/accounts", &json!({})).await.unwrap_err();

    match err {
        ApiError::Http {
            method, response, ..
        } => {
            assert_eq!(method, HttpMethod::Post);
            assert_eq!(response.status, 500);
        }
        other => panic!("Expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_rejects_non_write_methods() {
    let server = MockServer::start().await;
    let client = bearer_client(&server);

    let err = client
        .send(HttpMethod::Delete, "/accounts/acme", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UnsupportedMethod(HttpMethod::Delete)));
}

#[tokio::test]
async fn test_location_header_is_captured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/redirected"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", "/accounts/u1"))
        .mount(&server)
        .await;

    let client = bearer_client(&server);
    let response = client.get("/redirected").await.unwrap();
    assert_eq!(response.location.as_deref(), Some("/accounts/u1"));
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // Nothing listens on port 9 (discard) on test hosts.
    let client = ApiClient::with_http_client(
        "http://127.0.0.1:9",
        ApiAuth::default(),
        reqwest::Client::new(),
    );
    let err = client.get("/anything").await.unwrap_err();
    assert!(matches!(err, ApiError::Transport { .. }));
}
