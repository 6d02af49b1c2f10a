use std::time::Duration;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use httpmock::{Mock, MockServer};
use purger::application::operators::{OperatorDirectory, OperatorKey, hash_key};
use purger::infra::http::{ApiState, build_router};
use purger::purge::{PERMISSION_ERROR_MESSAGE, PURGE_SUCCESS_MESSAGE, PurgeConfig};
use purger_api_types::{HookAcceptedResponse, NonceResponse, PurgeAllResponse};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;
use url::Url;

const OPS_KEY: &str = "ops-secret-key";
const SUPPORT_KEY: &str = "support-secret-key";

fn app(server: &MockServer) -> Router {
    let config = PurgeConfig {
        endpoint: Some(Url::parse(&server.base_url()).expect("mock url")),
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let operators = OperatorDirectory::new(vec![
        OperatorKey {
            name: "ops".to_string(),
            key_sha256: hash_key(OPS_KEY),
            manage: true,
        },
        OperatorKey {
            name: "support".to_string(),
            key_sha256: hash_key(SUPPORT_KEY),
            manage: false,
        },
    ]);
    let state = ApiState::new(config, operators, Duration::from_secs(60), None)
        .expect("state builds");
    build_router(state)
}

fn post_json(path: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::HOST, "shop.example.com")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    (status, body)
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).expect("json body")
}

async fn issue_nonce(app: &Router, key: &str) -> String {
    let (status, body) = send(app, post_json("/api/v1/nonces", Some(key), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    parse::<NonceResponse>(&body).nonce
}

async fn wait_for_calls(mock: &Mock<'_>, expected: usize) {
    for _ in 0..100 {
        if mock.calls_async().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("upstream never received {expected} purge request(s)");
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let server = MockServer::start_async().await;
    let app = app(&server);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request builds");
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn api_rejects_missing_or_unknown_keys() {
    let server = MockServer::start_async().await;
    let app = app(&server);

    let (status, body) = send(&app, post_json("/api/v1/nonces", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!parse::<PurgeAllResponse>(&body).ok);

    let (status, _) = send(
        &app,
        post_json("/api/v1/purge-all", Some("guess"), json!({"nonce": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn manual_purge_with_fresh_nonce_succeeds_once() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/purge/*")
                .header("host", "shop.example.com");
            then.status(200);
        })
        .await;
    let app = app(&server);

    let nonce = issue_nonce(&app, OPS_KEY).await;
    let (status, body) = send(
        &app,
        post_json("/api/v1/purge-all", Some(OPS_KEY), json!({"nonce": nonce})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        parse::<PurgeAllResponse>(&body),
        PurgeAllResponse {
            ok: true,
            message: PURGE_SUCCESS_MESSAGE.to_string(),
        }
    );

    let (status, body) = send(
        &app,
        post_json("/api/v1/purge-all", Some(OPS_KEY), json!({"nonce": nonce})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        parse::<PurgeAllResponse>(&body).message,
        PERMISSION_ERROR_MESSAGE
    );

    mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn operator_without_manage_permission_cannot_purge() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET");
            then.status(200);
        })
        .await;
    let app = app(&server);

    let nonce = issue_nonce(&app, SUPPORT_KEY).await;
    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/purge-all",
            Some(SUPPORT_KEY),
            json!({"nonce": nonce}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!parse::<PurgeAllResponse>(&body).ok);
    mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn nonce_issued_to_another_operator_is_rejected() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET");
            then.status(200);
        })
        .await;
    let app = app(&server);

    let nonce = issue_nonce(&app, SUPPORT_KEY).await;
    let (status, _) = send(
        &app,
        post_json("/api/v1/purge-all", Some(OPS_KEY), json!({"nonce": nonce})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn upstream_failure_is_reported_as_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/purge/*");
            then.status(500).body("purge module missing");
        })
        .await;
    let app = app(&server);

    let nonce = issue_nonce(&app, OPS_KEY).await;
    let (status, body) = send(
        &app,
        post_json("/api/v1/purge-all", Some(OPS_KEY), json!({"nonce": nonce})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let response = parse::<PurgeAllResponse>(&body);
    assert!(!response.ok);
    assert_eq!(
        response.message,
        "Error purging cache. Check server logs. HTTP error: 500 - purge module missing"
    );
}

#[tokio::test]
async fn malformed_purge_body_is_a_bad_request() {
    let server = MockServer::start_async().await;
    let app = app(&server);

    let (status, body) = send(
        &app,
        post_json("/api/v1/purge-all", Some(OPS_KEY), json!({"token": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!parse::<PurgeAllResponse>(&body).ok);
}

#[tokio::test]
async fn entity_hook_purges_only_published_content() {
    let server = MockServer::start_async().await;
    let published = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/purge/blog/hello/")
                .header("host", "example.com");
            then.status(200);
        })
        .await;
    let draft = server
        .mock_async(|when, then| {
            when.method("GET").path("/purge/blog/draft/");
            then.status(200);
        })
        .await;
    let app = app(&server);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/hooks/entity-saved",
            Some(SUPPORT_KEY),
            json!({
                "entity_id": 7,
                "entity_type": "post",
                "status": "draft",
                "canonical_url": "https://example.com/blog/draft/",
                "host": "example.com"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        parse::<HookAcceptedResponse>(&body),
        HookAcceptedResponse { accepted: true }
    );

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/hooks/entity-saved",
            Some(SUPPORT_KEY),
            json!({
                "entity_id": 42,
                "entity_type": "post",
                "status": "publish",
                "canonical_url": "https://example.com/blog/hello/?utm_source=feed",
                "host": "example.com"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_calls(&published, 1).await;
    draft.assert_calls_async(0).await;
}

#[tokio::test]
async fn term_hook_falls_back_to_request_host() {
    let server = MockServer::start_async().await;
    let watched = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/purge/product-category/shoes/")
                .header("host", "shop.example.com");
            then.status(200);
        })
        .await;
    let unwatched = server
        .mock_async(|when, then| {
            when.method("GET").path("/purge/tag/news/");
            then.status(200);
        })
        .await;
    let app = app(&server);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/hooks/term-changed",
            Some(SUPPORT_KEY),
            json!({
                "term_id": 3,
                "taxonomy": "post_tag",
                "action": "edit",
                "canonical_url": "https://shop.example.com/tag/news/"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/hooks/term-changed",
            Some(SUPPORT_KEY),
            json!({
                "term_id": 9,
                "taxonomy": "product_cat",
                "action": "delete",
                "canonical_url": "/product-category/shoes/"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_calls(&watched, 1).await;
    unwatched.assert_calls_async(0).await;
}
