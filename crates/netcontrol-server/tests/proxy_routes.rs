use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Query,
    http::{header, HeaderMap, Request, StatusCode},
    routing::get,
    Json, Router,
};
use netcontrol_core::clock::FixedClock;
use netcontrol_server::{
    auth::issue_token, config::UpstreamUrls, create_router, AppState, AuthConfig,
    MemoryUserStore, UpstreamClient,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

const NOW: i64 = 1_704_067_200;

fn auth_config(now: i64) -> AuthConfig {
    AuthConfig::new("proxy-test-secret-0123456789abcdef").with_clock(Arc::new(FixedClock(now)))
}

fn auth_header(headers: &HeaderMap) -> Value {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

/// Fake device/blocking/schedule service on an ephemeral port.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/devices",
            get(|headers: HeaderMap| async move {
                Json(json!([
                    { "name": "PC-Juan", "ip": "192.168.1.10", "status": "connected" },
                    { "ip": "192.168.1.12", "status": "blocked", "auth": auth_header(&headers) }
                ]))
            }),
        )
        .route(
            "/block-device",
            axum::routing::post(|Json(body): Json<Value>| async move {
                if body["ip"] == "10.0.0.99" {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "message": "Device not found" })),
                    );
                }
                (StatusCode::OK, Json(json!({ "ok": true, "echo": body })))
            }),
        )
        .route(
            "/blocked-sites",
            get(|| async { Json(json!([{ "url": "facebook.com" }])) }).delete(
                |Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({ "removed": q.get("url") }))
                },
            ),
        )
        .route(
            "/schedules",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn app(urls: UpstreamUrls) -> Router {
    let upstream = UpstreamClient::new(urls, Duration::from_secs(2)).unwrap();
    let state = AppState::new(auth_config(NOW), Arc::new(MemoryUserStore::new()), upstream);
    create_router(state, None)
}

async fn app_with_upstream() -> Router {
    let addr = spawn_upstream().await;
    let base = Url::parse(&format!("http://{}", addr)).unwrap();
    app(UpstreamUrls {
        devices: Some(base.clone()),
        blocking: Some(base.clone()),
        schedules: Some(base),
    })
}

fn bearer() -> String {
    format!("Bearer {}", issue_token(&auth_config(NOW), "user-42").unwrap())
}

async fn call(
    app: Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_missing_bearer_is_401() {
    let (status, body) = call(app(UpstreamUrls::default()), "GET", "/api/devices", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized access");
}

#[tokio::test]
async fn test_garbage_token_is_403() {
    let (status, body) = call(
        app(UpstreamUrls::default()),
        "GET",
        "/api/schedules",
        Some("Bearer abc.def.ghi"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_expired_token_is_403() {
    let stale = issue_token(&auth_config(NOW - 3600), "user-42").unwrap();
    let (status, _) = call(
        app(UpstreamUrls::default()),
        "GET",
        "/api/devices",
        Some(&format!("Bearer {}", stale)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_wrong_secret_is_403() {
    let foreign = AuthConfig::new("somebody-elses-secret").with_clock(Arc::new(FixedClock(NOW)));
    let token = issue_token(&foreign, "user-42").unwrap();
    let (status, _) = call(
        app(UpstreamUrls::default()),
        "GET",
        "/api/devices",
        Some(&format!("Bearer {}", token)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_devices_relayed_with_caller_authorization() {
    let auth = bearer();
    let (status, body) = call(app_with_upstream().await, "GET", "/api/devices", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "PC-Juan");
    assert_eq!(body[1]["auth"], auth.as_str());
}

#[tokio::test]
async fn test_block_device_forwards_body() {
    let (status, body) = call(
        app_with_upstream().await,
        "POST",
        "/api/block-device",
        Some(&bearer()),
        Some(json!({ "ip": "192.168.1.11", "action": "block" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["echo"]["ip"], "192.168.1.11");
}

#[tokio::test]
async fn test_upstream_error_status_and_message_relayed() {
    let (status, body) = call(
        app_with_upstream().await,
        "POST",
        "/api/block-device",
        Some(&bearer()),
        Some(json!({ "ip": "10.0.0.99", "action": "block" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Device not found");
}

#[tokio::test]
async fn test_upstream_error_without_message_uses_route_text() {
    let (status, body) = call(app_with_upstream().await, "GET", "/api/schedules", Some(&bearer()), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Failed to fetch schedules");
}

#[tokio::test]
async fn test_unblock_forwards_url_query() {
    let (status, body) = call(
        app_with_upstream().await,
        "DELETE",
        "/api/blocked-sites?url=twitter.com",
        Some(&bearer()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], "twitter.com");
}

#[tokio::test]
async fn test_unconfigured_upstream_is_500() {
    let (status, body) = call(app(UpstreamUrls::default()), "GET", "/api/blocked-sites", Some(&bearer()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to fetch blocked sites");
}

#[tokio::test]
async fn test_unreachable_upstream_is_500() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dead = Url::parse(&format!("http://{}", addr)).unwrap();
    let (status, body) = call(
        app(UpstreamUrls {
            schedules: Some(dead),
            ..Default::default()
        }),
        "POST",
        "/api/schedules",
        Some(&bearer()),
        Some(json!({ "startTime": "21:00", "endTime": "07:00", "action": "block" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to save schedule");
}
