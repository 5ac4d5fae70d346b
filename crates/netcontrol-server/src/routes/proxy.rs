//! Protected routes relayed to the device, blocking and schedule services.
//!
//! A 2xx upstream answer is passed through with its status and body. Any other
//! status is passed through with `{ success: false, message }`, using the
//! upstream's own message when it sends one. An unreachable or unconfigured
//! upstream is a 500 with the route's fallback text.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::upstream::{Forward, UpstreamReply, UpstreamService};

/// One proxied endpoint: where it goes and what to say when it fails.
#[derive(Debug, Clone, Copy)]
pub struct ProxyRoute {
    pub service: UpstreamService,
    pub path: &'static str,
    pub failure: &'static str,
}

pub const LIST_DEVICES: ProxyRoute = ProxyRoute {
    service: UpstreamService::Devices,
    path: "devices",
    failure: "Failed to fetch devices",
};

pub const BLOCK_DEVICE: ProxyRoute = ProxyRoute {
    service: UpstreamService::Devices,
    path: "block-device",
    failure: "Failed to block device",
};

pub const LIST_BLOCKED_SITES: ProxyRoute = ProxyRoute {
    service: UpstreamService::Blocking,
    path: "blocked-sites",
    failure: "Failed to fetch blocked sites",
};

pub const BLOCK_SITE: ProxyRoute = ProxyRoute {
    service: UpstreamService::Blocking,
    path: "blocked-sites",
    failure: "Failed to block site",
};

pub const UNBLOCK_SITE: ProxyRoute = ProxyRoute {
    service: UpstreamService::Blocking,
    path: "blocked-sites",
    failure: "Failed to unblock site",
};

pub const LIST_SCHEDULES: ProxyRoute = ProxyRoute {
    service: UpstreamService::Schedules,
    path: "schedules",
    failure: "Failed to fetch schedules",
};

pub const SAVE_SCHEDULE: ProxyRoute = ProxyRoute {
    service: UpstreamService::Schedules,
    path: "schedules",
    failure: "Failed to save schedule",
};

// ============================================================================
// RELAY
// ============================================================================

fn relay(route: ProxyRoute, reply: UpstreamReply) -> Response {
    if reply.status.is_success() {
        let content_type = reply
            .content_type
            .unwrap_or_else(|| "application/json".to_string());
        return (reply.status, [(header::CONTENT_TYPE, content_type)], reply.body).into_response();
    }
    let message = reply.message().unwrap_or_else(|| route.failure.to_string());
    (
        reply.status,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

async fn proxy(
    state: &AppState,
    route: ProxyRoute,
    method: Method,
    headers: &HeaderMap,
    query: Vec<(&str, &str)>,
    body: Option<&Value>,
) -> ApiResult<Response> {
    let request = Forward {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        query,
        body,
    };
    match state
        .upstream
        .forward(route.service, method, route.path, request)
        .await
    {
        Ok(reply) => Ok(relay(route, reply)),
        Err(e) => {
            debug!(route = route.path, error = %e, "Proxy request failed");
            Err(ApiError::upstream(route.failure))
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn list_devices(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "List devices");
    proxy(&state, LIST_DEVICES, Method::GET, &headers, Vec::new(), None).await
}

pub async fn block_device(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "Change device state");
    proxy(&state, BLOCK_DEVICE, Method::POST, &headers, Vec::new(), Some(&body)).await
}

pub async fn list_blocked_sites(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "List blocked sites");
    proxy(&state, LIST_BLOCKED_SITES, Method::GET, &headers, Vec::new(), None).await
}

pub async fn block_site(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "Block site");
    proxy(&state, BLOCK_SITE, Method::POST, &headers, Vec::new(), Some(&body)).await
}

#[derive(Debug, Deserialize)]
pub struct UnblockQuery {
    #[serde(default)]
    pub url: Option<String>,
}

pub async fn unblock_site(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Query(query): Query<UnblockQuery>,
) -> ApiResult<Response> {
    let Some(url) = query.url.filter(|u| !u.is_empty()) else {
        return Err(ApiError::missing_field("url is required"));
    };
    debug!(user_id = %user.user_id, url = %url, "Unblock site");
    proxy(
        &state,
        UNBLOCK_SITE,
        Method::DELETE,
        &headers,
        vec![("url", url.as_str())],
        None,
    )
    .await
}

pub async fn list_schedules(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "List schedules");
    proxy(&state, LIST_SCHEDULES, Method::GET, &headers, Vec::new(), None).await
}

pub async fn save_schedule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    debug!(user_id = %user.user_id, "Save schedule");
    proxy(&state, SAVE_SCHEDULE, Method::POST, &headers, Vec::new(), Some(&body)).await
}

/// Routes under `/api` that require a bearer token. The caller layers
/// `auth_middleware` on top.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/block-device", post(block_device))
        .route(
            "/blocked-sites",
            get(list_blocked_sites).post(block_site).delete(unblock_site),
        )
        .route("/schedules", get(list_schedules).post(save_schedule))
}
