//! Bearer-token middleware for the protected `/api` routes.
//!
//! - no `Authorization: Bearer <token>` header: 401
//! - a token that fails verification: 403
//! - otherwise the verified `AuthContext` is put in the request extensions
//!   for handlers to pick up with `AuthUser`

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use netcontrol_core::auth::Claims;
use tracing::debug;

use crate::auth::{verify_token, AuthConfig};
use crate::error::ApiError;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: Arc<AuthConfig>) -> Self {
        Self { auth_config }
    }
}

/// Identity of the caller, attached by `auth_middleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub claims: Claims,
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let Some(token) = bearer_token(&request) else {
        debug!(path = %request.uri().path(), "Request without bearer token");
        return Err(AuthMiddlewareError(ApiError::unauthorized()));
    };

    let claims = verify_token(&state.auth_config, token).map_err(AuthMiddlewareError)?;

    request.extensions_mut().insert(AuthContext {
        user_id: claims.sub.clone(),
        claims,
    });
    Ok(next.run(request).await)
}

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<ApiError> for AuthMiddlewareError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Handler argument carrying the caller's `AuthContext`.
///
/// Only valid behind `auth_middleware`; elsewhere it rejects with 500.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext missing; auth_middleware is not applied to this route",
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use netcontrol_core::clock::FixedClock;
    use tower::ServiceExt;

    const NOW: i64 = 1_704_067_200;

    fn config(now: i64) -> Arc<AuthConfig> {
        Arc::new(AuthConfig::new("middleware-test-secret").with_clock(Arc::new(FixedClock(now))))
    }

    async fn whoami(AuthUser(ctx): AuthUser) -> String {
        ctx.user_id
    }

    fn app(config: Arc<AuthConfig>) -> Router {
        Router::new().route("/me", get(whoami)).layer(middleware::from_fn_with_state(
            AuthMiddlewareState::new(config),
            auth_middleware,
        ))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let (status, body) = call(app(config(NOW)), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Unauthorized access"));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_401() {
        let (status, _) = call(app(config(NOW)), Some("Basic YWxhZGRpbjpvcGVu")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_token_is_403() {
        let (status, body) = call(app(config(NOW)), Some("Bearer nonsense")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_expired_token_is_403() {
        let token = issue_token(&config(NOW - 7200), "user-7").unwrap();
        let (status, _) = call(app(config(NOW)), Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let cfg = config(NOW);
        let token = issue_token(&cfg, "user-7").unwrap();
        let (status, body) = call(app(cfg), Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user-7");
    }
}
