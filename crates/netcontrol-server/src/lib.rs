//! REST backend for netcontrol.
//!
//! Issues and verifies bearer tokens, stores accounts, relays the device,
//! blocked-site and schedule calls to their upstream services, and serves the
//! static app shell.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod upstream;

use std::path::Path;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use auth::AuthConfig;
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthContext, AuthMiddlewareState, AuthUser};
pub use state::AppState;
pub use store::{FileUserStore, MemoryUserStore, StoreError, UserRecord, UserStore};
pub use upstream::{UpstreamClient, UpstreamService};

/// Build the application router.
///
/// When `public_dir` is given, requests that match no API route are served
/// from it.
pub fn create_router(state: AppState, public_dir: Option<&Path>) -> Router {
    let protected = routes::proxy::create_router().route_layer(from_fn_with_state(
        AuthMiddlewareState::new(state.auth.clone()),
        auth_middleware,
    ));

    let api = Router::new()
        .nest("/auth", routes::auth::create_router())
        .merge(protected);

    let mut router = Router::new().nest("/api", api).with_state(state);

    if let Some(dir) = public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http())
}
