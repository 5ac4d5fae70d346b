//! Shared application state for the router.

use std::sync::Arc;

use crate::auth::AuthConfig;
use crate::store::UserStore;
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthConfig>,
    pub users: Arc<dyn UserStore>,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(auth: AuthConfig, users: Arc<dyn UserStore>, upstream: UpstreamClient) -> Self {
        Self {
            auth: Arc::new(auth),
            users,
            upstream,
        }
    }
}
