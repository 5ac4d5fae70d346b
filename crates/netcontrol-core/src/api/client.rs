//! API client for the netcontrol backend.
//!
//! This module provides the `ApiClient` struct used for the identity endpoints
//! and for the bearer-protected device, blocked-site and schedule routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::auth::IdentityService;
use crate::models::{
    AuthResponse, BlockDeviceRequest, BlockedSite, Device, DeviceAction, LoginRequest,
    RegisterRequest, Schedule,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// After this the request is aborted and reported as a network failure.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

const REGISTER_PATH: &str = "api/auth/register";
const LOGIN_PATH: &str = "api/auth/login";
const DEVICES_PATH: &str = "api/devices";
const BLOCK_DEVICE_PATH: &str = "api/block-device";
const BLOCKED_SITES_PATH: &str = "api/blocked-sites";
const SCHEDULES_PATH: &str = "api/schedules";

/// API client for the netcontrol server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            token: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %first_line(&body), "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        debug!(method = %method, url = %url, "Sending request");
        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Mutation responses are relayed from upstream services and have no
    /// fixed shape; an empty body reads as `null`.
    async fn read_value(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send::<()>(Method::GET, self.endpoint(path)?, None).await?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self.send(Method::POST, self.endpoint(path)?, Some(body)).await?;
        Self::read_value(response).await
    }

    // ===== Identity =====

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .send(Method::POST, self.endpoint(REGISTER_PATH)?, Some(request))
            .await?;
        Self::read_json(response).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .send(Method::POST, self.endpoint(LOGIN_PATH)?, Some(request))
            .await?;
        Self::read_json(response).await
    }

    // ===== Devices =====

    pub async fn fetch_devices(&self) -> Result<Vec<Device>, ApiError> {
        self.get(DEVICES_PATH).await
    }

    pub async fn set_device_action(
        &self,
        ip: &str,
        action: DeviceAction,
    ) -> Result<serde_json::Value, ApiError> {
        let body = BlockDeviceRequest {
            ip: ip.to_string(),
            action,
        };
        self.post(BLOCK_DEVICE_PATH, &body).await
    }

    // ===== Blocked Sites =====

    pub async fn fetch_blocked_sites(&self) -> Result<Vec<BlockedSite>, ApiError> {
        self.get(BLOCKED_SITES_PATH).await
    }

    pub async fn add_blocked_site(&self, url: &str) -> Result<serde_json::Value, ApiError> {
        self.post(BLOCKED_SITES_PATH, &BlockedSite::new(url)).await
    }

    pub async fn remove_blocked_site(&self, url: &str) -> Result<serde_json::Value, ApiError> {
        let mut endpoint = self.endpoint(BLOCKED_SITES_PATH)?;
        endpoint.query_pairs_mut().append_pair("url", url);
        let response = self.send::<()>(Method::DELETE, endpoint, None).await?;
        Self::read_value(response).await
    }

    // ===== Schedules =====

    pub async fn fetch_schedules(&self) -> Result<Vec<Schedule>, ApiError> {
        self.get(SCHEDULES_PATH).await
    }

    pub async fn save_schedule(&self, schedule: &Schedule) -> Result<serde_json::Value, ApiError> {
        self.post(SCHEDULES_PATH, schedule).await
    }
}

#[async_trait]
impl IdentityService for ApiClient {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        ApiClient::register(self, request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        ApiClient::login(self, request).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Url::parse(base).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base() {
        let c = client("http://localhost:3000");
        assert_eq!(
            c.endpoint(DEVICES_PATH).unwrap().as_str(),
            "http://localhost:3000/api/devices"
        );

        let c = client("https://example.com/netcontrol");
        assert_eq!(
            c.endpoint(LOGIN_PATH).unwrap().as_str(),
            "https://example.com/netcontrol/api/auth/login"
        );
    }

    #[test]
    fn test_with_token_keeps_base() {
        let c = client("http://localhost:3000/").with_token("t".to_string());
        assert_eq!(c.token.as_deref(), Some("t"));
        assert_eq!(c.base_url().as_str(), "http://localhost:3000/");
    }
}
