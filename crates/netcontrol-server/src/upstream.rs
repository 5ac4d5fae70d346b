//! HTTP client for the device, blocking and schedule services behind the
//! proxy routes.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::UpstreamUrls;

/// Which upstream service a route talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    Devices,
    Blocking,
    Schedules,
}

impl UpstreamService {
    pub fn env_var(&self) -> &'static str {
        match self {
            UpstreamService::Devices => "DEVICES_API_URL",
            UpstreamService::Blocking => "BLOCKING_API_URL",
            UpstreamService::Schedules => "SCHEDULES_API_URL",
        }
    }
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Status and raw body of an upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamReply {
    /// The `message` field of a JSON error body, if there is one.
    pub fn message(&self) -> Option<String> {
        serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }
}

/// One outgoing request.
#[derive(Debug, Default)]
pub struct Forward<'a> {
    pub authorization: Option<&'a str>,
    pub query: Vec<(&'a str, &'a str)>,
    pub body: Option<&'a serde_json::Value>,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    urls: UpstreamUrls,
}

impl UpstreamClient {
    pub fn new(urls: UpstreamUrls, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, urls })
    }

    fn base(&self, service: UpstreamService) -> Option<&Url> {
        match service {
            UpstreamService::Devices => self.urls.devices.as_ref(),
            UpstreamService::Blocking => self.urls.blocking.as_ref(),
            UpstreamService::Schedules => self.urls.schedules.as_ref(),
        }
    }

    /// `<base>/<path>`, keeping any path prefix the base carries.
    pub fn endpoint(&self, service: UpstreamService, path: &str) -> Result<Url, UpstreamError> {
        let base = self
            .base(service)
            .ok_or(UpstreamError::NotConfigured(service.env_var()))?;
        let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&joined)?)
    }

    /// Send a request upstream with the caller's Authorization header.
    ///
    /// Any HTTP response, including error statuses, is `Ok`; only transport
    /// failures and missing configuration are errors.
    pub async fn forward(
        &self,
        service: UpstreamService,
        method: Method,
        path: &str,
        request: Forward<'_>,
    ) -> Result<UpstreamReply, UpstreamError> {
        let mut url = self.endpoint(service, path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        debug!(method = %method, url = %url, "Forwarding upstream");

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(auth) = request.authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "Upstream unreachable");
            UpstreamError::Transport(e)
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        if !status.is_success() {
            warn!(method = %method, url = %url, status = %status, "Upstream returned an error");
        }
        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}
