use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::debug;

use super::request::{CacheRequest, CachedResponse};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// Fetches requests the offline cache cannot answer.
///
/// Any HTTP response, whatever its status, is `Ok`; only transport failures
/// are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, NetworkError>;
}

/// `Network` over reqwest.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, NetworkError> {
        debug!(method = %request.method, url = %request.url, "Fetching from network");
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        if let Some(ref accept) = request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
