//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::auth::AuthConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_PUBLIC_DIR: &str = "./public";

/// Upstream calls give up after this many seconds.
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Base URLs of the services behind the proxy routes. Unset means the
/// corresponding routes answer 500.
#[derive(Debug, Clone, Default)]
pub struct UpstreamUrls {
    pub devices: Option<Url>,
    pub blocking: Option<Url>,
    pub schedules: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub upstreams: UpstreamUrls,
    pub upstream_timeout: Duration,
    pub auth: AuthConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_url(name: &str) -> Result<Option<Url>> {
    env_var(name)
        .map(|raw| Url::parse(&raw).with_context(|| format!("{} is not a valid URL: {}", name, raw)))
        .transpose()
}

impl ServerConfig {
    /// # Environment Variables
    /// - `PORT` (3000) and `BIND_ADDR` (0.0.0.0)
    /// - `DATA_DIR` (`./data`): where the account document lives
    /// - `PUBLIC_DIR` (`./public`): static app shell
    /// - `LOG_DIR`: enables a daily log file when set
    /// - `DEVICES_API_URL`, `BLOCKING_API_URL`, `SCHEDULES_API_URL`
    /// - `UPSTREAM_TIMEOUT_SECS` (10)
    /// - `JWT_SECRET`, `JWT_EXPIRATION_SECS`: see `AuthConfig::from_env`
    pub fn from_env() -> Result<Self> {
        let port = match env_var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port: {}", raw))?,
            None => DEFAULT_PORT,
        };
        let host = env_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = resolve_bind_addr(&host, port)?;

        let upstream_timeout_secs = match env_var("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("UPSTREAM_TIMEOUT_SECS is not a number: {}", raw))?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            data_dir: env_var("DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            public_dir: env_var("PUBLIC_DIR")
                .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string())
                .into(),
            log_dir: env_var("LOG_DIR").map(PathBuf::from),
            upstreams: UpstreamUrls {
                devices: env_url("DEVICES_API_URL")?,
                blocking: env_url("BLOCKING_API_URL")?,
                schedules: env_url("SCHEDULES_API_URL")?,
            },
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
            auth: AuthConfig::from_env(),
        })
    }
}

/// Combine host and port into a socket address. `localhost` is accepted as an
/// alias for the IPv4 loopback.
pub fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let host = if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        host
    };
    let ip = host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("BIND_ADDR is not an IP address: {}", host))?;
    Ok(SocketAddr::new(ip, port))
}
