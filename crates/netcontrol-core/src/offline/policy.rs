//! Which URLs the offline worker may serve from cache or store.

use url::Url;

/// Cacheability rules for one page origin.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    page_host: String,
    allow_list: Vec<String>,
}

impl CachePolicy {
    pub fn new(page_host: impl Into<String>, allow_list: Vec<String>) -> Self {
        Self {
            page_host: page_host.into(),
            allow_list,
        }
    }

    pub fn page_host(&self) -> &str {
        &self.page_host
    }

    fn is_allow_listed(&self, host: &str) -> bool {
        self.allow_list.iter().any(|allowed| allowed == host)
    }

    /// Neither the page host nor an allow-listed host.
    pub fn is_external(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        host != self.page_host && !self.is_allow_listed(host)
    }

    /// HTTP(S) on the page host or an allow-listed host.
    pub fn should_cache(&self, url: &Url) -> bool {
        is_http(url) && !self.is_external(url)
    }
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
