use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSite {
    pub url: String,
}

impl BlockedSite {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
