//! HTTP access to the netcontrol server.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, ErrorBody};
