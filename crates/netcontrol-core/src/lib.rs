//! Core library for netcontrol.
//!
//! Shared by the terminal client and the REST server:
//!
//! - `auth`: client session manager, credential storage, route guard
//! - `api`: HTTP client for the netcontrol backend
//! - `dashboard`: device / blocked-site / schedule state and its data sources
//! - `offline`: versioned offline asset cache with a cache-first fetch policy
//! - `models`: wire types shared with the server

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod offline;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionError, SessionManager};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use dashboard::Dashboard;
