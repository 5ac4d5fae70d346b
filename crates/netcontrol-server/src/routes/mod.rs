//! HTTP routes.
//!
//! - `/api/auth/*`: public account routes
//! - everything else under `/api`: bearer-protected proxy routes

pub mod auth;
pub mod proxy;
