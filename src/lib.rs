//! Daygate - Daily Request Quota Guard
//!
//! This crate caps the number of requests a single client may issue per
//! calendar day. It sits in front of a reverse proxy or API gateway, either
//! as an axum middleware layer or as a standalone forward-auth service, and
//! reports the remaining quota through `X-RateLimit-*` headers.

pub mod config;
pub mod error;
pub mod gateway;
pub mod ratelimit;
