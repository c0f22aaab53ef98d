//! Daily quota filter stage for axum routers.
//!
//! Runs before any handler: denied requests are answered with
//! `429 Too Many Requests` and never reach the inner service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::ratelimit::{Decision, RateLimiter};

/// Header carrying the daily limit.
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the admissions left today.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Shared state for [`daily_limit_middleware`].
#[derive(Clone)]
pub struct FilterState {
    limiter: Arc<RateLimiter>,
    unknown_client: Arc<str>,
    client_ip_header: Option<HeaderName>,
}

impl FilterState {
    /// Create filter state around a shared limiter.
    ///
    /// `unknown_client` is the identity charged for requests with no peer address.
    pub fn new(limiter: Arc<RateLimiter>, unknown_client: impl Into<Arc<str>>) -> Self {
        Self {
            limiter,
            unknown_client: unknown_client.into(),
            client_ip_header: None,
        }
    }

    /// Take the client address from `header` when a proxy sets it.
    ///
    /// Comma-separated values (`X-Forwarded-For`) use the first hop.
    pub fn with_client_ip_header(mut self, header: HeaderName) -> Self {
        self.client_ip_header = Some(header);
        self
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

/// Charge the request against its client's daily quota.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn daily_limit_middleware(
    State(state): State<FilterState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_identity(&request, &state);
    let decision = state.limiter.check_and_increment(&client);

    if !decision.is_admitted() {
        warn!(
            client = %client,
            limit = decision.limit,
            "Daily rate limit exceeded"
        );
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    info!(
        client = %client,
        count = decision.limit - decision.remaining,
        remaining = decision.remaining,
        "Request admitted"
    );

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

/// Resolve the client: forwarded header first, then peer IP, then the sentinel.
fn client_identity(request: &Request, state: &FilterState) -> String {
    if let Some(client) = state
        .client_ip_header
        .as_ref()
        .and_then(|name| forwarded_client(request.headers(), name))
    {
        return client;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| state.unknown_client.to_string())
}

fn forwarded_client(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(decision.remaining),
    );
}
