//! Forward-auth HTTP server.
//!
//! A proxy calls this server once per inbound request (nginx `auth_request`,
//! Traefik ForwardAuth and similar). Every path answers `200 OK` when the
//! caller is within quota and `429` otherwise, with the rate-limit headers
//! set in both cases. Behind a proxy the TCP peer is the proxy itself, so
//! configure the header carrying the original client address.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderName, StatusCode},
    middleware, Router,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::filter::{daily_limit_middleware, FilterState};
use crate::error::{DaygateError, Result};
use crate::ratelimit::RateLimiter;

/// HTTP server exposing the daily quota filter.
pub struct GatewayServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Filter state shared with every request
    state: FilterState,
}

impl GatewayServer {
    /// Create a new server around a shared rate limiter.
    pub fn new(
        addr: SocketAddr,
        rate_limiter: Arc<RateLimiter>,
        unknown_client: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            addr,
            state: FilterState::new(rate_limiter, unknown_client),
        }
    }

    /// Resolve clients from a proxy-set header such as `x-forwarded-for`.
    pub fn with_client_ip_header(mut self, header: HeaderName) -> Self {
        self.state = self.state.with_client_ip_header(header);
        self
    }

    /// Build the router: the quota filter in front of an always-OK handler.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(admitted)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                daily_limit_middleware,
            ))
    }

    /// Start the server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind listener");
            DaygateError::Io(e)
        })?;
        self.serve_listener(listener, signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        info!(
            addr = %listener.local_addr()?,
            limit = self.state.limiter().limit(),
            "Starting forward-auth server"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            DaygateError::Io(e)
        })
    }
}

async fn admitted() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn send_request(addr: SocketAddr) -> String {
        send_request_with(addr, "").await
    }

    async fn send_request_with(addr: SocketAddr, extra_headers: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET /api/orders HTTP/1.1\r\nHost: localhost\r\n{extra_headers}Connection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response.to_ascii_lowercase()
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(50));
        let _server = GatewayServer::new(addr, rate_limiter, "unknown");
    }

    #[tokio::test]
    async fn test_serves_quota_decisions_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(1));
        let server = GatewayServer::new(addr, rate_limiter.clone(), "unknown");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_listener(listener, async {
            let _ = shutdown_rx.await;
        }));

        let first = send_request(addr).await;
        assert!(first.starts_with("http/1.1 200"));
        assert!(first.contains("x-ratelimit-limit: 1"));
        assert!(first.contains("x-ratelimit-remaining: 0"));

        let second = send_request(addr).await;
        assert!(second.starts_with("http/1.1 429"));
        assert!(second.contains("x-ratelimit-remaining: 0"));

        assert_eq!(rate_limiter.counter_value("127.0.0.1"), Some(1));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_forwarded_clients_get_separate_quotas() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(1));
        let server = GatewayServer::new(addr, rate_limiter.clone(), "unknown")
            .with_client_ip_header(HeaderName::from_static("x-forwarded-for"));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_listener(listener, async {
            let _ = shutdown_rx.await;
        }));

        let a = send_request_with(addr, "X-Forwarded-For: 1.1.1.1\r\n").await;
        let b = send_request_with(addr, "X-Forwarded-For: 2.2.2.2\r\n").await;
        let a_again = send_request_with(addr, "X-Forwarded-For: 1.1.1.1\r\n").await;

        assert!(a.starts_with("http/1.1 200"));
        assert!(b.starts_with("http/1.1 200"));
        assert!(a_again.starts_with("http/1.1 429"));
        assert_eq!(rate_limiter.counter_value("127.0.0.1"), None);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
