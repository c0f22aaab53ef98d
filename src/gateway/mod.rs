//! HTTP gateway integration: the quota filter and a forward-auth server.

mod filter;
mod server;

pub use filter::{daily_limit_middleware, FilterState, LIMIT_HEADER, REMAINING_HEADER};
pub use server::GatewayServer;
