use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use daygate::config::DaygateConfig;
use daygate::gateway::GatewayServer;
use daygate::ratelimit::{spawn_sweeper, RateLimiter, SystemClock};

/// Per-client daily request quota guard.
#[derive(Parser, Debug)]
#[command(name = "daygate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the daily request limit
    #[arg(long)]
    daily_limit: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_format);

    info!("Starting Daygate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = DaygateConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.listen, args.daily_limit)?;
    let client_ip_header = config.rate_limiting.client_ip_header()?;

    info!(
        listen_addr = %config.server.listen_addr,
        daily_limit = config.rate_limiting.daily_limit,
        time_zone = ?config.rate_limiting.time_zone,
        client_ip_header = ?client_ip_header,
        "Configuration loaded"
    );

    let clock = Arc::new(SystemClock::new(config.rate_limiting.time_zone));
    let rate_limiter = Arc::new(RateLimiter::with_clock(
        config.rate_limiting.daily_limit,
        clock,
    ));

    let sweeper = config
        .rate_limiting
        .sweep_interval()
        .map(|interval| spawn_sweeper(rate_limiter.clone(), interval))
        .transpose()?;

    let mut server = GatewayServer::new(
        config.server.listen_addr,
        rate_limiter,
        config.rate_limiting.unknown_client.as_str(),
    );
    if let Some(header) = client_ip_header {
        server = server.with_client_ip_header(header);
    }

    server
        .serve_with_shutdown(shutdown_signal(config.server.listen_addr))
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Daygate stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolve on Ctrl+C or SIGTERM, whichever arrives first.
///
/// A signal handler that fails to install is logged and never fires.
async fn shutdown_signal(listen_addr: SocketAddr) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };

    info!(
        signal = received,
        listen_addr = %listen_addr,
        "Draining forward-auth listener"
    );
}
