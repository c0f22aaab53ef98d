//! Configuration management for Daygate.
//!
//! Settings come from an optional YAML file, overlaid with `DAYGATE__*`
//! environment variables (e.g. `DAYGATE__RATE_LIMITING__DAILY_LIMIT=100`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use axum::http::HeaderName;

use crate::error::{DaygateError, Result};
use crate::ratelimit::{DayBoundary, DEFAULT_DAILY_LIMIT};

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "DAYGATE";
/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Main configuration for the Daygate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaygateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address for the forward-auth endpoint
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Maximum admitted requests per client per calendar day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u64,

    /// Identity used for requests without a peer address.
    ///
    /// All such requests share one quota.
    #[serde(default = "default_unknown_client")]
    pub unknown_client: String,

    /// Request header carrying the original client address, e.g.
    /// `x-forwarded-for` or `x-real-ip`. Unset means the TCP peer address.
    #[serde(default)]
    pub client_ip_header: Option<String>,

    /// Time zone whose midnight starts a new day
    #[serde(default)]
    pub time_zone: DayBoundary,

    /// How often stale counters from past days are evicted, 0 to disable
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            unknown_client: default_unknown_client(),
            client_ip_header: None,
            time_zone: DayBoundary::default(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_daily_limit() -> u64 {
    DEFAULT_DAILY_LIMIT
}

fn default_unknown_client() -> String {
    "unknown".to_string()
}

fn default_sweep_interval() -> u64 {
    3600
}

impl RateLimitingConfig {
    /// The sweep interval, or `None` when eviction is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// The parsed client address header, if one is configured.
    pub fn client_ip_header(&self) -> Result<Option<HeaderName>> {
        self.client_ip_header
            .as_deref()
            .map(|name| {
                HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
                    DaygateError::Config(format!(
                        "rate_limiting.client_ip_header {name:?} is not a valid header name: {e}"
                    ))
                })
            })
            .transpose()
    }
}

impl DaygateConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(::config::File::new(
                &path.to_string_lossy(),
                ::config::FileFormat::Yaml,
            ));
        }

        let config: DaygateConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DaygateConfig =
            serde_yaml::from_str(yaml).map_err(|e| DaygateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-check the result.
    pub fn apply_overrides(
        &mut self,
        listen_addr: Option<SocketAddr>,
        daily_limit: Option<u64>,
    ) -> Result<()> {
        if let Some(addr) = listen_addr {
            self.server.listen_addr = addr;
        }
        if let Some(limit) = daily_limit {
            self.rate_limiting.daily_limit = limit;
        }
        self.validate()
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.daily_limit == 0 {
            return Err(DaygateError::Config(
                "rate_limiting.daily_limit must be greater than zero".to_string(),
            ));
        }
        self.rate_limiting.client_ip_header()?;
        Ok(())
    }
}
