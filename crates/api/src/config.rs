//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use fanout::DEFAULT_TTL;

/// API server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Deployment environment, e.g. `development` or `production`.
    pub environment: String,
    /// Where the prompt counter is persisted.
    pub stats_path: PathBuf,
    /// How long registered attachments stay retrievable.
    pub attachment_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:<PORT>` |
    /// | `PORT` | Port used when `API_ADDR` is unset | `3001` |
    /// | `APP_ENV` | Deployment environment | `development` |
    /// | `STATS_PATH` | Statistics file | `/app/data/statistics.json` in production, `./data/statistics.json` otherwise |
    /// | `ATTACHMENT_TTL_SECS` | Attachment lifetime | `600` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = match env::var("API_ADDR") {
            Ok(addr) => addr.parse().map_err(|_| ConfigError::InvalidAddr)?,
            Err(_) => {
                let port: u16 = env::var("PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort)?;
                SocketAddr::from(([127, 0, 0, 1], port))
            }
        };

        let environment = env::var("APP_ENV")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "development".to_string());

        let stats_path = env::var("STATS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_stats_path(&environment));

        let attachment_ttl = match env::var("ATTACHMENT_TTL_SECS") {
            Ok(secs) => secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTtl)?,
            Err(_) => DEFAULT_TTL,
        };

        Ok(Self {
            addr,
            environment,
            stats_path,
            attachment_ttl,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn default_stats_path(environment: &str) -> PathBuf {
    if environment == "production" {
        PathBuf::from("/app/data/statistics.json")
    } else {
        PathBuf::from("./data/statistics.json")
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("ATTACHMENT_TTL_SECS must be a positive number of seconds")]
    InvalidTtl,
}
