//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `DICED_*` environment variables. CLI flags are applied on top by `main`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DICED_";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address
    pub bind_addr: SocketAddr,
    /// Default log level for the `diced` target
    pub log_level: String,
    pub log_format: LogFormat,
    /// Seed for reproducible rolls; fresh entropy when unset
    pub seed: Option<u64>,
    /// Minimum spacing between two requests from the same caller
    pub min_request_interval_ms: u64,
    /// Most distinct callers tracked at once
    pub max_clients: usize,
    /// Callers silent for this long stop counting toward `max_clients`
    pub client_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            seed: None,
            min_request_interval_ms: 1000,
            max_clients: 100,
            client_idle_secs: 300,
        }
    }
}

impl Config {
    /// Load defaults, `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path, ENV_PREFIX).extract()
    }

    fn figment(path: Option<&Path>, env_prefix: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(env_prefix))
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn client_idle(&self) -> Duration {
        Duration::from_secs(self.client_idle_secs)
    }
}
