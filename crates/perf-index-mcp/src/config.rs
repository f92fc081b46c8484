use std::path::PathBuf;
use std::time::Duration;

use perf_index_model::DEFAULT_MODEL_FILE;
use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8788";
pub const DEFAULT_LOG_FILTER: &str = "perf_index=info";
/// Per-connection socket read and write deadline for the HTTP transport.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(5_000);
const HTTP_TIMEOUT_MS_RANGE: (u64, u64) = (50, 120_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl Transport {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Transport(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PERF_INDEXD_TRANSPORT must be stdio or http, got '{0}'")]
    Transport(String),
}

/// Process configuration, read once from `PERF_INDEX*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: Transport,
    pub http_addr: String,
    pub model_path: PathBuf,
    /// Defer reading the model until the first request needs it.
    pub lazy_load: bool,
    pub http_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            model_path: PathBuf::from(".").join(DEFAULT_MODEL_FILE),
            lazy_load: false,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let transport = match lookup("PERF_INDEXD_TRANSPORT") {
            Some(raw) => Transport::parse(&raw)?,
            None => defaults.transport,
        };
        let http_addr = lookup("PERF_INDEX_HTTP_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.http_addr);
        let model_path = lookup("PERF_INDEX_MODEL")
            .filter(|v| !v.trim().is_empty())
            .map_or(defaults.model_path, PathBuf::from);
        let lazy_load = lookup("PERF_INDEX_LAZY_LOAD").is_some_and(|v| env_flag(&v));
        let http_timeout = lookup("PERF_INDEX_HTTP_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(defaults.http_timeout, |ms| {
                let (min, max) = HTTP_TIMEOUT_MS_RANGE;
                Duration::from_millis(ms.clamp(min, max))
            });

        Ok(Self {
            transport,
            http_addr,
            model_path,
            lazy_load,
            http_timeout,
        })
    }
}

fn env_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
