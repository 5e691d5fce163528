use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KeyholeError, Result};
use crate::proxy::UpstreamOrigin;

/// Environment variable overriding `server.listen_addr`
pub const ENV_LISTEN_ADDR: &str = "KEYHOLE_LISTEN_ADDR";
/// Environment variable overriding `upstream.origin`
pub const ENV_UPSTREAM_ORIGIN: &str = "KEYHOLE_UPSTREAM_ORIGIN";
/// Environment variable overriding `upstream.prefix`
pub const ENV_PATH_PREFIX: &str = "KEYHOLE_PATH_PREFIX";

/// Main configuration structure for Keyhole
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Inbound listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream forwarding configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8787")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

/// Upstream origin, forwarding prefix, credential source and timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Scheme + host (+ port) requests are forwarded to
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Paths starting with this prefix are forwarded; all others bypass
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Name of the environment variable holding the bearer credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// TCP/TLS connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Maximum wait for upstream response headers in seconds
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    /// Maximum gap between upstream body chunks in seconds (0 disables)
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            prefix: default_prefix(),
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            response_timeout_secs: default_response_timeout_secs(),
            idle_timeout_secs: 0,
        }
    }
}

fn default_origin() -> String {
    "https://api.openai.com".to_string()
}

fn default_prefix() -> String {
    "/v1/".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_response_timeout_secs() -> u64 {
    300
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// `None` when the idle timeout is disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to built-in defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyholeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| KeyholeError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply `KEYHOLE_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (empty values are ignored)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get(ENV_LISTEN_ADDR) {
            self.server.listen_addr = addr;
        }
        if let Some(origin) = get(ENV_UPSTREAM_ORIGIN) {
            self.upstream.origin = origin;
        }
        if let Some(prefix) = get(ENV_PATH_PREFIX) {
            self.upstream.prefix = prefix;
        }
    }

    /// Reject configurations the gateway cannot serve safely
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        UpstreamOrigin::parse(&self.upstream.origin)?;

        let prefix = &self.upstream.prefix;
        if prefix.is_empty() {
            return Err(KeyholeError::Config(
                "upstream.prefix must not be empty".to_string(),
            ));
        }
        if !prefix.starts_with('/') {
            return Err(KeyholeError::Config(format!(
                "upstream.prefix must start with '/': {prefix}"
            )));
        }
        if self.upstream.api_key_env.trim().is_empty() {
            return Err(KeyholeError::Config(
                "upstream.api_key_env must name an environment variable".to_string(),
            ));
        }
        if self.upstream.response_timeout_secs == 0 {
            return Err(KeyholeError::Config(
                "upstream.response_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| KeyholeError::Config(format!("Invalid listen address: {e}")))
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".keyhole").join("config.toml")),
        dirs::config_dir().map(|c| c.join("keyhole").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}
