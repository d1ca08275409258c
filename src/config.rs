//! Server configuration.
//!
//! [`ServerConfig`] is built explicitly and passed to [`Server::bind`](crate::Server::bind).
//! It can come from code or from a TOML file; every key is optional:
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! read_timeout_ms = 5000
//! write_timeout_ms = 5000
//! body_limit = 4194304
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Settings for one [`Server`](crate::Server).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// `host:port` to listen on. The host may be a name (`localhost:3000`),
    /// resolved when the server binds. Port `0` picks a free port.
    pub addr: String,

    /// Upper bound, in milliseconds, for reading request headers and
    /// collecting the body.
    ///
    /// The header bound also applies while a keep-alive connection waits for
    /// its next request, so it doubles as the idle timeout: an HTTP/1
    /// connection that sends nothing for this long is closed.
    pub read_timeout_ms: u64,

    /// Upper bound, in milliseconds, for the handler to produce a response.
    pub write_timeout_ms: u64,

    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_owned(),
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            body_limit: 4 * 1024 * 1024,
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_addr()?;
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be > 0".to_owned()));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("write_timeout_ms must be > 0".to_owned()));
        }
        if self.body_limit == 0 {
            return Err(ConfigError::Invalid("body_limit must be > 0".to_owned()));
        }
        Ok(())
    }

    /// Checks the `host:port` shape only. Name resolution happens at bind.
    fn check_addr(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid(format!("addr `{}`: {reason}", self.addr));

        let (host, port) = self.addr.rsplit_once(':').ok_or_else(|| invalid("expected `host:port`"))?;
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid("missing or malformed host"));
        }
        port.parse::<u16>().map_err(|_| invalid("port must be 0-65535"))?;
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Sets the read timeout. Sub-millisecond remainders round up.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = millis_ceil(timeout);
        self
    }

    /// Sets the write timeout. Sub-millisecond remainders round up.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = millis_ceil(timeout);
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}

fn millis_ceil(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
