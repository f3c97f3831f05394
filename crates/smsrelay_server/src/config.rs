//! Server configuration.

use crate::error::{ServerError, ServerResult};
use smsrelay_core::{LogConfig, RelayConfig, DEFAULT_LONG_POLL_TIMEOUT, DEFAULT_MAX_QUEUE_LENGTH};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable for the bind address.
pub const ENV_BIND: &str = "SMSRELAY_BIND";
/// Environment variable for the data directory. Unset means in-memory.
pub const ENV_DATA_DIR: &str = "SMSRELAY_DATA_DIR";
/// Environment variable for the per-device queue limit.
pub const ENV_MAX_QUEUE_LENGTH: &str = "SMSRELAY_MAX_QUEUE_LENGTH";
/// Environment variable for the long-poll timeout, in seconds.
pub const ENV_LONG_POLL_SECS: &str = "SMSRELAY_LONG_POLL_SECS";
/// Environment variable for the `fetch_count` cap.
pub const ENV_MAX_FETCH_COUNT: &str = "SMSRELAY_MAX_FETCH_COUNT";
/// Environment variable for the `fetch_count` of requests that omit it.
pub const ENV_DEFAULT_FETCH_COUNT: &str = "SMSRELAY_DEFAULT_FETCH_COUNT";
/// Environment variable; `false` lets requests omit `fetch_count` and
/// `long_polling`.
pub const ENV_REQUIRE_QUERY_PARAMS: &str = "SMSRELAY_REQUIRE_QUERY_PARAMS";

/// Where notifications are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process log; lost on restart.
    Memory,
    /// Document store in this directory.
    Directory(PathBuf),
}

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Notification storage.
    pub backend: StorageBackend,
    /// Upper bound applied to a request's `fetch_count`.
    pub max_fetch_count: usize,
    /// `fetch_count` used when the request leaves it out. Never above
    /// `max_fetch_count` once built through the setters.
    pub default_fetch_count: usize,
    /// Whether fetches must carry `fetch_count` and `long_polling`. A
    /// missing value then fails to parse like a malformed one.
    pub require_query_params: bool,
    /// How long a long-poll request waits.
    pub long_poll_timeout: Duration,
    /// Queue limit for newly created device queues.
    pub max_queue_length: u64,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            backend: StorageBackend::Memory,
            max_fetch_count: 100,
            default_fetch_count: 10,
            require_query_params: true,
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
        }
    }

    /// Builds a configuration from `SMSRELAY_*` environment variables,
    /// falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] if a variable does not parse.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] if a variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = parse_var(&lookup, ENV_BIND)? {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.backend = StorageBackend::Directory(PathBuf::from(dir));
        }
        if let Some(max) = parse_var(&lookup, ENV_MAX_QUEUE_LENGTH)? {
            config.max_queue_length = max;
        }
        if let Some(secs) = parse_var(&lookup, ENV_LONG_POLL_SECS)? {
            config.long_poll_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&lookup, ENV_MAX_FETCH_COUNT)? {
            config = config.with_max_fetch_count(max);
        }
        if let Some(count) = parse_var(&lookup, ENV_DEFAULT_FETCH_COUNT)? {
            config = config.with_default_fetch_count(count);
        }
        if let Some(required) = parse_var(&lookup, ENV_REQUIRE_QUERY_PARAMS)? {
            config.require_query_params = required;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Stores notifications in a document store under `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backend = StorageBackend::Directory(dir.into());
        self
    }

    /// Keeps notifications in memory only.
    pub fn with_memory_backend(mut self) -> Self {
        self.backend = StorageBackend::Memory;
        self
    }

    /// Sets the `fetch_count` cap, lowering the default count to it if
    /// needed.
    pub fn with_max_fetch_count(mut self, max: usize) -> Self {
        self.max_fetch_count = max;
        self.default_fetch_count = self.default_fetch_count.min(max);
        self
    }

    /// Sets the `fetch_count` used when the request leaves it out.
    pub fn with_default_fetch_count(mut self, count: usize) -> Self {
        self.default_fetch_count = count;
        self
    }

    /// Sets whether fetches must carry `fetch_count` and `long_polling`.
    pub fn with_require_query_params(mut self, required: bool) -> Self {
        self.require_query_params = required;
        self
    }

    /// Sets the long-poll timeout.
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Sets the queue limit for new device queues.
    pub fn with_max_queue_length(mut self, max: u64) -> Self {
        self.max_queue_length = max;
        self
    }

    /// Checks that the values are usable together.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> ServerResult<()> {
        self.log_config()
            .validate()
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))?;
        if self.max_fetch_count == 0 {
            return Err(ServerError::InvalidConfig(
                "max_fetch_count must be at least 1".into(),
            ));
        }
        if self.default_fetch_count > self.max_fetch_count {
            return Err(ServerError::InvalidConfig(format!(
                "default_fetch_count {} exceeds max_fetch_count {}",
                self.default_fetch_count, self.max_fetch_count
            )));
        }
        Ok(())
    }

    /// Log configuration derived from this server configuration.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new().max_queue_length(self.max_queue_length)
    }

    /// Relay configuration derived from this server configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new().long_poll_timeout(self.long_poll_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> ServerResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ServerError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}
