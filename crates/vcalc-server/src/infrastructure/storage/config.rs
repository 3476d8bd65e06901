//! TOML configuration file for the vcalc server.
//!
//! The file is optional.  Every field has a built-in default, and command-line
//! flags override whatever the file says.  Example:
//!
//! ```toml
//! [network]
//! port = 33333
//! bind_address = "0.0.0.0"
//!
//! [paths]
//! credentials = "/etc/vcalc.conf"
//! log = "/var/log/vcalc.log"
//!
//! [limits]
//! idle_timeout_secs = 30      # 0 disables the timeout
//! max_connections = 64
//! max_vector_bytes = 4000000000
//! shutdown_grace_secs = 30    # wait for open sessions on shutdown
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::protocol_handler::SessionLimits;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IPv4 or IPv6 literal.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    /// `max_connections` was set to zero.
    #[error("max_connections must be at least 1")]
    NoConnectionSlots,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// TCP port; must lie in 1024..=49151 to pass acceptor validation.
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Files read or written by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// `login:secret` credential database.
    #[serde(default = "default_credentials_path")]
    pub credentials: PathBuf,
    /// Append-only journal file.
    #[serde(default = "default_log_path")]
    pub log: PathBuf,
}

/// Per-connection and server-wide resource limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_vector_bytes")]
    pub max_vector_bytes: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    33333
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("/etc/vcalc.conf")
}
fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/vcalc.log")
}
fn default_idle_timeout_secs() -> u64 {
    30
}
fn default_max_connections() -> usize {
    64
}
fn default_max_vector_bytes() -> u64 {
    vcalc_core::protocol::DEFAULT_MAX_VECTOR_BYTES
}
fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials_path(),
            log: default_log_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_connections: default_max_connections(),
            max_vector_bytes: default_max_vector_bytes(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The bind address as an [`IpAddr`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBindAddress`] if it is not an IP literal.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))
    }

    /// Checks the values that would make the server unusable.
    ///
    /// The port range is not checked here; the acceptor owns that rule.
    ///
    /// # Errors
    ///
    /// The first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_ip()?;
        if self.limits.max_connections == 0 {
            return Err(ConfigError::NoConnectionSlots);
        }
        Ok(())
    }

    /// Converts the `[limits]` section into handler limits.
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_vector_bytes: self.limits.max_vector_bytes,
            idle_timeout: match self.limits.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// How long shutdown waits for open sessions.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.limits.shutdown_grace_secs)
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Loads a [`ServerConfig`] from `path`.
///
/// Unlike the credential file, a configuration file named explicitly must
/// exist; a missing file is an error rather than a silent fall back to
/// defaults.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read and [`ConfigError::Parse`]
/// if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ServerConfig::from_toml_str(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
