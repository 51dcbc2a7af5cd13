//! Server configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file
//! - Environment variables (`COMMENTCAST_*`, nested keys separated by `__`,
//!   e.g. `COMMENTCAST_LIMITS__MAILBOX_CAPACITY=512`)

use anyhow::{bail, Context, Result};
use commentcast_core::HubConfig;
use commentcast_transport::PumpConfig;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Header carrying the authenticated subscriber identity.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per-connection mailbox capacity. A subscriber that falls this far
    /// behind is disconnected.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Maximum inbound WebSocket message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds. 0 disables pings.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Idle timeout in milliseconds. 0 disables the timeout.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,

    /// Per-write timeout in milliseconds. 0 disables the timeout.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_identity_header() -> String {
    "x-user-id".to_string()
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_heartbeat_timeout() -> u64 {
    60_000
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            identity_header: default_identity_header(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

/// `COMMENTCAST_*` variables, with `__` between nested keys.
fn environment() -> config::Environment {
    config::Environment::with_prefix("COMMENTCAST")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

const CONFIG_PATHS: [&str; 3] = [
    "commentcast.toml",
    "/etc/commentcast/commentcast.toml",
    "~/.config/commentcast/commentcast.toml",
];

impl Config {
    /// Load configuration from the first config file found, overlaid with
    /// `COMMENTCAST_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, an
    /// environment override has the wrong type, or a value is out of range.
    pub fn load() -> Result<Self> {
        let file = CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).into_owned())
            .find(|path| Path::new(path).exists());

        let mut builder = config::Config::builder();
        if let Some(path) = &file {
            builder = builder.add_source(config::File::new(path, config::FileFormat::Toml));
        }

        Self::build(builder.add_source(environment())).with_context(|| match &file {
            Some(path) => format!("Failed to load config from {}", path),
            None => "Failed to load config from environment".to_string(),
        })
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break every connection at runtime.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.limits.mailbox_capacity == 0 {
            bail!("limits.mailbox_capacity must be at least 1");
        }
        if self.limits.max_message_size == 0 {
            bail!("limits.max_message_size must be at least 1");
        }
        if !self.transport.websocket_path.starts_with('/') {
            bail!(
                "transport.websocket_path must start with '/', got {:?}",
                self.transport.websocket_path
            );
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }

    /// Hub settings derived from the limits section.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            mailbox_capacity: self.limits.mailbox_capacity,
        }
    }

    /// Pump settings derived from the heartbeat section.
    #[must_use]
    pub fn pump_config(&self) -> PumpConfig {
        let millis = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        PumpConfig {
            ping_interval: millis(self.heartbeat.interval_ms),
            idle_timeout: millis(self.heartbeat.timeout_ms),
            write_timeout: millis(self.heartbeat.write_timeout_ms),
        }
    }
}
