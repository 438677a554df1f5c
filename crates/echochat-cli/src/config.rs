//! Client configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (`echochat.toml`)
//! - Environment variables (`ECHOCHAT_URI`)
//! - Command line arguments

use anyhow::{Context, Result};
use echochat_core::{ClientConfig, ReconnectPolicy};
use echochat_transport::WebSocketConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server endpoint.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Reconnection behaviour.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Own-message echo tracking.
    #[serde(default)]
    pub echo: EchoConfig,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect when the connection is lost.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay before the first attempt in milliseconds, doubled per failure.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Echo tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Own messages remembered while awaiting their broadcast.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Connect and handshake timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_uri() -> String {
    "ws://127.0.0.1:8000/ws".to_string()
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000 // 30 seconds
}

fn default_max_attempts() -> u32 {
    10
}

fn default_max_pending() -> usize {
    32
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            reconnect: ReconnectConfig::default(),
            echo: EchoConfig::default(),
            transport: TransportConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = ["echochat.toml", "~/.config/echochat/echochat.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment overrides, looked up through `var`.
    #[must_use]
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(uri) = var("ECHOCHAT_URI").filter(|u| !u.is_empty()) {
            self.uri = uri;
        }
        self
    }

    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect.enabled,
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            max_pending_echoes: self.echo.max_pending,
            max_envelope_size: self.transport.max_message_size,
        }
    }

    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.transport.max_message_size,
            connect_timeout: Duration::from_millis(self.transport.connect_timeout_ms),
        }
    }
}
