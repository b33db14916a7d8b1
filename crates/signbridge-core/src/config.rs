//! Configuration resolution for signbridge.
//!
//! Settings resolve in layers:
//! 1. Built-in defaults
//! 2. Config file (signbridge.json)
//! 3. Environment variables (`SIGNBRIDGE_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete signbridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Signs addressable by this daemon, keyed by sign id.
    #[serde(default)]
    pub signs: HashMap<String, SignConfig>,
    /// Alert "type" value -> vendor program name.
    #[serde(default)]
    pub message_types: HashMap<String, String>,
}

/// Webhook gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Pending-override queue depth per sign.
    pub queue_depth: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { queue_depth: 16 }
    }
}

/// Sign session timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// TCP connect timeout (seconds).
    pub connect_timeout_secs: u64,
    /// Per-response read timeout (seconds).
    pub response_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            response_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

/// Restore retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Ceiling on the delay between retries (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Total restore attempts before giving up.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// One controllable sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignConfig {
    /// TCP address of the sign controller ("host:port").
    pub address: String,
    /// Program the sign normally displays; the restore target after an
    /// override expires.
    pub default_program: String,
    pub credentials: Credentials,
}

/// Login credentials for a sign controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub serial_number: String,
    pub username: String,
    pub password: String,
    pub login_type: u8,
}

/// Load configuration with file overlay and env overrides.
///
/// An explicitly given path must exist; with no path, the per-OS default
/// location is used when present and defaults apply otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => load_config_file(&p)?,
            _ => Config::default(),
        },
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Get the default config file path for this platform.
pub fn default_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".signbridge").join("signbridge.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME").ok().map(|h| {
            PathBuf::from(h).join("Library/Application Support/signbridge/signbridge.json")
        })
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("signbridge").join("signbridge.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("SIGNBRIDGE_QUEUE_DEPTH")
        && let Ok(n) = val.parse()
    {
        config.gateway.queue_depth = n;
    }
    if let Ok(val) = std::env::var("SIGNBRIDGE_CONNECT_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.session.connect_timeout_secs = n;
    }
    if let Ok(val) = std::env::var("SIGNBRIDGE_RESPONSE_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.session.response_timeout_secs = n;
    }
    if let Ok(val) = std::env::var("SIGNBRIDGE_RESTORE_ATTEMPTS")
        && let Ok(n) = val.parse()
    {
        config.retry.max_attempts = n;
    }
}

impl Config {
    /// Look up a sign by id.
    pub fn sign(&self, sign_id: &str) -> Option<&SignConfig> {
        self.signs.get(sign_id)
    }

    /// Resolve an alert "type" value to its vendor program name.
    pub fn program_for_type(&self, message_type: &str) -> Option<&str> {
        self.message_types.get(message_type).map(String::as_str)
    }
}
