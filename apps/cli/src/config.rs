//! CLI configuration.
//!
//! Configuration is stored as TOML, looked up in order at:
//! - the `--config` argument
//! - `$SLICEBOX_CONFIG`
//! - `~/.config/slicebox/config.toml`
//!
//! A missing default file means built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use slicebox_client::ClientConfig;
use slicebox_client::config::{DEFAULT_SERVER_IP, DEFAULT_SERVER_PORT, DEFAULT_SMALL_FILE_THRESHOLD};
use slicebox_transfer::TransferConfig;

/// Store address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_SERVER_IP.into(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// CLI configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files up to this many bytes are sent without slicing.
    pub small_file_threshold: u64,

    pub server: ServerConfig,

    pub transfer: TransferConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
            server: ServerConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, falling back to defaults when no file exists
    /// at the default location. An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var_os("SLICEBOX_CONFIG") {
                Some(path) => (PathBuf::from(path), true),
                None => (config_path(), false),
            },
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds the client configuration, with command-line values taking
    /// precedence over the file.
    pub fn client_config(&self, server_ip: Option<&str>, server_port: Option<u16>) -> ClientConfig {
        let ip = server_ip.unwrap_or(&self.server.ip);
        let port = server_port.unwrap_or(self.server.port);
        let mut config = ClientConfig::for_server(ip, port);
        config.transfer = self.transfer.clone();
        config.small_file_threshold = self.small_file_threshold;
        config
    }
}

/// Returns the default configuration file path.
fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("slicebox")
        .join("config.toml")
}
