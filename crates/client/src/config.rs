use std::time::Duration;

use slicebox_transfer::TransferConfig;

/// Default store address.
pub const DEFAULT_SERVER_IP: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 800;

/// Files up to this size go up and down in a single request: 1 MiB.
pub const DEFAULT_SMALL_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store root, e.g. `http://127.0.0.1:800/`.
    pub base_url: String,
    pub transfer: TransferConfig,
    /// Largest file sent or fetched without slicing.
    pub small_file_threshold: u64,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_server(DEFAULT_SERVER_IP, DEFAULT_SERVER_PORT)
    }
}

impl ClientConfig {
    /// Configuration for a store at `ip:port` with default tunables.
    pub fn for_server(ip: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{ip}:{port}/"),
            transfer: TransferConfig::default(),
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
            connect_timeout: Duration::from_secs(10),
        }
    }
}
