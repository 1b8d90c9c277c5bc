//! `[serve]` section configuration.
//!
//! Contains preview server settings.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 5277                 # HTTP port number
//! ws_port = 35729             # WebSocket port, retried upward when busy
//! ready_timeout_ms = 30000    # Longest a script request waits for a rebuild
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the preview reachable from other devices.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default WebSocket port (LiveReload convention).
pub const DEFAULT_WS_PORT: u16 = 35729;

/// Preview server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port for preview and editor connections.
    pub ws_port: u16,

    /// Upper bound for a deferred script request, in milliseconds.
    pub ready_timeout_ms: u64,
}

impl ServeConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            ws_port: DEFAULT_WS_PORT,
            ready_timeout_ms: 30_000,
        }
    }
}
