//! Relay server configuration and shared state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relay_core::RelayService;

const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 10_000;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Address the WebSocket endpoint binds to
    pub listen_addr: SocketAddr,
    /// Root directory for persisted state
    pub data_dir: PathBuf,
    /// Upper bound for a single callback delivery
    pub delivery_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            data_dir: PathBuf::from("relay_data"),
            delivery_timeout: Duration::from_millis(DEFAULT_DELIVERY_TIMEOUT_MS),
        }
    }
}

impl RelayConfig {
    /// Build configuration from `RELAY_ADDR`, `RELAY_ROOT` and
    /// `RELAY_DELIVERY_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(addr) = std::env::var("RELAY_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("RELAY_ROOT") {
            config.data_dir = PathBuf::from(root);
        }
        if let Some(ms) = std::env::var("RELAY_DELIVERY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.delivery_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Config rooted at a custom directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("chat_history.txt")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
}
