use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seconds slept between sweeps when `rate_limit` is absent
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 1;

/// Per-request HTTP timeout when `timeout` is absent or zero
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// WebSocket handshake timeout when `websocket_timeout` is absent or zero
pub const DEFAULT_WEBSOCKET_TIMEOUT_SECS: u64 = 10;

/// DHT routers queried when `dht_bootstrap` is absent
pub const DEFAULT_DHT_BOOTSTRAP: [&str; 3] = [
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];

/// The configuration document
///
/// Every field is optional. Absent sequences deserialize as empty and are
/// not emitted again on write, and absent scalars stay absent, so a document
/// survives a load/write cycle unchanged. Keys this crate does not know are
/// collected in `extra` and written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frontier seed, rewritten with the grown frontier after every sweep
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    /// Identities sent as the `User-Agent` header
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_agents: Vec<String>,

    /// Seconds between sweeps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,

    /// HTTP probe timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Number of swarm churn iterations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// WebSocket handshake timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket_timeout: Option<u64>,

    /// Magnet URI naming the swarm used for churn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_link: Option<String>,

    /// `host:port` DHT entry nodes; an empty list turns DHT lookups off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dht_bootstrap: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Config {
    /// Time to sleep between two sweeps
    pub fn sweep_cadence(&self) -> Duration {
        Duration::from_secs(self.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT_SECS))
    }

    /// Upper bound on a single HTTP probe
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Upper bound on a single WebSocket handshake
    pub fn websocket_timeout(&self) -> Duration {
        Duration::from_secs(
            self.websocket_timeout
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_WEBSOCKET_TIMEOUT_SECS),
        )
    }

    /// Number of churn iterations to run
    pub fn churn_attempts(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }

    /// DHT entry nodes for churn peer discovery
    pub fn dht_bootstrap_nodes(&self) -> Vec<String> {
        match &self.dht_bootstrap {
            Some(nodes) => nodes.clone(),
            None => DEFAULT_DHT_BOOTSTRAP.iter().map(|n| n.to_string()).collect(),
        }
    }
}
