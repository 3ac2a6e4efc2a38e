//! Noisewake: a synthetic traffic generator
//!
//! This crate sweeps a self-expanding frontier of URLs with HTTP and WebSocket
//! probes, checkpoints the frontier back into its configuration document, and
//! independently churns through a peer swarm to vary the set of peer addresses
//! the host is seen talking to.

pub mod churn;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod frontier;
pub mod probe;
pub mod shutdown;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Noisewake operations
#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Churn error: {0}")]
    Churn(#[from] ChurnError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised by a single HTTP or WebSocket probe
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid identity header {identity:?}")]
    InvalidIdentity { identity: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to read body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("WebSocket handshake with {url} failed: {source}")]
    Handshake {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("WebSocket handshake with {url} timed out")]
    HandshakeTimeout { url: String },

    #[error("WebSocket send to {url} timed out")]
    SendTimeout { url: String },

    #[error("WebSocket send to {url} failed: {source}")]
    Send {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while checkpointing the frontier document
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised while joining, retrieving from, or leaving a swarm
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("Invalid swarm descriptor: {0}")]
    Descriptor(String),

    #[error("Tracker {tracker} failed: {message}")]
    Tracker { tracker: String, message: String },

    #[error("No tracker or DHT node answered")]
    NoSourceResponded,

    #[error("DHT lookup failed: {0}")]
    Dht(String),

    #[error("No peer completed the handshake ({advertised} advertised)")]
    NoPeerReachable { advertised: usize },

    #[error("Peer {peer} failed: {message}")]
    Peer { peer: String, message: String },

    #[error("Scratch file error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while tearing down working state at shutdown
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Failed to remove {path}: {source}")]
    RemoveDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for Noisewake operations
pub type Result<T> = std::result::Result<T, NoiseError>;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use frontier::Frontier;
pub use shutdown::{stop_channel, StopListener, StopSignal};
