//! Configuration module for Noisewake
//!
//! This module handles loading, validating and rewriting the TOML document
//! that both configures a run and checkpoints its frontier.
//!
//! # Example
//!
//! ```no_run
//! use noisewake::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Sweeping {} URLs", config.urls.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DEFAULT_DHT_BOOTSTRAP, DEFAULT_RATE_LIMIT_SECS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WEBSOCKET_TIMEOUT_SECS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_or_default, write_config};
pub use validation::validate;
