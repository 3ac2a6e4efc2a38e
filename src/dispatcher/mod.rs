//! Traffic dispatcher
//!
//! This module drives the repeated sweeps over the frontier:
//! - Snapshotting the frontier and identities at the start of each sweep
//! - Running HTTP probes in URL-major order and merging harvested links
//! - Checkpointing the frontier after every sweep
//! - Rolling for an occasional WebSocket sweep
//! - Pacing sweeps and observing the stop signal

mod coordinator;
mod scheduler;

pub use coordinator::{Dispatcher, DispatcherSettings, SweepReport};
pub use scheduler::{SweepScheduler, WEBSOCKET_SWEEP_PROBABILITY};
