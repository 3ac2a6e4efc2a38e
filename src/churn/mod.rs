//! IP churn
//!
//! The churn controller repeatedly joins and leaves a single peer swarm.
//! The data is never the point: every join announces to the swarm's
//! trackers, asks the DHT, and handshakes with whichever peers turn up, so
//! each iteration talks to a fresh set of peer addresses.
//!
//! # Components
//!
//! - `SwarmDescriptor`: the parsed magnet URI naming the swarm
//! - `RetryPolicy`: attempt count, backoff and consecutive-failure threshold
//! - `Swarm` / `Membership`: the seam between the controller and the network
//! - `TrackerSwarm`: the tracker (HTTP and UDP) and DHT implementation of that seam
//! - `ChurnController`: the join/retrieve/leave loop

mod controller;
mod descriptor;
mod dht;
mod peer;
mod policy;
mod swarm;
mod tracker;

use crate::ChurnError;
use std::future::Future;

pub use controller::{ChurnController, ChurnExit, ChurnReport};
pub use descriptor::SwarmDescriptor;
pub use peer::{handshake_message, parse_compact_peers, HANDSHAKE_LEN};
pub use policy::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_FAILURE_THRESHOLD};
pub use swarm::{TrackerMembership, TrackerSwarm, MAX_PEERS};

/// What one membership's retrieval achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retrieval {
    /// Peers the trackers and the DHT advertised
    pub advertised: usize,

    /// Peers that completed a handshake
    pub contacted: usize,
}

/// A peer swarm that can be joined
pub trait Swarm: Send + Sync {
    type Membership: Membership;

    /// Joins the swarm named by `descriptor`, creating a fresh membership
    fn join(
        &self,
        descriptor: &SwarmDescriptor,
    ) -> impl Future<Output = Result<Self::Membership, ChurnError>> + Send;
}

/// One live membership in a swarm
pub trait Membership: Send {
    /// Retrieves what the swarm advertises and discards it
    fn retrieve(&mut self) -> impl Future<Output = Result<Retrieval, ChurnError>> + Send;

    /// Leaves the swarm and releases everything the membership holds
    fn leave(self) -> impl Future<Output = ()> + Send;
}
