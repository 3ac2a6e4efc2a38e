//! Swarm membership through trackers and the DHT
//!
//! Joining announces `started` to every HTTP(S) and UDP tracker in the
//! descriptor, then asks the DHT when fewer than `MAX_PEERS` peers turned
//! up. Retrieval handshakes with the peers found and notes who answered in
//! a scratch file under the working directory. Leaving announces `stopped`
//! to the trackers that accepted the join and deletes the scratch file.

use crate::churn::descriptor::SwarmDescriptor;
use crate::churn::dht;
use crate::churn::peer::contact_peer;
use crate::churn::tracker::{announce, Tracker};
use crate::churn::{Membership, Retrieval, Swarm};
use crate::ChurnError;
use aquatic_udp_protocol::AnnounceEvent;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;

const PEER_ID_PREFIX: &[u8; 8] = b"-NW0100-";

/// Upper bound on peers gathered per join and contacted per retrieval
pub const MAX_PEERS: usize = 50;

/// Joins swarms through their trackers and, when enabled, the DHT
#[derive(Debug, Clone)]
pub struct TrackerSwarm {
    client: Client,
    work_dir: PathBuf,
    timeout: Duration,
    dht_bootstrap: Vec<String>,
}

impl TrackerSwarm {
    /// Creates a swarm client with DHT lookups off
    ///
    /// # Arguments
    ///
    /// * `work_dir` - Directory for per-membership scratch files; created on join
    /// * `timeout` - Bound on each tracker exchange, DHT round and peer handshake
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ChurnError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            work_dir: work_dir.into(),
            timeout,
            dht_bootstrap: Vec::new(),
        })
    }

    /// Enables DHT lookups through these `host:port` entry nodes. An empty
    /// list keeps the DHT off.
    pub fn with_dht_bootstrap(mut self, nodes: Vec<String>) -> Self {
        self.dht_bootstrap = nodes;
        self
    }
}

fn merge_peers(peers: &mut Vec<SocketAddr>, found: Vec<SocketAddr>) {
    for peer in found {
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }
}

impl Swarm for TrackerSwarm {
    type Membership = TrackerMembership;

    async fn join(&self, descriptor: &SwarmDescriptor) -> Result<TrackerMembership, ChurnError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let peer_id = generate_peer_id();

        let mut joined = Vec::new();
        let mut peers: Vec<SocketAddr> = Vec::new();
        let mut responded = false;

        for announce_url in &descriptor.trackers {
            let Some(tracker) = Tracker::parse(announce_url) else {
                tracing::debug!("Skipping tracker with unsupported scheme {}", announce_url);
                continue;
            };

            match announce(
                &self.client,
                &tracker,
                &descriptor.info_hash,
                &peer_id,
                AnnounceEvent::Started,
                self.timeout,
            )
            .await
            {
                Ok(found) => {
                    tracing::debug!("Tracker {} returned {} peers", tracker.url(), found.len());
                    responded = true;
                    merge_peers(&mut peers, found);
                    joined.push(tracker);
                }
                Err(e) => tracing::warn!("Announce failed: {}", e),
            }
        }

        if !self.dht_bootstrap.is_empty() && peers.len() < MAX_PEERS {
            match dht::get_peers(
                &self.dht_bootstrap,
                &descriptor.info_hash,
                MAX_PEERS,
                self.timeout,
            )
            .await
            {
                Ok(lookup) => {
                    tracing::debug!("DHT returned {} peers", lookup.peers.len());
                    responded |= lookup.responded;
                    merge_peers(&mut peers, lookup.peers);
                }
                Err(e) => tracing::warn!("DHT lookup failed: {}", e),
            }
        }

        if !responded {
            return Err(ChurnError::NoSourceResponded);
        }

        let scratch = self.work_dir.join(format!(
            "{}-{}.peers",
            descriptor.info_hash_hex(),
            String::from_utf8_lossy(&peer_id[PEER_ID_PREFIX.len()..])
        ));

        Ok(TrackerMembership {
            client: self.client.clone(),
            info_hash: descriptor.info_hash,
            peer_id,
            joined,
            peers,
            scratch,
            timeout: self.timeout,
        })
    }
}

/// A live swarm membership
#[derive(Debug)]
pub struct TrackerMembership {
    client: Client,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    /// Trackers that accepted the `started` announce
    joined: Vec<Tracker>,
    /// Peers found at join time, deduplicated, trackers first
    peers: Vec<SocketAddr>,
    scratch: PathBuf,
    timeout: Duration,
}

impl Membership for TrackerMembership {
    async fn retrieve(&mut self) -> Result<Retrieval, ChurnError> {
        let mut tasks = JoinSet::new();
        for &addr in self.peers.iter().take(MAX_PEERS) {
            let info_hash = self.info_hash;
            let peer_id = self.peer_id;
            let timeout = self.timeout;
            tasks.spawn(async move {
                let result = contact_peer(addr, &info_hash, &peer_id, timeout).await;
                (addr, result)
            });
        }

        let mut contacted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((addr, Ok(()))) => contacted.push(addr),
                Ok((_, Err(e))) => tracing::debug!("{}", e),
                Err(e) => tracing::warn!("Peer task failed: {}", e),
            }
        }

        let listing: Vec<String> = contacted.iter().map(|addr| addr.to_string()).collect();
        tokio::fs::write(&self.scratch, listing.join("\n")).await?;

        if contacted.is_empty() {
            return Err(ChurnError::NoPeerReachable {
                advertised: self.peers.len(),
            });
        }

        Ok(Retrieval {
            advertised: self.peers.len(),
            contacted: contacted.len(),
        })
    }

    async fn leave(self) {
        for tracker in &self.joined {
            if let Err(e) = announce(
                &self.client,
                tracker,
                &self.info_hash,
                &self.peer_id,
                AnnounceEvent::Stopped,
                self.timeout,
            )
            .await
            {
                tracing::debug!("Stopped announce failed: {}", e);
            }
        }

        match tokio::fs::remove_file(&self.scratch).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch file {}: {}",
                self.scratch.display(),
                e
            ),
        }
    }
}

fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    peer_id[..PEER_ID_PREFIX.len()].copy_from_slice(PEER_ID_PREFIX);
    let mut rng = rand::thread_rng();
    for byte in peer_id[PEER_ID_PREFIX.len()..].iter_mut() {
        *byte = rng.sample(Alphanumeric);
    }
    peer_id
}
