//! DHT peer lookup (BEP 5 `get_peers`)
//!
//! Walks the mainline DHT from a set of bootstrap nodes toward the info
//! hash, querying the closest known nodes each round and collecting the
//! peers they report. No routing table survives a lookup and nothing is
//! announced back.

use crate::churn::peer::parse_compact_peers;
use crate::ChurnError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Queries sent per round
const ALPHA: usize = 8;

const MAX_ROUNDS: usize = 6;

/// Upper bound on the wait for one round's replies
const MAX_ROUND_WAIT: Duration = Duration::from_secs(2);

/// 20-byte node id, 4-byte IPv4 address, 2-byte port
const COMPACT_NODE_LEN: usize = 26;

const TRANSACTION_ID: &[u8] = b"gp";

const DATAGRAM_LEN: usize = 2048;

/// What a lookup found
#[derive(Debug, Default)]
pub(crate) struct DhtLookup {
    pub peers: Vec<SocketAddr>,
    /// At least one node answered a query
    pub responded: bool,
}

#[derive(Serialize)]
struct GetPeersQuery {
    a: GetPeersArgs,
    q: &'static str,
    t: ByteBuf,
    y: &'static str,
}

#[derive(Serialize)]
struct GetPeersArgs {
    id: ByteBuf,
    info_hash: ByteBuf,
}

#[derive(Deserialize)]
struct KrpcMessage {
    t: ByteBuf,
    y: String,
    r: Option<GetPeersReply>,
}

#[derive(Deserialize)]
struct GetPeersReply {
    #[serde(default)]
    values: Vec<ByteBuf>,
    nodes: Option<ByteBuf>,
}

fn encode_query(node_id: &[u8; 20], info_hash: &[u8; 20]) -> Result<Vec<u8>, ChurnError> {
    let query = GetPeersQuery {
        a: GetPeersArgs {
            id: ByteBuf::from(node_id.to_vec()),
            info_hash: ByteBuf::from(info_hash.to_vec()),
        },
        q: "get_peers",
        t: ByteBuf::from(TRANSACTION_ID.to_vec()),
        y: "q",
    };
    serde_bencode::to_bytes(&query).map_err(|e| ChurnError::Dht(e.to_string()))
}

/// Decodes a compact IPv4 node list into (node id, address) pairs
fn parse_compact_nodes(bytes: &[u8]) -> Vec<([u8; 20], SocketAddr)> {
    bytes
        .chunks_exact(COMPACT_NODE_LEN)
        .filter_map(|chunk| {
            let mut id = [0u8; 20];
            id.copy_from_slice(&chunk[..20]);
            let ip = Ipv4Addr::new(chunk[20], chunk[21], chunk[22], chunk[23]);
            let port = u16::from_be_bytes([chunk[24], chunk[25]]);
            (port != 0).then(|| (id, SocketAddr::new(IpAddr::V4(ip), port)))
        })
        .collect()
}

fn xor_distance(a: &[u8; 20], b: &[u8; 20]) -> [u8; 20] {
    let mut distance = [0u8; 20];
    for (i, byte) in distance.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    distance
}

/// Looks up peers for `info_hash`
///
/// # Arguments
///
/// * `bootstrap` - `host:port` entry nodes
/// * `max_peers` - Stop walking once this many peers are known
/// * `timeout` - Caps the wait for each round of replies
///
/// Fails only when no bootstrap node resolves. A lookup nobody answered
/// comes back with `responded` unset.
pub(crate) async fn get_peers(
    bootstrap: &[String],
    info_hash: &[u8; 20],
    max_peers: usize,
    timeout: Duration,
) -> Result<DhtLookup, ChurnError> {
    let mut candidates: Vec<([u8; 20], SocketAddr)> = Vec::new();
    for node in bootstrap {
        match tokio::net::lookup_host(node.as_str()).await {
            Ok(addrs) => {
                // Bootstrap ids are unknown, so they sort last
                candidates.extend(addrs.filter(SocketAddr::is_ipv4).map(|a| ([0xff; 20], a)))
            }
            Err(e) => tracing::debug!("DHT bootstrap node {} did not resolve: {}", node, e),
        }
    }
    if candidates.is_empty() {
        return Err(ChurnError::Dht("no bootstrap node resolved".to_string()));
    }

    let node_id: [u8; 20] = rand::thread_rng().gen();
    let query = encode_query(&node_id, info_hash)?;
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| ChurnError::Dht(e.to_string()))?;

    let round_wait = timeout.min(MAX_ROUND_WAIT);
    let mut queried: HashSet<SocketAddr> = HashSet::new();
    let mut lookup = DhtLookup::default();
    let mut buf = vec![0u8; DATAGRAM_LEN];

    for round in 0..MAX_ROUNDS {
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        let mut batch = Vec::new();
        candidates.retain(|(_, addr)| {
            if queried.contains(addr) {
                false
            } else if batch.len() < ALPHA {
                batch.push(*addr);
                false
            } else {
                true
            }
        });
        if batch.is_empty() {
            break;
        }

        let mut outstanding: HashSet<SocketAddr> = HashSet::new();
        for addr in batch {
            queried.insert(addr);
            match socket.send_to(&query, addr).await {
                Ok(_) => {
                    outstanding.insert(addr);
                }
                Err(e) => tracing::debug!("DHT query to {} failed: {}", addr, e),
            }
        }
        tracing::debug!("DHT round {}: queried {} nodes", round + 1, outstanding.len());

        let deadline = Instant::now() + round_wait;
        while !outstanding.is_empty() {
            let (len, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    tracing::debug!("DHT receive failed: {}", e);
                    break;
                }
                Err(_) => break,
            };
            if !outstanding.remove(&from) {
                continue;
            }

            let Ok(message) = serde_bencode::from_bytes::<KrpcMessage>(&buf[..len]) else {
                continue;
            };
            if message.t.as_slice() != TRANSACTION_ID || message.y != "r" {
                continue;
            }
            let Some(reply) = message.r else {
                continue;
            };
            lookup.responded = true;

            for value in &reply.values {
                for peer in parse_compact_peers(value) {
                    if !lookup.peers.contains(&peer) {
                        lookup.peers.push(peer);
                    }
                }
            }
            if let Some(nodes) = &reply.nodes {
                for (id, addr) in parse_compact_nodes(nodes) {
                    let known = queried.contains(&addr)
                        || candidates.iter().any(|(_, candidate)| *candidate == addr);
                    if !known {
                        candidates.push((xor_distance(&id, info_hash), addr));
                    }
                }
            }
        }

        if lookup.peers.len() >= max_peers {
            break;
        }
    }

    Ok(lookup)
}
