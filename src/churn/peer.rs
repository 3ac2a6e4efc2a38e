//! Peer wire basics
//!
//! Just enough of the BitTorrent peer protocol to prove contact: decode the
//! tracker's compact peer list and exchange handshakes. The connection is
//! dropped right after the peer's handshake arrives.

use crate::ChurnError;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";

/// Length of a v1 handshake message
pub const HANDSHAKE_LEN: usize = 68;

/// Builds the handshake we send to a peer
pub fn handshake_message(info_hash: &[u8; 20], peer_id: &[u8; 20]) -> [u8; HANDSHAKE_LEN] {
    let mut message = [0u8; HANDSHAKE_LEN];
    message[0] = PROTOCOL.len() as u8;
    message[1..20].copy_from_slice(PROTOCOL);
    // bytes 20..28 are the reserved extension flags, all zero
    message[28..48].copy_from_slice(info_hash);
    message[48..68].copy_from_slice(peer_id);
    message
}

/// Decodes a compact IPv4 peer list (6 bytes per peer)
///
/// A trailing partial entry is ignored, as are port-zero entries.
pub fn parse_compact_peers(bytes: &[u8]) -> Vec<SocketAddr> {
    bytes
        .chunks_exact(6)
        .filter_map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            (port != 0).then(|| SocketAddr::V4(SocketAddrV4::new(ip, port)))
        })
        .collect()
}

/// Connects to a peer and exchanges handshakes
///
/// Succeeds only if the peer answers with a handshake for the same swarm.
pub async fn contact_peer(
    addr: SocketAddr,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    timeout: Duration,
) -> Result<(), ChurnError> {
    let fail = |message: String| ChurnError::Peer {
        peer: addr.to_string(),
        message,
    };

    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(&handshake_message(info_hash, peer_id)).await?;
        let mut reply = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut reply).await?;
        Ok::<_, std::io::Error>(reply)
    };

    let reply = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| fail("timed out".to_string()))?
        .map_err(|e| fail(e.to_string()))?;

    if reply[0] as usize != PROTOCOL.len() || &reply[1..20] != PROTOCOL {
        return Err(fail("not a BitTorrent handshake".to_string()));
    }
    if &reply[28..48] != info_hash {
        return Err(fail("handshake for a different swarm".to_string()));
    }
    Ok(())
}
