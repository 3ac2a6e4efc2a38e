//! Tracker announces
//!
//! HTTP(S) trackers get a GET with the usual query parameters and answer in
//! bencode with a compact peer list. UDP trackers speak the BEP 15 binary
//! protocol: one round trip for a connection id, then the announce itself.

use crate::churn::peer::parse_compact_peers;
use crate::ChurnError;
use aquatic_udp_protocol::{
    AnnounceEvent, AnnounceRequest, ConnectRequest, InfoHash, NumberOfBytes, NumberOfPeers,
    PeerId, PeerKey, Port, Request, Response, TransactionId,
};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_bytes::ByteBuf;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use url::{Host, Url};

/// Port reported to trackers. Nothing listens on it.
const ANNOUNCE_PORT: u16 = 6881;

/// Bytes left to download, as reported to trackers. Non-zero so trackers
/// treat us as a leecher and hand out seeders.
const ANNOUNCE_LEFT: u64 = 16384;

const UDP_PACKET_LEN: usize = 8192;

/// An announce endpoint from a swarm descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tracker {
    Http(String),
    Udp(String),
}

impl Tracker {
    /// Classifies an announce URL; `None` for schemes we cannot speak
    pub(crate) fn parse(announce: &str) -> Option<Self> {
        if announce.starts_with("http://") || announce.starts_with("https://") {
            Some(Tracker::Http(announce.to_string()))
        } else if announce.starts_with("udp://") {
            Some(Tracker::Udp(announce.to_string()))
        } else {
            None
        }
    }

    pub(crate) fn url(&self) -> &str {
        match self {
            Tracker::Http(url) | Tracker::Udp(url) => url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HttpAnnounceResponse {
    #[serde(rename = "failure reason")]
    failure_reason: Option<String>,
    peers: Option<ByteBuf>,
}

/// Announces to one tracker and returns the peers it lists
///
/// `timeout` bounds the UDP exchange; HTTP requests use the client's own.
pub(crate) async fn announce(
    client: &Client,
    tracker: &Tracker,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    event: AnnounceEvent,
    timeout: Duration,
) -> Result<Vec<SocketAddr>, ChurnError> {
    match tracker {
        Tracker::Http(url) => http_announce(client, url, info_hash, peer_id, event).await,
        Tracker::Udp(url) => udp_announce(url, info_hash, peer_id, event, timeout).await,
    }
}

fn event_name(event: AnnounceEvent) -> Option<&'static str> {
    match event {
        AnnounceEvent::Started => Some("started"),
        AnnounceEvent::Stopped => Some("stopped"),
        AnnounceEvent::Completed => Some("completed"),
        AnnounceEvent::None => None,
    }
}

fn url_encode_bytes(bytes: &[u8]) -> String {
    url::form_urlencoded::byte_serialize(bytes).collect()
}

/// Builds the HTTP announce URL for one tracker
fn announce_url(
    tracker: &str,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    event: AnnounceEvent,
) -> String {
    let separator = if tracker.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1",
        tracker,
        separator,
        url_encode_bytes(info_hash),
        url_encode_bytes(peer_id),
        ANNOUNCE_PORT,
        ANNOUNCE_LEFT,
    );
    if let Some(name) = event_name(event) {
        url.push_str("&event=");
        url.push_str(name);
    }
    url
}

async fn http_announce(
    client: &Client,
    tracker: &str,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    event: AnnounceEvent,
) -> Result<Vec<SocketAddr>, ChurnError> {
    let fail = |message: String| ChurnError::Tracker {
        tracker: tracker.to_string(),
        message,
    };

    let response = client
        .get(announce_url(tracker, info_hash, peer_id, event))
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
    let decoded: HttpAnnounceResponse =
        serde_bencode::from_bytes(&body).map_err(|e| fail(format!("bad response: {}", e)))?;

    if let Some(reason) = decoded.failure_reason {
        return Err(fail(reason));
    }

    Ok(decoded
        .peers
        .map(|peers| parse_compact_peers(&peers))
        .unwrap_or_default())
}

async fn udp_announce(
    tracker: &str,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    event: AnnounceEvent,
    timeout: Duration,
) -> Result<Vec<SocketAddr>, ChurnError> {
    let fail = |message: String| ChurnError::Tracker {
        tracker: tracker.to_string(),
        message,
    };

    let url = Url::parse(tracker).map_err(|e| fail(e.to_string()))?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(fail("missing host".to_string())),
    };
    let port = url.port().ok_or_else(|| fail("missing port".to_string()))?;

    let connect_id = TransactionId(rand::thread_rng().gen());
    let announce_id = TransactionId(rand::thread_rng().gen());
    let key = PeerKey(rand::thread_rng().gen());

    let exchange = async {
        let addr = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| e.to_string())?
            .next()
            .ok_or_else(|| "host did not resolve".to_string())?;

        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(|e| e.to_string())?;
        socket.connect(addr).await.map_err(|e| e.to_string())?;

        let connect = Request::Connect(ConnectRequest {
            transaction_id: connect_id,
        });
        let connection_id = match udp_round_trip(&socket, connect, addr.is_ipv4()).await? {
            Response::Connect(reply) if reply.transaction_id == connect_id => reply.connection_id,
            Response::Error(reply) => return Err(reply.message.to_string()),
            _ => return Err("unexpected reply to connect".to_string()),
        };

        let request = Request::Announce(AnnounceRequest {
            connection_id,
            transaction_id: announce_id,
            info_hash: InfoHash(*info_hash),
            peer_id: PeerId(*peer_id),
            bytes_downloaded: NumberOfBytes(0),
            bytes_uploaded: NumberOfBytes(0),
            bytes_left: NumberOfBytes(ANNOUNCE_LEFT as i64),
            event,
            ip_address: None,
            key,
            peers_wanted: NumberOfPeers(-1),
            port: Port(ANNOUNCE_PORT),
        });

        let peers: Vec<SocketAddr> = match udp_round_trip(&socket, request, addr.is_ipv4()).await? {
            Response::AnnounceIpv4(reply) if reply.transaction_id == announce_id => reply
                .peers
                .into_iter()
                .map(|peer| SocketAddr::new(IpAddr::V4(peer.ip_address), peer.port.0))
                .collect(),
            Response::AnnounceIpv6(reply) if reply.transaction_id == announce_id => reply
                .peers
                .into_iter()
                .map(|peer| SocketAddr::new(IpAddr::V6(peer.ip_address), peer.port.0))
                .collect(),
            Response::Error(reply) => return Err(reply.message.to_string()),
            _ => return Err("unexpected reply to announce".to_string()),
        };

        Ok::<Vec<SocketAddr>, String>(peers.into_iter().filter(|peer| peer.port() != 0).collect())
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| fail("timed out".to_string()))?
        .map_err(fail)
}

/// Sends one request and waits for the single datagram that answers it
async fn udp_round_trip(
    socket: &UdpSocket,
    request: Request,
    ipv4: bool,
) -> Result<Response, String> {
    let mut packet = Vec::new();
    request.write(&mut packet).map_err(|e| e.to_string())?;
    socket.send(&packet).await.map_err(|e| e.to_string())?;

    let mut buf = vec![0u8; UDP_PACKET_LEN];
    let len = socket.recv(&mut buf).await.map_err(|e| e.to_string())?;
    Response::from_bytes(&buf[..len], ipv4).map_err(|e| format!("bad response: {}", e))
}
