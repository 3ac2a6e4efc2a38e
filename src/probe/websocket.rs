//! WebSocket probe implementation
//!
//! A WebSocket probe is write-only traffic: complete a handshake carrying the
//! identity as `User-Agent`, send a single text frame, close. Nothing is read
//! back from the peer.

use crate::ProbeError;
use futures_util::SinkExt;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Result of a completed WebSocket probe
#[derive(Debug, Clone)]
pub struct WebSocketOutcome {
    /// The URL actually dialled (after scheme mapping)
    pub url: String,

    /// The identity the handshake carried
    pub identity: String,

    /// Time taken by the handshake
    pub elapsed: Duration,

    /// The text frame that was sent
    pub message: String,
}

/// Maps a frontier URL onto the URL to dial
///
/// `http` becomes `ws` and `https` becomes `wss`; `ws`/`wss` pass through.
/// Any other scheme is rejected.
pub fn websocket_url(url: &str) -> Result<Url, ProbeError> {
    let invalid = |message: String| ProbeError::InvalidUrl {
        url: url.to_string(),
        message,
    };

    let mut parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    parsed
        .set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to scheme '{}'", scheme)))?;
    Ok(parsed)
}

fn random_message() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1000);
    format!("WS message: {}", n)
}

/// Issues WebSocket probes
#[derive(Debug, Clone)]
pub struct WebSocketProber {
    timeout: Duration,
}

impl WebSocketProber {
    /// Creates a prober
    ///
    /// # Arguments
    ///
    /// * `timeout` - Bound on the handshake, and separately on send + close
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Handshakes with `url` as `identity`, sends one message, and closes
    ///
    /// The connection is closed whether or not the send succeeded.
    pub async fn probe(&self, url: &str, identity: &str) -> Result<WebSocketOutcome, ProbeError> {
        let target = websocket_url(url)?;
        let mut request =
            target
                .as_str()
                .into_client_request()
                .map_err(|source| ProbeError::Handshake {
                    url: target.to_string(),
                    source,
                })?;
        let header = HeaderValue::from_str(identity).map_err(|_| ProbeError::InvalidIdentity {
            identity: identity.to_string(),
        })?;
        request.headers_mut().insert(USER_AGENT, header);

        let start = Instant::now();
        let (mut stream, _response) = timeout(self.timeout, connect_async(request))
            .await
            .map_err(|_| ProbeError::HandshakeTimeout {
                url: target.to_string(),
            })?
            .map_err(|source| ProbeError::Handshake {
                url: target.to_string(),
                source,
            })?;
        let elapsed = start.elapsed();

        let message = random_message();
        let sent = timeout(self.timeout, stream.send(Message::Text(message.clone()))).await;

        // Always release the connection, even when the send failed
        if timeout(self.timeout, stream.close(None)).await.is_err() {
            tracing::debug!("WebSocket close with {} timed out", target);
        }

        send_outcome(target.as_str(), sent.ok())?;
        Ok(WebSocketOutcome {
            url: target.to_string(),
            identity: identity.to_string(),
            elapsed,
            message,
        })
    }
}

/// Maps the bounded send onto a probe result; `None` means the bound elapsed
fn send_outcome(
    url: &str,
    sent: Option<Result<(), tokio_tungstenite::tungstenite::Error>>,
) -> Result<(), ProbeError> {
    match sent {
        Some(Ok(())) => Ok(()),
        Some(Err(source)) => Err(ProbeError::Send {
            url: url.to_string(),
            source,
        }),
        None => Err(ProbeError::SendTimeout {
            url: url.to_string(),
        }),
    }
}
