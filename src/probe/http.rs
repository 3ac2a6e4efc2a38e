//! HTTP probe implementation
//!
//! One probe is one GET request for a (URL, identity) pair:
//! - The identity is sent as the `User-Agent` header
//! - Wall-clock latency is measured around the send
//! - The whole body is read and scanned for links, then dropped
//!
//! Any status code counts as a response; only transport failures are errors.
//! Failed probes are never retried.

use crate::probe::links::extract_links;
use crate::ProbeError;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::{Duration, Instant};

/// Result of a probe that received a response
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    /// The probed URL
    pub url: String,

    /// The identity the request carried
    pub identity: String,

    /// HTTP status code
    pub status: u16,

    /// Time from send until the response head arrived
    pub elapsed: Duration,

    /// Links harvested from the body
    pub links: Vec<String>,
}

/// Builds the HTTP client shared by all probes
///
/// There is no client-level user agent; every request sets its own.
///
/// # Arguments
///
/// * `timeout` - Upper bound on one request, including reading the body
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues HTTP probes with a shared client
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Creates a prober with its own client
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    /// Sends one GET for `url` as `identity`
    ///
    /// # Returns
    ///
    /// * `Ok(HttpOutcome)` - A response arrived and its body was read
    /// * `Err(ProbeError)` - The request or the body read failed
    pub async fn probe(&self, url: &str, identity: &str) -> Result<HttpOutcome, ProbeError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, identity)
            .send()
            .await
            .map_err(|source| ProbeError::Http {
                url: url.to_string(),
                source,
            })?;
        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // TODO: cap the body size; a huge or endless response is read fully into memory
        let body = response.text().await.map_err(|source| ProbeError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(HttpOutcome {
            url: url.to_string(),
            identity: identity.to_string(),
            status,
            elapsed,
            links: extract_links(&body),
        })
    }
}
