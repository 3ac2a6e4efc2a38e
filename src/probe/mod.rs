//! Probe module for generating traffic against a single target
//!
//! This module contains the two probe kinds driven by the dispatcher:
//! - HTTP GET probes that time the request and harvest links from the body
//! - WebSocket probes that complete a handshake and send one message
//!
//! Both take one (URL, identity) pair at a time and report failures as
//! [`ProbeError`](crate::ProbeError) values for the caller to log and skip.

mod http;
mod links;
mod websocket;

pub use http::{build_http_client, HttpOutcome, HttpProber};
pub use links::extract_links;
pub use websocket::{websocket_url, WebSocketOutcome, WebSocketProber};
