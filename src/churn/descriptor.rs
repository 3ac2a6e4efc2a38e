//! Magnet URI parsing
//!
//! Only the parts churn needs are kept: the v1 info hash (40 hex digits)
//! and the tracker list. Trackers are kept in the order they appear.

use crate::ChurnError;
use url::Url;

/// A parsed swarm descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmDescriptor {
    /// The swarm's info hash
    pub info_hash: [u8; 20],

    /// Announce URLs from the `tr` parameters
    pub trackers: Vec<String>,

    /// The `dn` parameter, if present
    pub display_name: Option<String>,
}

impl SwarmDescriptor {
    /// Parses a magnet URI
    ///
    /// # Example
    ///
    /// ```
    /// use noisewake::churn::SwarmDescriptor;
    ///
    /// let descriptor = SwarmDescriptor::parse(
    ///     "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&tr=http%3A%2F%2Ft.example%2Fannounce",
    /// ).unwrap();
    /// assert_eq!(descriptor.trackers, vec!["http://t.example/announce"]);
    /// ```
    pub fn parse(uri: &str) -> Result<Self, ChurnError> {
        let url = Url::parse(uri.trim())
            .map_err(|e| ChurnError::Descriptor(format!("not a URI: {}", e)))?;

        if url.scheme() != "magnet" {
            return Err(ChurnError::Descriptor(format!(
                "expected a magnet URI, got scheme '{}'",
                url.scheme()
            )));
        }

        let mut info_hash = None;
        let mut trackers: Vec<String> = Vec::new();
        let mut display_name = None;

        for (key, value) in url.query_pairs() {
            match &*key {
                "xt" => {
                    if let Some(hash) = value.strip_prefix("urn:btih:") {
                        info_hash = Some(decode_info_hash(hash)?);
                    }
                }
                "tr" => {
                    if !trackers.iter().any(|t| t.as_str() == &*value) {
                        trackers.push(value.into_owned());
                    }
                }
                "dn" => display_name = Some(value.into_owned()),
                _ => {}
            }
        }

        let info_hash = info_hash
            .ok_or_else(|| ChurnError::Descriptor("missing xt=urn:btih parameter".to_string()))?;

        Ok(Self {
            info_hash,
            trackers,
            display_name,
        })
    }

    /// Hex form of the info hash
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }
}

fn decode_info_hash(hash: &str) -> Result<[u8; 20], ChurnError> {
    if hash.len() != 40 {
        return Err(ChurnError::Descriptor(format!(
            "info hash must be 40 hex digits, got {} characters",
            hash.len()
        )));
    }

    let bytes = hex::decode(hash)
        .map_err(|e| ChurnError::Descriptor(format!("info hash is not hex: {}", e)))?;
    let mut info_hash = [0u8; 20];
    info_hash.copy_from_slice(&bytes);
    Ok(info_hash)
}
